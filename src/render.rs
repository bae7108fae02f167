//! Turns one frequency snapshot per frame into screen geometry: a bar chart
//! with decaying peak caps, or a field of pulsing dots scrolling upward.
//!
//! Both entity arrays persist across frames at a fixed length of
//! [`BIN_COUNT`]; index i always corresponds to frequency bin i. They are
//! only rebuilt on resize, never on a mode switch.

use crate::geometry::GeometryManager;
use ratatui::style::Color;
use ratatui::widgets::canvas::{Circle, Context, Rectangle};

/// Number of displayed frequency bins.
pub const BIN_COUNT: usize = 80;

/// Fraction of a bin's width a bar fills.
const BAR_FILL: f64 = 0.6;
/// Geometric per-frame decay of a peak cap.
const CAP_DECAY: f64 = 0.96;
/// How far above its bar a cap is pushed while the bar is alive.
const CAP_RISE: f64 = 40.0;
/// Radius of a dot at full amplitude, before aspect correction.
const MAX_DOT_RADIUS: f64 = 60.0;
/// Upper bound of the per-dot scroll speed, in surface units per frame.
const MAX_DOT_SPEED: f64 = 1.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    Bars,
    Dots,
}

impl ChartMode {
    pub fn toggle(self) -> Self {
        match self {
            ChartMode::Bars => ChartMode::Dots,
            ChartMode::Dots => ChartMode::Bars,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChartMode::Bars => "bars",
            ChartMode::Dots => "dots",
        }
    }
}

struct Bar {
    x: f64,
    width: f64,
    height: f64,
    /// Peak cap height above the baseline; decays on its own clock.
    cap: f64,
}

impl Bar {
    /// Gradient stand-in: green at the base, yellow midway, red on top.
    fn color(&self, surface_height: f64) -> Color {
        let ratio = if surface_height > 0.0 {
            self.height / surface_height
        } else {
            0.0
        };
        if ratio > 2.0 / 3.0 {
            Color::Red
        } else if ratio > 1.0 / 3.0 {
            Color::Yellow
        } else {
            Color::Green
        }
    }
}

struct Dot {
    x: f64,
    /// Measured from the top of the surface, like the source canvas.
    y: f64,
    radius: f64,
    /// Fixed per-dot scroll speed, drawn once at creation.
    dy: f64,
    color: Color,
}

impl Dot {
    fn spawn(geometry: &GeometryManager) -> Self {
        Self {
            x: fastrand::f64() * geometry.width(),
            y: fastrand::f64() * geometry.height(),
            radius: 0.0,
            dy: fastrand::f64() * MAX_DOT_SPEED,
            color: Color::Rgb(fastrand::u8(..), fastrand::u8(..), fastrand::u8(..)),
        }
    }
}

pub struct VisualizationRenderer {
    mode: ChartMode,
    bars: Vec<Bar>,
    dots: Vec<Dot>,
}

impl VisualizationRenderer {
    pub fn new(mode: ChartMode, geometry: &GeometryManager) -> Self {
        let mut renderer = Self {
            mode,
            bars: Vec::new(),
            dots: Vec::new(),
        };
        renderer.rebuild(geometry);
        renderer
    }

    pub fn mode(&self) -> ChartMode {
        self.mode
    }

    /// Takes effect on the next frame; never touches the entity arrays.
    pub fn set_mode(&mut self, mode: ChartMode) {
        self.mode = mode;
    }

    /// Full re-layout after a resize: bar slots recomputed from the new bin
    /// width, dot positions re-randomized within the new bounds.
    pub fn rebuild(&mut self, geometry: &GeometryManager) {
        let bin_width = geometry.bin_width(BIN_COUNT);
        self.bars = (0..BIN_COUNT)
            .map(|i| Bar {
                x: bin_width * i as f64,
                width: bin_width * BAR_FILL,
                height: 0.0,
                cap: 0.0,
            })
            .collect();
        self.dots = (0..BIN_COUNT).map(|_| Dot::spawn(geometry)).collect();
    }

    /// Advance the active mode's entities by one frame.
    pub fn update(&mut self, snapshot: &[u8], geometry: &GeometryManager) {
        match self.mode {
            ChartMode::Bars => self.update_bars(snapshot, geometry),
            ChartMode::Dots => self.update_dots(snapshot, geometry),
        }
    }

    fn update_bars(&mut self, snapshot: &[u8], geometry: &GeometryManager) {
        let surface_height = geometry.height();
        let bin_width = geometry.bin_width(BIN_COUNT);
        let width = bin_width * BAR_FILL;
        let cap_thickness = width * 0.5;

        for (i, bar) in self.bars.iter_mut().enumerate() {
            let sample = bin_sample(snapshot, i);
            let height = surface_height * (sample as f64 / 256.0);
            bar.x = bin_width * i as f64;
            bar.width = width;
            bar.height = height;

            bar.cap *= CAP_DECAY;
            if bar.cap < 0.0 {
                bar.cap = 0.0;
            }
            if height > 0.0 && bar.cap <= height + CAP_RISE {
                bar.cap = (height + CAP_RISE).min(surface_height - cap_thickness);
            }
        }
    }

    fn update_dots(&mut self, snapshot: &[u8], geometry: &GeometryManager) {
        let scale = geometry.aspect_scale();
        // first-bin short-circuit: a zero radius in bin 0 freezes the whole
        // frame, previous positions included
        if dot_radius(bin_sample(snapshot, 0), scale) == 0.0 {
            return;
        }
        let surface_height = geometry.height();
        for (i, dot) in self.dots.iter_mut().enumerate() {
            dot.radius = dot_radius(bin_sample(snapshot, i), scale);
            dot.y -= dot.dy;
            // wrap against the full maximum radius, as the source does
            if dot.y < -MAX_DOT_RADIUS {
                dot.y = surface_height;
            }
        }
    }

    /// Draw the active mode onto a canvas whose bounds match the surface.
    /// Canvas y grows upward, so top-down surface coordinates flip here.
    pub fn draw(&self, ctx: &mut Context<'_>, geometry: &GeometryManager) {
        let surface_height = geometry.height();
        match self.mode {
            ChartMode::Bars => {
                for bar in &self.bars {
                    ctx.draw(&Rectangle {
                        x: bar.x,
                        y: 0.0,
                        width: bar.width,
                        height: bar.height,
                        color: bar.color(surface_height),
                    });
                    ctx.draw(&Rectangle {
                        x: bar.x,
                        y: bar.cap,
                        width: bar.width,
                        height: bar.width * 0.5,
                        color: Color::White,
                    });
                }
            }
            ChartMode::Dots => {
                for dot in &self.dots {
                    ctx.draw(&Circle {
                        x: dot.x,
                        y: surface_height - dot.y,
                        radius: dot.radius,
                        color: dot.color,
                    });
                }
            }
        }
    }
}

fn bin_sample(snapshot: &[u8], i: usize) -> u8 {
    snapshot.get(i).copied().unwrap_or(0)
}

fn dot_radius(sample: u8, aspect_scale: f64) -> f64 {
    (sample as f64 / 256.0) * MAX_DOT_RADIUS * aspect_scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(width: f64, height: f64) -> GeometryManager {
        let mut geom = GeometryManager::new();
        geom.on_resize(width, height);
        geom
    }

    /// Geometry with the reference already captured at the given size.
    fn settled_geometry(width: f64, height: f64) -> GeometryManager {
        let mut geom = geometry(width, height);
        while geom.aspect_scale() == 0.0 {
            std::thread::sleep(std::time::Duration::from_millis(50));
            geom.tick();
        }
        geom
    }

    fn flat_snapshot(value: u8) -> Vec<u8> {
        vec![value; 128]
    }

    #[test]
    fn arrays_keep_their_length_through_resizes() {
        let mut geom = geometry(640.0, 480.0);
        let mut renderer = VisualizationRenderer::new(ChartMode::Bars, &geom);
        for (w, h) in [(100.0, 50.0), (1920.0, 960.0), (8.0, 8.0)] {
            geom.on_resize(w, h);
            renderer.rebuild(&geom);
            assert_eq!(renderer.bars.len(), BIN_COUNT);
            assert_eq!(renderer.dots.len(), BIN_COUNT);
        }
    }

    #[test]
    fn mode_switch_leaves_entities_alone() {
        let geom = geometry(640.0, 480.0);
        let mut renderer = VisualizationRenderer::new(ChartMode::Bars, &geom);
        let dot_positions: Vec<f64> = renderer.dots.iter().map(|d| d.y).collect();
        renderer.set_mode(renderer.mode().toggle());
        assert_eq!(renderer.mode(), ChartMode::Dots);
        let after: Vec<f64> = renderer.dots.iter().map(|d| d.y).collect();
        assert_eq!(dot_positions, after);
    }

    #[test]
    fn bars_follow_the_snapshot() {
        let geom = geometry(640.0, 480.0);
        let mut renderer = VisualizationRenderer::new(ChartMode::Bars, &geom);
        renderer.update(&flat_snapshot(128), &geom);
        for (i, bar) in renderer.bars.iter().enumerate() {
            assert_eq!(bar.height, 480.0 * (128.0 / 256.0));
            assert_eq!(bar.x, 8.0 * i as f64);
            assert_eq!(bar.width, 8.0 * BAR_FILL);
        }
    }

    #[test]
    fn caps_rise_fast_and_fall_slow() {
        let geom = geometry(640.0, 480.0);
        let mut renderer = VisualizationRenderer::new(ChartMode::Bars, &geom);
        renderer.update(&flat_snapshot(128), &geom);
        let raised = renderer.bars[0].cap;
        assert_eq!(raised, 480.0 * 0.5 + CAP_RISE);

        // silence: the cap decays geometrically and never rises again
        let mut previous = raised;
        for _ in 0..200 {
            renderer.update(&flat_snapshot(0), &geom);
            let cap = renderer.bars[0].cap;
            assert!(cap <= previous);
            previous = cap;
        }
        assert!(previous < 1.0);
    }

    #[test]
    fn caps_never_exceed_the_surface_minus_their_thickness() {
        let geom = geometry(640.0, 480.0);
        let mut renderer = VisualizationRenderer::new(ChartMode::Bars, &geom);
        let cap_thickness = 8.0 * BAR_FILL * 0.5;
        for _ in 0..50 {
            renderer.update(&flat_snapshot(255), &geom);
            for bar in &renderer.bars {
                assert!(bar.cap <= 480.0 - cap_thickness);
            }
        }
    }

    #[test]
    fn cap_floor_is_zero() {
        let geom = geometry(640.0, 480.0);
        let mut renderer = VisualizationRenderer::new(ChartMode::Bars, &geom);
        for _ in 0..2000 {
            renderer.update(&flat_snapshot(0), &geom);
        }
        assert!(renderer.bars.iter().all(|b| b.cap >= 0.0));
    }

    #[test]
    fn dots_scroll_up_and_wrap_once_per_traversal() {
        let geom = settled_geometry(640.0, 480.0);
        let mut renderer = VisualizationRenderer::new(ChartMode::Dots, &geom);
        renderer.dots[0].y = 10.0;
        renderer.dots[0].dy = 1.0;
        let mut wraps = 0;
        let mut previous = renderer.dots[0].y;
        // one traversal of height + max radius, plus a little slack
        for _ in 0..560 {
            renderer.update(&flat_snapshot(200), &geom);
            let y = renderer.dots[0].y;
            if y > previous {
                wraps += 1;
            }
            previous = y;
        }
        assert_eq!(wraps, 1);
    }

    #[test]
    fn dot_radii_are_never_negative() {
        let geom = settled_geometry(640.0, 480.0);
        let mut renderer = VisualizationRenderer::new(ChartMode::Dots, &geom);
        let mut snapshot = flat_snapshot(0);
        for (i, slot) in snapshot.iter_mut().enumerate() {
            *slot = (i * 37 % 256) as u8;
        }
        snapshot[0] = 255;
        renderer.update(&snapshot, &geom);
        assert!(renderer.dots.iter().all(|d| d.radius >= 0.0));
    }

    #[test]
    fn zero_first_bin_freezes_the_dot_frame() {
        let geom = settled_geometry(640.0, 480.0);
        let mut renderer = VisualizationRenderer::new(ChartMode::Dots, &geom);
        renderer.update(&flat_snapshot(200), &geom);
        let before: Vec<(f64, f64)> = renderer.dots.iter().map(|d| (d.y, d.radius)).collect();
        let mut snapshot = flat_snapshot(200);
        snapshot[0] = 0;
        renderer.update(&snapshot, &geom);
        let after: Vec<(f64, f64)> = renderer.dots.iter().map(|d| (d.y, d.radius)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn uncaptured_reference_skips_dot_frames_entirely() {
        // aspect scale is still 0, so every radius is 0 and nothing moves
        let geom = geometry(640.0, 480.0);
        let mut renderer = VisualizationRenderer::new(ChartMode::Dots, &geom);
        let before: Vec<f64> = renderer.dots.iter().map(|d| d.y).collect();
        renderer.update(&flat_snapshot(255), &geom);
        let after: Vec<f64> = renderer.dots.iter().map(|d| d.y).collect();
        assert_eq!(before, after);
    }
}

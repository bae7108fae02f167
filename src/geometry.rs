//! Surface geometry. The drawing surface is the canvas cell area scaled to
//! virtual pixels so the physics constants (cap rise, dot radius, scroll
//! speed) keep the proportions they were tuned for.

use std::time::{Duration, Instant};

/// Virtual pixels per terminal cell.
pub const CELL_PX_W: f64 = 8.0;
pub const CELL_PX_H: f64 = 16.0;

/// How long after construction the reference dimensions are sampled.
const REFERENCE_DELAY: Duration = Duration::from_millis(500);

pub struct GeometryManager {
    width: f64,
    height: f64,
    /// Captured once shortly after the surface first stabilizes and then
    /// frozen, even across later resizes. Dot sizing is tuned against it.
    reference: Option<(f64, f64)>,
    created: Instant,
}

impl GeometryManager {
    pub fn new() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            reference: None,
            created: Instant::now(),
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Update the surface dimensions. Returns true when they actually
    /// changed, in which case the caller re-lays-out both entity arrays.
    pub fn on_resize(&mut self, width: f64, height: f64) -> bool {
        if width == self.width && height == self.height {
            return false;
        }
        self.width = width;
        self.height = height;
        true
    }

    /// Called once per frame; performs the one-shot deferred reference
    /// capture when its time has come.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&mut self, now: Instant) {
        if self.reference.is_none() && now.duration_since(self.created) >= REFERENCE_DELAY {
            self.reference = Some((self.width, self.height));
        }
    }

    /// Aspect-correction scale for dot sizing. Never exceeds 1; zero until
    /// the reference has been captured.
    pub fn aspect_scale(&self) -> f64 {
        let (ref_w, ref_h) = self.reference.unwrap_or((0.0, 0.0));
        let scale = if self.height >= self.width {
            if self.width > 0.0 { ref_w / self.width } else { 0.0 }
        } else if self.height > 0.0 {
            ref_h / self.height
        } else {
            0.0
        };
        scale.min(1.0)
    }

    pub fn bin_width(&self, bins: usize) -> f64 {
        self.width / bins as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(width: f64, height: f64) -> GeometryManager {
        let mut geom = GeometryManager::new();
        geom.on_resize(width, height);
        geom.tick_at(Instant::now() + REFERENCE_DELAY);
        geom
    }

    #[test]
    fn resize_reports_change_only_when_dimensions_differ() {
        let mut geom = GeometryManager::new();
        assert!(geom.on_resize(640.0, 480.0));
        assert!(!geom.on_resize(640.0, 480.0));
        assert!(geom.on_resize(640.0, 400.0));
    }

    #[test]
    fn aspect_scale_is_zero_before_the_reference_capture() {
        let mut geom = GeometryManager::new();
        geom.on_resize(640.0, 480.0);
        assert_eq!(geom.aspect_scale(), 0.0);
    }

    #[test]
    fn aspect_scale_never_exceeds_one() {
        let mut geom = captured(640.0, 480.0);
        for (w, h) in [
            (640.0, 480.0),
            (100.0, 480.0),
            (2000.0, 100.0),
            (100.0, 2000.0),
            (1.0, 1.0),
        ] {
            geom.on_resize(w, h);
            assert!(geom.aspect_scale() <= 1.0, "scale > 1 for {w}x{h}");
        }
    }

    #[test]
    fn reference_stays_frozen_across_later_resizes() {
        let mut geom = captured(640.0, 480.0);
        // portrait now, so the width ratio applies: 640 / 320 clamps to 1
        geom.on_resize(320.0, 480.0);
        assert_eq!(geom.aspect_scale(), 1.0);
        // landscape, height ratio: 480 / 960
        geom.on_resize(1920.0, 960.0);
        assert_eq!(geom.aspect_scale(), 0.5);
        // a later tick must not re-capture
        geom.tick_at(Instant::now() + REFERENCE_DELAY * 4);
        geom.on_resize(320.0, 480.0);
        assert_eq!(geom.aspect_scale(), 1.0);
    }

    #[test]
    fn bin_width_divides_the_surface_evenly() {
        let geom = captured(640.0, 480.0);
        assert_eq!(geom.bin_width(80), 8.0);
    }
}

//! Frame loop and UI wiring: track list on the left, the spectrum canvas on
//! the right, one status line underneath. Each loop iteration pulls one
//! frequency snapshot and advances the active chart by one frame.

use crate::geometry::{CELL_PX_H, CELL_PX_W, GeometryManager};
use crate::pipeline::FrequencyTap;
use crate::player::PlayerCommand;
use crate::render::{ChartMode, VisualizationRenderer};
use color_eyre::Result;
use crossbeam::channel::Sender;
use ratatui::{
    DefaultTerminal,
    crossterm::event::{Event, KeyCode, poll, read},
    prelude::*,
    widgets::{Block, List, ListItem, ListState, Paragraph, canvas::Canvas},
};
use std::time::Duration;

const LIST_WIDTH: u16 = 28;
const VOLUME_STEP: f32 = 0.05;

struct App {
    tracks: Vec<String>,
    list_state: ListState,
    commands: Sender<PlayerCommand>,
    tap: FrequencyTap,
    geometry: GeometryManager,
    renderer: VisualizationRenderer,
    volume: f32,
    playing: Option<String>,
    running: bool,
}

impl App {
    fn new(
        tracks: Vec<String>,
        commands: Sender<PlayerCommand>,
        tap: FrequencyTap,
        mode: ChartMode,
        volume: f32,
    ) -> Self {
        let mut list_state = ListState::default();
        if !tracks.is_empty() {
            list_state.select(Some(0));
        }
        let geometry = GeometryManager::new();
        let renderer = VisualizationRenderer::new(mode, &geometry);
        Self {
            tracks,
            list_state,
            commands,
            tap,
            geometry,
            renderer,
            volume,
            playing: None,
            running: true,
        }
    }

    fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        while self.running {
            terminal.draw(|f| self.draw(f))?;
            self.geometry.tick();
            if poll(Duration::from_micros(1))? {
                if let Event::Key(key) = read()? {
                    self.on_key(key.code);
                }
                // resizes reach the geometry through the layout next frame
            }
        }
        Ok(())
    }

    fn draw(&mut self, f: &mut Frame) {
        let [list_area, right] =
            Layout::horizontal([Constraint::Length(LIST_WIDTH), Constraint::Min(0)])
                .areas(f.area());
        let [canvas_area, status_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(right);

        self.draw_track_list(f, list_area);
        self.draw_chart(f, canvas_area);
        self.draw_status(f, status_area);
    }

    fn draw_track_list(&mut self, f: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .tracks
            .iter()
            .map(|track| ListItem::new(track.as_str()))
            .collect();
        let list = List::new(items)
            .block(Block::bordered().title("tracks"))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
            .highlight_symbol("> ");
        f.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn draw_chart(&mut self, f: &mut Frame, area: Rect) {
        let block = Block::bordered().title("spectrum");
        let inner = block.inner(area);

        let width = inner.width as f64 * CELL_PX_W;
        let height = inner.height as f64 * CELL_PX_H;
        if self.geometry.on_resize(width, height) {
            self.renderer.rebuild(&self.geometry);
        }

        let snapshot = self.tap.sample();
        self.renderer.update(&snapshot, &self.geometry);

        let canvas = Canvas::default()
            .block(block)
            .marker(symbols::Marker::Braille)
            .x_bounds([0.0, self.geometry.width()])
            .y_bounds([0.0, self.geometry.height()])
            .paint(|ctx| self.renderer.draw(ctx, &self.geometry));
        f.render_widget(canvas, area);
    }

    fn draw_status(&self, f: &mut Frame, area: Rect) {
        let track = self.playing.as_deref().unwrap_or("-");
        let status = format!(
            " {track} | {} | vol {:.0}% | enter play, m mode, -/+ volume, q quit",
            self.renderer.mode().label(),
            self.volume * 100.0,
        );
        f.render_widget(Paragraph::new(status), area);
    }

    fn on_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Enter => self.select_track(),
            KeyCode::Char('m') => self.renderer.set_mode(self.renderer.mode().toggle()),
            KeyCode::Char('+') | KeyCode::Char('=') => self.change_volume(VOLUME_STEP),
            KeyCode::Char('-') => self.change_volume(-VOLUME_STEP),
            _ => (),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.tracks.is_empty() {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, self.tracks.len() as isize - 1);
        self.list_state.select(Some(next as usize));
    }

    fn select_track(&mut self) {
        let Some(index) = self.list_state.selected() else {
            return;
        };
        let Some(track) = self.tracks.get(index).cloned() else {
            return;
        };
        self.playing = Some(track.clone());
        if let Err(err) = self.commands.send(PlayerCommand::Select(track)) {
            tracing::error!(%err, "player thread is gone");
        }
    }

    /// The keys clamp to [0, 1] here; the pipeline applies whatever it is
    /// handed.
    fn change_volume(&mut self, delta: f32) {
        self.volume = (self.volume + delta).clamp(0.0, 1.0);
        if let Err(err) = self.commands.send(PlayerCommand::SetVolume(self.volume)) {
            tracing::error!(%err, "player thread is gone");
        }
    }
}

pub fn run(
    tracks: Vec<String>,
    commands: Sender<PlayerCommand>,
    tap: FrequencyTap,
    mode: ChartMode,
    volume: f32,
) -> Result<()> {
    let terminal = ratatui::init();
    let result = App::new(tracks, commands, tap, mode, volume).run(terminal);
    ratatui::restore();
    result
}

mod analysis;
mod config;
mod geometry;
mod library;
mod logging;
mod pipeline;
mod player;
mod render;
mod tui;

use crate::config::Config;
use crate::library::MusicLibrary;
use crate::pipeline::AudioPipeline;
use crate::player::{PlaybackController, PlayerCommand};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use crossbeam::channel::unbounded;
use std::path::PathBuf;
use std::thread;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _log_guard = logging::init()?;
    let config = Config::load()?;

    // an optional CLI argument overrides the configured library directory
    let music_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.music_dir());
    let library = MusicLibrary::open(&music_dir)
        .wrap_err_with(|| format!("scanning music library at {}", music_dir.display()))?;

    let pipeline = AudioPipeline::new(config.fft_size)?;
    pipeline.set_volume(config.volume);
    let tap = pipeline.frequency_tap();

    // the controller owns the pipeline on its own thread; the frame loop
    // only ever reads the analyser through the tap
    let (command_tx, command_rx) = unbounded::<PlayerCommand>();
    let mut controller = PlaybackController::new(pipeline, library.clone());
    let player_thread = thread::spawn(move || controller.run(command_rx));

    let result = tui::run(
        library.tracks().to_vec(),
        command_tx.clone(),
        tap,
        config.mode,
        config.volume,
    );

    let _ = command_tx.send(PlayerCommand::Stop);
    let _ = command_tx.send(PlayerCommand::Shutdown);
    let _ = player_thread.join();
    result
}

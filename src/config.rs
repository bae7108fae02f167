//! Startup configuration, read from `<config dir>/wavescope/config.toml`.
//! A missing file means defaults; a malformed one aborts startup.

use crate::analysis::DEFAULT_FFT_SIZE;
use crate::render::ChartMode;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for tracks. Defaults to the platform music folder.
    pub music_dir: Option<PathBuf>,
    /// Analysis sample count; must be a positive power of two.
    pub fft_size: usize,
    /// Initial gain, a normalized fraction.
    pub volume: f32,
    /// Chart drawn at startup.
    pub mode: ChartMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            music_dir: None,
            fft_size: DEFAULT_FFT_SIZE,
            volume: 0.3,
            mode: ChartMode::Bars,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let Some(path) = config_path() else {
            return Ok(Self::default());
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("reading {}", path.display()));
            }
        };
        toml::from_str(&text).wrap_err_with(|| format!("parsing {}", path.display()))
    }

    /// Resolved library directory: config value, else the platform music
    /// folder, else the working directory.
    pub fn music_dir(&self) -> PathBuf {
        self.music_dir
            .clone()
            .or_else(dirs::audio_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("wavescope").join("config.toml"))
}

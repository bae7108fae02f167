//! The music library: a directory of audio files listed once at startup.
//! Fetching a track means reading its bytes back by name, the same contract
//! the file-serving side exposes.

use std::fmt;
use std::path::{Path, PathBuf};

const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "flac", "wav", "ogg", "m4a", "aac"];

/// Why a playback request died. Both outcomes are logged and the request is
/// abandoned; nothing is retried.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    Fetch(String),
    Decode(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Fetch(msg) => write!(f, "fetch failed: {msg}"),
            RequestError::Decode(msg) => write!(f, "decode failed: {msg}"),
        }
    }
}

impl std::error::Error for RequestError {}

#[derive(Clone)]
pub struct MusicLibrary {
    dir: PathBuf,
    tracks: Vec<String>,
}

impl MusicLibrary {
    /// Scan `dir` (non-recursively) for audio files. The file names are the
    /// track ids.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        let mut tracks = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_audio = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    AUDIO_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                });
            if !is_audio {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                tracks.push(name.to_string());
            }
        }
        tracks.sort();
        tracing::info!(dir = %dir.display(), count = tracks.len(), "scanned music library");
        Ok(Self {
            dir: dir.to_path_buf(),
            tracks,
        })
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    /// Raw bytes for the named track. A missing or unreadable file is a
    /// fetch failure, exactly like a 404 from the file server.
    pub fn fetch(&self, track_id: &str) -> Result<Vec<u8>, RequestError> {
        std::fs::read(self.dir.join(track_id))
            .map_err(|err| RequestError::Fetch(format!("{track_id}: {err}")))
    }
}

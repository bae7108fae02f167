//! The playback controller. Owns the pipeline on its own thread, turns
//! selections into fetch+decode workers, and gates every completion on a
//! monotonic generation counter so rapid repeated selections can never
//! resurrect stale audio. Nothing in flight is ever aborted; stale results
//! are detected on arrival and dropped.

use crate::library::{MusicLibrary, RequestError};
use crate::pipeline::{AudioPipeline, DecodedBuffer};
use crossbeam::channel::{Receiver, Sender, unbounded};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub enum PlayerCommand {
    Select(String),
    SetVolume(f32),
    Stop,
    Shutdown,
}

/// What a fetch+decode worker sends back. The generation it carries is the
/// one its request was born with.
struct DecodeOutcome {
    generation: u64,
    track: String,
    result: Result<DecodedBuffer, RequestError>,
}

/// Monotonic counter distinguishing successive playback requests. Only the
/// request holding the current highest generation may touch the pipeline.
#[derive(Default)]
pub struct GenerationGate {
    counter: u64,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new generation, invalidating every request before it.
    pub fn begin(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    pub fn is_live(&self, generation: u64) -> bool {
        generation == self.counter
    }
}

pub struct PlaybackController {
    pipeline: AudioPipeline,
    library: MusicLibrary,
    gate: GenerationGate,
    outcome_tx: Sender<DecodeOutcome>,
    outcome_rx: Receiver<DecodeOutcome>,
}

impl PlaybackController {
    pub fn new(pipeline: AudioPipeline, library: MusicLibrary) -> Self {
        let (outcome_tx, outcome_rx) = unbounded();
        Self {
            pipeline,
            library,
            gate: GenerationGate::new(),
            outcome_tx,
            outcome_rx,
        }
    }

    pub fn run(&mut self, commands: Receiver<PlayerCommand>) {
        loop {
            if let Ok(cmd) = commands.try_recv() {
                match cmd {
                    PlayerCommand::Select(track) => self.handle_selection(track),
                    PlayerCommand::SetVolume(level) => self.pipeline.set_volume(level),
                    PlayerCommand::Stop => self.pipeline.stop(),
                    PlayerCommand::Shutdown => break,
                }
            }
            if let Ok(outcome) = self.outcome_rx.try_recv() {
                self.finish_request(outcome);
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// A new selection supersedes everything before it: stop whatever is
    /// audible now, then fetch+decode off-thread. The worker holds no
    /// reference to the pipeline; it can only report back.
    fn handle_selection(&mut self, track: String) {
        let generation = self.gate.begin();
        self.pipeline.stop();
        tracing::info!(%track, generation, "playback requested");

        let library = self.library.clone();
        let outcome_tx = self.outcome_tx.clone();
        thread::spawn(move || {
            let result = library
                .fetch(&track)
                .and_then(|bytes| decode_bytes(bytes, extension_of(&track)));
            // the controller may already be gone at shutdown
            let _ = outcome_tx.send(DecodeOutcome {
                generation,
                track,
                result,
            });
        });
    }

    fn finish_request(&mut self, outcome: DecodeOutcome) {
        if !self.gate.is_live(outcome.generation) {
            tracing::debug!(
                track = %outcome.track,
                generation = outcome.generation,
                "request superseded, dropping result"
            );
            return;
        }
        match outcome.result {
            Ok(buffer) => {
                self.pipeline.attach_source(buffer);
                match self.pipeline.start() {
                    Ok(()) => tracing::info!(track = %outcome.track, "playing"),
                    Err(err) => tracing::error!(track = %outcome.track, %err, "start failed"),
                }
            }
            // logged and abandoned; whatever played before keeps playing
            Err(err) => tracing::warn!(track = %outcome.track, %err, "request abandoned"),
        }
    }
}

fn extension_of(track: &str) -> Option<String> {
    Path::new(track)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string)
}

/// Decode a fetched track into interleaved f32 samples.
pub fn decode_bytes(
    bytes: Vec<u8>,
    extension: Option<String>,
) -> Result<DecodedBuffer, RequestError> {
    let decode_err = |err: &dyn std::fmt::Display| RequestError::Decode(err.to_string());

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(&ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|err| decode_err(&err))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| RequestError::Decode("no supported audio tracks found".to_string()))?;
    let track_id = track.id;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|err| decode_err(&err))?;

    let mut all_samples = Vec::<f32>::new();
    let mut sample_buf = None;
    let mut sample_rate = 44100;
    let mut channels = 1u16;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // end of stream
            Err(Error::IoError(_)) => break,
            Err(err) => return Err(decode_err(&err)),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                if sample_buf.is_none() {
                    let spec = *audio_buf.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count().max(1) as u16;
                    let duration = audio_buf.capacity() as u64;
                    sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
                }
                if let Some(buf) = &mut sample_buf {
                    buf.copy_interleaved_ref(audio_buf);
                    all_samples.extend_from_slice(buf.samples());
                }
            }
            // single bad packets are skipped, matching the decoder's advice
            Err(Error::DecodeError(_)) => (),
            Err(err) => return Err(decode_err(&err)),
        }
    }

    if all_samples.is_empty() {
        return Err(RequestError::Decode(
            "stream contained no decodable audio".to_string(),
        ));
    }

    Ok(DecodedBuffer {
        samples: Arc::new(all_samples),
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_increase_monotonically() {
        let mut gate = GenerationGate::new();
        let a = gate.begin();
        let b = gate.begin();
        let c = gate.begin();
        assert!(a < b && b < c);
    }

    #[test]
    fn only_the_last_of_rapid_selections_is_live() {
        let mut gate = GenerationGate::new();
        // five selections fired before any decode completes
        let gens: Vec<u64> = (0..5).map(|_| gate.begin()).collect();
        // completions arrive in arbitrary interleavings; only the newest
        // generation passes, however late the others land
        for &g in &[gens[2], gens[0], gens[4], gens[1], gens[3]] {
            assert_eq!(gate.is_live(g), g == gens[4]);
        }
    }

    #[test]
    fn slow_first_request_cannot_overtake_a_faster_second() {
        let mut gate = GenerationGate::new();
        let slow = gate.begin();
        let fast = gate.begin();
        // the fast request completes and plays
        assert!(gate.is_live(fast));
        // the slow one completes afterwards and must be dropped
        assert!(!gate.is_live(slow));
    }

    #[test]
    fn garbage_bytes_are_a_decode_failure() {
        let result = decode_bytes(vec![0u8; 64], Some("mp3".to_string()));
        match result {
            Err(RequestError::Decode(_)) => {}
            other => panic!("expected decode failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn extension_comes_from_the_track_id() {
        assert_eq!(extension_of("song.mp3"), Some("mp3".to_string()));
        assert_eq!(extension_of("noext"), None);
    }
}

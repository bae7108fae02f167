//! The audio routing graph: source -> analysis -> gain -> output.
//!
//! The gain stage is the rodio sink's volume and the output is the default
//! device stream; both exist exactly once for the lifetime of the pipeline.
//! Only the source is replaced per playback: each `start()` appends a fresh
//! [`TapSource`] over the attached buffer, and the tap feeds the analyser as
//! the sink pulls samples through it.

use crate::analysis::{Analyser, FrequencySnapshot};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use rodio::Source;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mono samples accumulated in the tap before it takes the analyser lock.
const TAP_BATCH: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Invalid analysis sample count at construction. Fatal.
    Configuration(String),
    /// `start()` with no attached buffer. Programmer error; the controller
    /// always attaches before starting.
    NotReady,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Configuration(msg) => write!(f, "invalid pipeline configuration: {msg}"),
            PipelineError::NotReady => write!(f, "start requested with no attached buffer"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// One decoded track, ready to be attached to the source node.
#[derive(Clone)]
pub struct DecodedBuffer {
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Read handle onto the analysis node. The render loop owns one of these,
/// never the pipeline itself.
#[derive(Clone)]
pub struct FrequencyTap {
    analyser: Arc<Mutex<Analyser>>,
}

impl FrequencyTap {
    /// Non-blocking beyond the lock; all-zero before any audio has played.
    pub fn sample(&self) -> FrequencySnapshot {
        self.analyser.lock().unwrap().snapshot()
    }
}

pub struct AudioPipeline {
    // playback stops when the stream handle is dropped
    _stream_handle: rodio::OutputStream,
    sink: rodio::Sink,
    analyser: Arc<Mutex<Analyser>>,
    attached: Option<DecodedBuffer>,
}

impl AudioPipeline {
    /// Build the four-node graph once. `fft_size` must be a positive power
    /// of two.
    pub fn new(fft_size: usize) -> Result<Self> {
        let analyser = Analyser::new(fft_size)?;
        let stream_handle = rodio::OutputStreamBuilder::open_default_stream()
            .wrap_err("failed to open default audio output stream")?;
        let sink = rodio::Sink::connect_new(stream_handle.mixer());
        Ok(Self {
            _stream_handle: stream_handle,
            sink,
            analyser: Arc::new(Mutex::new(analyser)),
            attached: None,
        })
    }

    pub fn frequency_tap(&self) -> FrequencyTap {
        FrequencyTap {
            analyser: Arc::clone(&self.analyser),
        }
    }

    /// Normalized fraction in [0, 1]. Out-of-range values pass through
    /// unclamped; limiting is the caller's job.
    pub fn set_volume(&self, level: f32) {
        self.sink.set_volume(level);
    }

    /// Replace the source node's buffer. Does not start playback.
    pub fn attach_source(&mut self, buffer: DecodedBuffer) {
        self.attached = Some(buffer);
    }

    /// Play the attached buffer from time zero, replacing whatever the sink
    /// held before.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        let buffer = self.attached.clone().ok_or(PipelineError::NotReady)?;
        self.sink.stop();
        self.sink.clear();
        self.sink
            .append(TapSource::new(buffer, Arc::clone(&self.analyser)));
        self.sink.play();
        Ok(())
    }

    /// Halt playback immediately and let the spectrum fall to silence.
    pub fn stop(&mut self) {
        self.sink.stop();
        self.sink.clear();
        let mut analyser = self.analyser.lock().unwrap();
        let zeros = vec![0.0f32; analyser.fft_size()];
        analyser.push(&zeros);
    }
}

/// The source node. Yields interleaved samples to the sink and mirrors a
/// mono downmix of them into the analyser, so the analysis stage observes
/// exactly what is being played.
struct TapSource {
    buffer: DecodedBuffer,
    position: usize,
    frame_acc: f32,
    frame_fill: u16,
    pending: Vec<f32>,
    analyser: Arc<Mutex<Analyser>>,
    drained: bool,
}

impl TapSource {
    fn new(buffer: DecodedBuffer, analyser: Arc<Mutex<Analyser>>) -> Self {
        Self {
            buffer,
            position: 0,
            frame_acc: 0.0,
            frame_fill: 0,
            pending: Vec::with_capacity(TAP_BATCH),
            analyser,
            drained: false,
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.analyser.lock().unwrap().push(&self.pending);
        self.pending.clear();
    }
}

impl Iterator for TapSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.buffer.samples.len() {
            if !self.drained {
                self.drained = true;
                self.flush();
                // the track ended, so the analysis node sees silence
                let mut analyser = self.analyser.lock().unwrap();
                let zeros = vec![0.0f32; analyser.fft_size()];
                analyser.push(&zeros);
            }
            return None;
        }

        let sample = self.buffer.samples[self.position];
        self.position += 1;

        self.frame_acc += sample;
        self.frame_fill += 1;
        if self.frame_fill == self.buffer.channels.max(1) {
            let mono = self.frame_acc / self.buffer.channels.max(1) as f32;
            self.frame_acc = 0.0;
            self.frame_fill = 0;
            self.pending.push(mono);
            if self.pending.len() >= TAP_BATCH {
                self.flush();
            }
        }

        Some(sample)
    }
}

impl Source for TapSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.buffer.channels.max(1)
    }

    fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

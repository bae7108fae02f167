//! The analysis node of the audio routing graph: keeps a sliding window of
//! the most recently played samples and turns it into a byte spectrum on
//! demand.

use crate::pipeline::PipelineError;
use ringbuffer::{AllocRingBuffer, RingBuffer};
use spectrum_analyzer::scaling::divide_by_N;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{FrequencyLimit, samples_fft_to_spectrum};

pub const DEFAULT_FFT_SIZE: usize = 256;

/// Byte mapping range, in dB. Magnitudes at or below the floor map to 0,
/// at or above the ceiling to 255.
const DB_FLOOR: f32 = -100.0;
const DB_CEIL: f32 = -30.0;

const SAMPLE_RATE: u32 = 44100;

/// One frequency snapshot: unsigned amplitudes, one byte per bin,
/// length = fft_size / 2. Produced fresh each frame, never retained.
pub type FrequencySnapshot = Vec<u8>;

pub struct Analyser {
    fft_size: usize,
    window: AllocRingBuffer<f32>,
}

impl Analyser {
    pub fn new(fft_size: usize) -> Result<Self, PipelineError> {
        if fft_size == 0 || !fft_size.is_power_of_two() {
            return Err(PipelineError::Configuration(format!(
                "fft size must be a positive power of two, got {fft_size}"
            )));
        }
        Ok(Self {
            fft_size,
            window: AllocRingBuffer::new(fft_size),
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins a snapshot carries.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Feed mono samples observed by the playing source. Older samples fall
    /// off the back of the window.
    pub fn push(&mut self, samples: &[f32]) {
        for &s in samples {
            let _ = self.window.enqueue(s);
        }
    }

    /// Most recent data the node has observed, as bytes. All-zero before any
    /// audio has played; the length never varies.
    pub fn snapshot(&self) -> FrequencySnapshot {
        let mut samples = vec![0.0f32; self.fft_size - self.window.len()];
        samples.extend(self.window.iter().copied());

        let windowed = hann_window(&samples);
        let mut out = vec![0u8; self.bin_count()];
        let spectrum = match samples_fft_to_spectrum(
            &windowed,
            SAMPLE_RATE,
            FrequencyLimit::All,
            Some(&divide_by_N),
        ) {
            Ok(spectrum) => spectrum,
            // input length is a power of two by construction; if the fft
            // rejects it anyway, report silence
            Err(_) => return out,
        };

        for (slot, (_, value)) in out.iter_mut().zip(spectrum.data().iter()) {
            *slot = byte_amplitude(value.val());
        }
        out
    }
}

/// Map a linear magnitude onto the 0..=255 byte scale over [-100, -30] dB.
fn byte_amplitude(magnitude: f32) -> u8 {
    let db = 20.0 * magnitude.max(1e-10).log10();
    let normalized = ((db - DB_FLOOR) / (DB_CEIL - DB_FLOOR)).clamp(0.0, 1.0);
    (normalized * 255.0).round() as u8
}

//! Local synthesis engines.
//!
//! A [`SynthesisEngine`] is a blocking, whole-segment synthesizer: text in,
//! samples out. [`EngineBackend`] adapts any engine into a
//! [`SynthesisBackend`](crate::backend::SynthesisBackend) so it can drive a
//! [`StreamingTts`](crate::StreamingTts) like a remote service would.
//!
//! # Available Engines
//!
//! - [`ToneEngine`] - deterministic tone generator, useful offline and in tests

mod adapter;
pub mod tone;

pub use adapter::EngineBackend;
pub use tone::ToneEngine;

use crate::options::TtsOptions;

/// Boxed error returned by engines.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

/// The result of synthesizing one text segment.
///
/// Contains raw f32 audio samples (mono) and their sample rate.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Raw audio samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert to signed 16-bit little-endian PCM bytes, clamping out-of-range
    /// samples.
    pub fn to_pcm16(&self) -> Vec<u8> {
        self.samples
            .iter()
            .flat_map(|&s| ((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes())
            .collect()
    }
}

/// Common interface for blocking text-to-speech engines.
pub trait SynthesisEngine: Send + 'static {
    /// Sample rate of the audio this engine produces.
    fn sample_rate(&self) -> u32;

    /// Synthesize speech for one text segment.
    fn synthesize(
        &mut self,
        text: &str,
        options: &TtsOptions,
    ) -> Result<SynthesisResult, EngineError>;
}

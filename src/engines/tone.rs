use std::f32::consts::PI;

use super::{EngineError, SynthesisEngine, SynthesisResult};
use crate::options::TtsOptions;

/// Base pitch of the generated tone.
const BASE_FREQUENCY_HZ: f32 = 220.0;

/// Deterministic engine that renders each character as a short tone.
///
/// Non-whitespace characters become a sine burst; whitespace becomes silence.
/// `rate` shortens the output, `pitch` scales the frequency and `volume` the
/// amplitude, so option handling can be observed without a real model.
#[derive(Debug, Clone)]
pub struct ToneEngine {
    sample_rate: u32,
    ms_per_char: u32,
}

impl ToneEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ms_per_char: 60,
        }
    }

    pub fn with_ms_per_char(mut self, ms_per_char: u32) -> Self {
        self.ms_per_char = ms_per_char;
        self
    }

    fn samples_per_char(&self, rate: f32) -> usize {
        let secs = self.ms_per_char as f32 / 1000.0 / rate;
        (secs * self.sample_rate as f32).round() as usize
    }
}

impl SynthesisEngine for ToneEngine {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn synthesize(
        &mut self,
        text: &str,
        options: &TtsOptions,
    ) -> Result<SynthesisResult, EngineError> {
        let per_char = self.samples_per_char(options.rate);
        let amplitude = options.volume as f32 / 100.0;
        let step = 2.0 * PI * BASE_FREQUENCY_HZ * options.pitch / self.sample_rate as f32;

        let mut samples = Vec::with_capacity(per_char * text.chars().count());
        for ch in text.chars() {
            if ch.is_whitespace() {
                samples.extend(std::iter::repeat(0.0).take(per_char));
            } else {
                samples.extend((0..per_char).map(|i| amplitude * (step * i as f32).sin()));
            }
        }

        Ok(SynthesisResult {
            samples,
            sample_rate: self.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_length_follows_text_and_rate() {
        let mut engine = ToneEngine::new(16000);
        let normal = engine.synthesize("你好 a", &TtsOptions::default()).unwrap();
        assert_eq!(normal.samples.len(), 4 * 960);
        assert_eq!(normal.sample_rate, 16000);

        let fast = TtsOptions {
            rate: 2.0,
            ..Default::default()
        };
        let quick = engine.synthesize("你好 a", &fast).unwrap();
        assert_eq!(quick.samples.len(), 4 * 480);
    }

    #[test]
    fn whitespace_is_silent_and_volume_bounds_amplitude() {
        let mut engine = ToneEngine::new(8000).with_ms_per_char(10);
        let options = TtsOptions {
            volume: 20,
            ..Default::default()
        };
        let result = engine.synthesize("a b", &options).unwrap();
        let per_char = 80;
        assert!(result.samples[per_char..2 * per_char].iter().all(|&s| s == 0.0));
        assert!(result.samples.iter().all(|s| s.abs() <= 0.2 + f32::EPSILON));
        assert!(result.samples[..per_char].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn empty_text_yields_no_samples() {
        let mut engine = ToneEngine::new(16000);
        assert!(engine
            .synthesize("", &TtsOptions::default())
            .unwrap()
            .samples
            .is_empty());
    }
}

//! Synthesis configuration.
//!
//! [`TtsOptions`] is validated once, when it is built or loaded, and is
//! immutable afterwards. Every request started from a
//! [`StreamingTts`](crate::StreamingTts) shares the same validated value.
//!
//! ```
//! use tts_stream::options::{AudioFormat, TtsOptionsBuilder};
//!
//! let options = TtsOptionsBuilder::default()
//!     .voice("longwan")
//!     .format(AudioFormat::Pcm24000Hz)
//!     .rate(1.2f32)
//!     .build()?;
//! assert_eq!(options.format.sample_rate(), 24000);
//!
//! assert!(TtsOptionsBuilder::default().volume(101u8).build().is_err());
//! # Ok::<(), tts_stream::TtsError>(())
//! ```

use std::path::Path;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{Result, TtsError};

pub const DEFAULT_MODEL: &str = "cosyvoice-v1";
pub const DEFAULT_VOICE: &str = "longxiaochun";
/// Longest accepted audio frame, in milliseconds.
pub const MAX_FRAME_DURATION_MS: u32 = 1000;

/// Output PCM layout: signed 16-bit little-endian, mono.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "pcm_8000hz")]
    Pcm8000Hz,
    #[default]
    #[serde(rename = "pcm_16000hz")]
    Pcm16000Hz,
    #[serde(rename = "pcm_22050hz")]
    Pcm22050Hz,
    #[serde(rename = "pcm_24000hz")]
    Pcm24000Hz,
    #[serde(rename = "pcm_44100hz")]
    Pcm44100Hz,
    #[serde(rename = "pcm_48000hz")]
    Pcm48000Hz,
}

impl AudioFormat {
    pub fn sample_rate(self) -> u32 {
        match self {
            AudioFormat::Pcm8000Hz => 8000,
            AudioFormat::Pcm16000Hz => 16000,
            AudioFormat::Pcm22050Hz => 22050,
            AudioFormat::Pcm24000Hz => 24000,
            AudioFormat::Pcm44100Hz => 44100,
            AudioFormat::Pcm48000Hz => 48000,
        }
    }

    pub fn num_channels(self) -> u16 {
        1
    }
}

/// Parameters for a streaming synthesis request.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    default,
    setter(into),
    build_fn(validate = "Self::validate", error = "TtsError")
)]
#[serde(default)]
pub struct TtsOptions {
    /// Backend model identifier.
    pub model: String,
    /// Backend voice identifier.
    pub voice: String,
    pub format: AudioFormat,
    /// Volume, 0–100.
    pub volume: u8,
    /// Speech speed multiplier, 0.5–2.0.
    pub rate: f32,
    /// Pitch multiplier, 0.5–2.0.
    pub pitch: f32,
    pub word_timestamp_enabled: bool,
    pub phoneme_timestamp_enabled: bool,
    /// Duration of each emitted audio frame in milliseconds, 1–1000.
    pub frame_duration_ms: u32,
}

impl Default for TtsOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            format: AudioFormat::default(),
            volume: 50,
            rate: 1.0,
            pitch: 1.0,
            word_timestamp_enabled: false,
            phoneme_timestamp_enabled: false,
            frame_duration_ms: 100,
        }
    }
}

impl TtsOptions {
    /// Check every range constraint.
    pub fn validate(&self) -> Result<()> {
        check_volume(self.volume)?;
        check_multiplier("rate", self.rate)?;
        check_multiplier("pitch", self.pitch)?;
        check_frame_duration(self.frame_duration_ms)?;
        if self.model.trim().is_empty() {
            return Err(TtsError::Configuration("model must not be empty".to_string()));
        }
        if self.voice.trim().is_empty() {
            return Err(TtsError::Configuration("voice must not be empty".to_string()));
        }
        Ok(())
    }

    /// Parse and validate options from JSON. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: TtsOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate()
    }

    pub fn num_channels(&self) -> u16 {
        self.format.num_channels()
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_duration_ms as u64)
    }
}

impl TtsOptionsBuilder {
    fn validate(&self) -> Result<()> {
        if let Some(volume) = self.volume {
            check_volume(volume)?;
        }
        if let Some(rate) = self.rate {
            check_multiplier("rate", rate)?;
        }
        if let Some(pitch) = self.pitch {
            check_multiplier("pitch", pitch)?;
        }
        if let Some(ms) = self.frame_duration_ms {
            check_frame_duration(ms)?;
        }
        Ok(())
    }
}

fn check_volume(volume: u8) -> Result<()> {
    if volume > 100 {
        return Err(TtsError::Configuration(format!(
            "volume must be between 0 and 100, got {volume}"
        )));
    }
    Ok(())
}

fn check_multiplier(name: &str, value: f32) -> Result<()> {
    if !(0.5..=2.0).contains(&value) {
        return Err(TtsError::Configuration(format!(
            "{name} must be between 0.5 and 2.0, got {value}"
        )));
    }
    Ok(())
}

fn check_frame_duration(ms: u32) -> Result<()> {
    if !(1..=MAX_FRAME_DURATION_MS).contains(&ms) {
        return Err(TtsError::Configuration(format!(
            "frame_duration_ms must be between 1 and {MAX_FRAME_DURATION_MS}, got {ms}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = TtsOptionsBuilder::default().build().unwrap();
        assert_eq!(options, TtsOptions::default());
        assert_eq!(options.model, "cosyvoice-v1");
        assert_eq!(options.voice, "longxiaochun");
        assert_eq!(options.sample_rate(), 16000);
        assert_eq!(options.num_channels(), 1);
        assert_eq!(options.frame_duration(), Duration::from_millis(100));
    }

    #[test]
    fn out_of_range_values_fail_at_build() {
        assert!(TtsOptionsBuilder::default().volume(101u8).build().is_err());
        assert!(TtsOptionsBuilder::default().rate(0.4f32).build().is_err());
        assert!(TtsOptionsBuilder::default().rate(2.1f32).build().is_err());
        assert!(TtsOptionsBuilder::default().pitch(0.0f32).build().is_err());
        assert!(TtsOptionsBuilder::default().pitch(f32::NAN).build().is_err());
        assert!(TtsOptionsBuilder::default().frame_duration_ms(0u32).build().is_err());
    }

    #[test]
    fn oversized_frame_duration_is_rejected() {
        assert!(matches!(
            TtsOptionsBuilder::default().frame_duration_ms(u32::MAX).build(),
            Err(TtsError::Configuration(_))
        ));
        assert!(TtsOptionsBuilder::default().frame_duration_ms(1001u32).build().is_err());
        assert!(matches!(
            TtsOptions::from_json(r#"{"frame_duration_ms": 4294967295}"#),
            Err(TtsError::Configuration(_))
        ));

        let longest = TtsOptionsBuilder::default()
            .frame_duration_ms(MAX_FRAME_DURATION_MS)
            .build()
            .unwrap();
        assert_eq!(longest.frame_duration(), Duration::from_secs(1));
    }

    #[test]
    fn boundary_values_are_accepted() {
        let options = TtsOptionsBuilder::default()
            .volume(100u8)
            .rate(0.5f32)
            .pitch(2.0f32)
            .build()
            .unwrap();
        assert_eq!(options.volume, 100);
    }

    #[test]
    fn literal_options_are_checked_by_validate() {
        let options = TtsOptions {
            rate: 3.0,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(TtsError::Configuration(_))));
    }

    #[test]
    fn json_loading_fills_defaults_and_validates() {
        let options =
            TtsOptions::from_json(r#"{"voice": "longwan", "format": "pcm_24000hz"}"#).unwrap();
        assert_eq!(options.voice, "longwan");
        assert_eq!(options.sample_rate(), 24000);
        assert_eq!(options.volume, 50);

        assert!(matches!(
            TtsOptions::from_json(r#"{"pitch": 9.0}"#),
            Err(TtsError::Configuration(_))
        ));
        assert!(matches!(
            TtsOptions::from_json("{not json"),
            Err(TtsError::Json(_))
        ));
    }
}

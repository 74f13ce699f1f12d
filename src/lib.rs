//! # tts-stream
//!
//! A Rust library for streaming text-to-speech: text arrives in fragments,
//! audio leaves as fixed-duration PCM frames.
//!
//! ## Features
//!
//! - **Incremental segmentation**: sentence and word tokenizers that emit units
//!   as soon as they are stable, with quote/bracket-aware sentence splitting
//! - **Callback backends**: any session-based synthesis service plugs in through
//!   [`SynthesisBackend`]; callbacks are bridged through an [`AudioSink`]
//! - **Fixed-size framing**: arbitrary audio chunks are repacked into
//!   [`AudioFrame`]s of a configured duration
//! - **Local engines**: blocking engines run behind the same interface via
//!   [`engines::EngineBackend`]
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tts-stream = "2026.10"
//! ```
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tts_stream::engines::{EngineBackend, ToneEngine};
//! use tts_stream::{audio, StreamingTts, TtsOptions};
//!
//! # async fn run() -> tts_stream::Result<()> {
//! let tts = StreamingTts::new(TtsOptions::default(), EngineBackend::new(ToneEngine::new(16000)))?;
//!
//! let mut stream = tts.stream();
//! stream.push_text("今天天气很好，")?;
//! stream.push_text("我们去公园散步吧。")?;
//! stream.end_input()?;
//!
//! let mut frames = Vec::new();
//! while let Some(audio) = stream.recv().await {
//!     frames.push(audio.frame);
//! }
//! stream.join().await?;
//! audio::write_wav(&frames, &PathBuf::from("output.wav"))?;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod backend;
pub mod engines;
pub mod error;
pub mod options;
pub mod synthesizer;
pub mod tokenize;

pub use audio::{AudioByteStream, AudioFrame, SynthesizedAudio};
pub use backend::{AudioSink, BackendSession, SynthesisBackend};
pub use error::{Result, TtsError};
pub use options::{AudioFormat, TtsOptions, TtsOptionsBuilder};
pub use synthesizer::{StreamOutcome, StreamState, StreamingTts, SynthesizeStream};
pub use tokenize::{
    BatchSegmenter, IncrementalSegmenter, SentenceTokenizer, SentenceTokenizerOptions, Token,
    Tokenizer, WordTokenizer, WordTokenizerOptions,
};

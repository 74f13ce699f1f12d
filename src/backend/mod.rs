//! Synthesis backend capability.
//!
//! A backend is anything that can turn text segments into PCM audio and
//! deliver it asynchronously: a cloud service client, a local engine (see
//! [`EngineBackend`](crate::engines::EngineBackend)), or a test double.
//!
//! The coordinator opens one [`BackendSession`] per request and hands the
//! backend an [`AudioSink`]. The backend owns the sink for the lifetime of the
//! session and reports through it, from whatever thread or task its transport
//! runs on:
//!
//! - [`AudioSink::on_audio`] zero or more times, in delivery order;
//! - exactly one of [`AudioSink::on_complete`] or [`AudioSink::on_error`].
//!
//! Audio may arrive before [`BackendSession::send`] returns, and after
//! [`BackendSession::complete`] returns but before `on_complete`.

mod sink;

pub use sink::AudioSink;
pub(crate) use sink::{completion_result, Completion};

use async_trait::async_trait;

use crate::options::TtsOptions;
use crate::Result;

/// Factory for synthesis sessions. Credentials and transport belong to the
/// implementing type.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Open a session that delivers audio into `sink`.
    async fn open(&self, options: &TtsOptions, sink: AudioSink) -> Result<Box<dyn BackendSession>>;
}

/// One synthesis conversation, scoped to a single request. Never reused.
#[async_trait]
pub trait BackendSession: Send {
    /// Queue a text segment for synthesis.
    async fn send(&mut self, text: &str) -> Result<()>;

    /// Signal that no more text follows. Completion is acknowledged later
    /// through [`AudioSink::on_complete`].
    async fn complete(&mut self) -> Result<()>;

    /// Stop the session and release its resources.
    async fn close(&mut self) -> Result<()>;
}

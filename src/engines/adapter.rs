use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::SynthesisEngine;
use crate::backend::{AudioSink, BackendSession, SynthesisBackend};
use crate::options::TtsOptions;
use crate::{Result, TtsError};

/// Runs a blocking [`SynthesisEngine`] behind the session/callback interface.
///
/// Each `send` synthesizes its segment on the blocking thread pool and delivers
/// the PCM through the session's [`AudioSink`] before returning. Sessions from
/// concurrent requests share the engine and take turns using it.
pub struct EngineBackend<E> {
    engine: Arc<Mutex<E>>,
    /// Read once; `open` never waits on the engine lock.
    sample_rate: u32,
}

impl<E: SynthesisEngine> EngineBackend<E> {
    pub fn new(engine: E) -> Self {
        Self {
            sample_rate: engine.sample_rate(),
            engine: Arc::new(Mutex::new(engine)),
        }
    }
}

#[async_trait]
impl<E: SynthesisEngine> SynthesisBackend for EngineBackend<E> {
    async fn open(&self, options: &TtsOptions, sink: AudioSink) -> Result<Box<dyn BackendSession>> {
        let engine_rate = self.sample_rate;
        if engine_rate != options.sample_rate() {
            return Err(TtsError::Configuration(format!(
                "engine produces {engine_rate} Hz audio but the stream is configured for {} Hz",
                options.sample_rate()
            )));
        }

        Ok(Box::new(EngineSession {
            engine: Arc::clone(&self.engine),
            options: options.clone(),
            sink: Some(sink),
        }))
    }
}

struct EngineSession<E> {
    engine: Arc<Mutex<E>>,
    options: TtsOptions,
    sink: Option<AudioSink>,
}

impl<E> EngineSession<E> {
    fn sink(&mut self) -> Result<&mut AudioSink> {
        self.sink
            .as_mut()
            .ok_or_else(|| TtsError::Backend("session already closed".to_string()))
    }
}

#[async_trait]
impl<E: SynthesisEngine> BackendSession for EngineSession<E> {
    async fn send(&mut self, text: &str) -> Result<()> {
        if self.sink()?.is_finished() {
            return Err(TtsError::Backend("session already completed".to_string()));
        }

        let engine = Arc::clone(&self.engine);
        let options = self.options.clone();
        let segment = text.to_string();
        let synthesized =
            tokio::task::spawn_blocking(move || engine.lock().synthesize(&segment, &options))
                .await
                .map_err(|e| TtsError::Backend(format!("synthesis task failed: {e}")))?;

        let sink = self.sink()?;
        match synthesized {
            Ok(result) => {
                log::debug!(
                    "Engine produced {:.2}s of audio for {:?}",
                    result.duration_secs(),
                    text
                );
                sink.on_audio(&result.to_pcm16());
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                sink.on_error(reason.clone());
                Err(TtsError::Backend(reason))
            }
        }
    }

    async fn complete(&mut self) -> Result<()> {
        self.sink()?.on_complete();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.sink = None;
        Ok(())
    }
}

use tokio::sync::{mpsc, oneshot};

use crate::audio::{AudioByteStream, SynthesizedAudio};
use crate::{Result, TtsError};

/// Single-fire completion signal: `Ok` after `on_complete`, the reason after
/// `on_error`.
pub(crate) type Completion = oneshot::Receiver<std::result::Result<(), String>>;

/// Callback bridge from a backend session into the request's audio queue.
///
/// Bytes are framed by the sink's own [`AudioByteStream`] and queued
/// immediately; the sink never blocks. Once the session has completed or
/// failed, the audio queue is closed and further audio is discarded.
///
/// Dropping a sink that never reported completion counts as a backend error.
pub struct AudioSink {
    request_id: String,
    segment_id: String,
    chunker: AudioByteStream,
    frames: Option<mpsc::UnboundedSender<SynthesizedAudio>>,
    done: Option<oneshot::Sender<std::result::Result<(), String>>>,
}

impl AudioSink {
    pub(crate) fn new(
        request_id: String,
        segment_id: String,
        chunker: AudioByteStream,
    ) -> (Self, mpsc::UnboundedReceiver<SynthesizedAudio>, Completion) {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let sink = Self {
            request_id,
            segment_id,
            chunker,
            frames: Some(frames_tx),
            done: Some(done_tx),
        };
        (sink, frames_rx, done_rx)
    }

    /// True once `on_complete` or `on_error` has been called.
    pub fn is_finished(&self) -> bool {
        self.done.is_none()
    }

    /// Deliver raw PCM bytes.
    pub fn on_audio(&mut self, data: &[u8]) {
        let Some(frames) = &self.frames else {
            log::warn!(
                "Discarding {} bytes of audio received after session end (request {})",
                data.len(),
                self.request_id
            );
            return;
        };

        for frame in self.chunker.write(data) {
            let audio = SynthesizedAudio {
                request_id: self.request_id.clone(),
                segment_id: self.segment_id.clone(),
                frame,
            };
            if frames.send(audio).is_err() {
                log::debug!("Audio queue closed, dropping frame");
            }
        }
    }

    /// The session has produced all of its audio.
    pub fn on_complete(&mut self) {
        if self.is_finished() {
            log::warn!("Ignoring repeated completion for request {}", self.request_id);
            return;
        }

        if let Some(frames) = self.frames.take() {
            for frame in self.chunker.flush() {
                let audio = SynthesizedAudio {
                    request_id: self.request_id.clone(),
                    segment_id: self.segment_id.clone(),
                    frame,
                };
                if frames.send(audio).is_err() {
                    log::debug!("Audio queue closed, dropping final frame");
                }
            }
        }
        log::info!("Synthesis complete for request {}", self.request_id);
        self.finish(Ok(()));
    }

    /// The session failed; no further audio will be accepted.
    pub fn on_error(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.is_finished() {
            log::warn!("Ignoring error after session end: {reason}");
            return;
        }

        log::error!("Synthesis failed for request {}: {reason}", self.request_id);
        self.frames = None;
        self.finish(Err(reason));
    }

    fn finish(&mut self, outcome: std::result::Result<(), String>) {
        if let Some(done) = self.done.take() {
            // The coordinator may already be gone after a cancel.
            let _ = done.send(outcome);
        }
    }
}

impl Drop for AudioSink {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.frames = None;
            self.finish(Err(
                "backend released the session without completing it".to_string()
            ));
        }
    }
}

pub(crate) fn completion_result(
    outcome: std::result::Result<std::result::Result<(), String>, oneshot::error::RecvError>,
) -> Result<()> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(TtsError::Backend(reason)),
        Err(_) => Err(TtsError::Backend(
            "session callback was dropped before completion".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn sink() -> (AudioSink, mpsc::UnboundedReceiver<SynthesizedAudio>, Completion) {
        let chunker = AudioByteStream::with_frame_duration(8000, 1, Duration::from_millis(10));
        AudioSink::new("req".to_string(), "seg".to_string(), chunker)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SynthesizedAudio>) -> Vec<u8> {
        let mut bytes = Vec::new();
        while let Ok(audio) = rx.try_recv() {
            assert_eq!(audio.request_id, "req");
            assert_eq!(audio.segment_id, "seg");
            bytes.extend_from_slice(audio.frame.data());
        }
        bytes
    }

    #[test]
    fn completion_flushes_and_closes_queue() {
        let (mut sink, mut rx, mut done) = sink();
        sink.on_audio(&[1u8; 200]);
        assert_eq!(drain(&mut rx).len(), 160);

        sink.on_complete();
        assert_eq!(drain(&mut rx), vec![1u8; 40]);
        assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
        assert_eq!(done.try_recv().unwrap(), Ok(()));
    }

    #[test]
    fn audio_after_completion_is_discarded() {
        let (mut sink, mut rx, _done) = sink();
        sink.on_complete();
        sink.on_audio(&[7u8; 500]);
        assert!(drain(&mut rx).is_empty());
        assert!(sink.is_finished());
    }

    #[test]
    fn error_fires_completion_with_reason() {
        let (mut sink, mut rx, mut done) = sink();
        sink.on_audio(&[3u8; 100]);
        sink.on_error("quota exceeded");
        sink.on_complete();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(done.try_recv().unwrap(), Err("quota exceeded".to_string()));
    }

    #[test]
    fn dropping_unfinished_sink_reports_error() {
        let (sink, _rx, done) = sink();
        drop(sink);
        let result = completion_result(done.blocking_recv());
        assert!(matches!(result, Err(TtsError::Backend(_))));
    }
}

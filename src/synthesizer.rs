//! Streaming synthesis coordinator.
//!
//! [`StreamingTts::stream`] starts one request. Text pushed into the returned
//! [`SynthesizeStream`] flows through three concurrent stages:
//!
//! 1. **intake** - feeds text fragments and flush markers into the sentence
//!    stream, ends it when input ends;
//! 2. **dispatch** - sends each finished sentence to the backend session in
//!    order, then completes the session and waits for the backend to confirm;
//! 3. **output** - forwards framed audio from the session's [`AudioSink`] to
//!    the consumer until the sink closes the audio queue.
//!
//! The first stage error fails the request and stops the other stages. A
//! cancel (explicit, or by dropping the handle) stops all stages at their next
//! await point and closes the session.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::audio::{AudioByteStream, SynthesizedAudio};
use crate::backend::{completion_result, AudioSink, BackendSession, Completion, SynthesisBackend};
use crate::options::TtsOptions;
use crate::tokenize::{IncrementalSegmenter, Segments, SentenceTokenizer, Tokenizer};
use crate::{Result, TtsError};

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created, task not started yet.
    Idle,
    /// Accepting text and synthesizing.
    Running,
    /// Input ended; remaining sentences and audio are being drained.
    Draining,
    /// Finished, either completed or cancelled.
    Done,
    /// Finished with an error.
    Failed,
}

/// How a request that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
}

/// Streaming text-to-speech front end.
///
/// Holds the validated options, the backend and the sentence tokenizer. Every
/// call to [`stream`](Self::stream) is an independent request with its own
/// backend session.
///
/// ```no_run
/// use tts_stream::engines::{EngineBackend, ToneEngine};
/// use tts_stream::{StreamingTts, TtsOptions};
///
/// # async fn run() -> tts_stream::Result<()> {
/// let tts = StreamingTts::new(TtsOptions::default(), EngineBackend::new(ToneEngine::new(16000)))?;
/// let mut stream = tts.stream();
/// stream.push_text("你好，")?;
/// stream.push_text("世界。")?;
/// stream.end_input()?;
/// while let Some(audio) = stream.recv().await {
///     println!("{} samples", audio.frame.samples_per_channel());
/// }
/// stream.join().await?;
/// # Ok(())
/// # }
/// ```
pub struct StreamingTts {
    options: Arc<TtsOptions>,
    backend: Arc<dyn SynthesisBackend>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl StreamingTts {
    /// Validate `options` and create the front end.
    pub fn new<B: SynthesisBackend + 'static>(options: TtsOptions, backend: B) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options: Arc::new(options),
            backend: Arc::new(backend),
            tokenizer: Arc::new(SentenceTokenizer::default()),
        })
    }

    /// Replace the sentence tokenizer used to segment pushed text.
    pub fn with_sentence_tokenizer<T: Tokenizer + 'static>(mut self, tokenizer: T) -> Self {
        self.tokenizer = Arc::new(tokenizer);
        self
    }

    pub fn options(&self) -> &TtsOptions {
        &self.options
    }

    pub fn sample_rate(&self) -> u32 {
        self.options.sample_rate()
    }

    pub fn num_channels(&self) -> u16 {
        self.options.num_channels()
    }

    /// Start a streaming request.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn stream(&self) -> SynthesizeStream {
        let request_id = short_id();
        let segment_id = short_id();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(StreamState::Idle);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let request = Request {
            options: Arc::clone(&self.options),
            backend: Arc::clone(&self.backend),
            tokenizer: Arc::clone(&self.tokenizer),
            request_id: request_id.clone(),
            segment_id: segment_id.clone(),
            input: input_rx,
            events: events_tx,
            state: state_tx,
            shutdown: shutdown_rx,
        };
        log::debug!("Starting synthesis request {request_id}");
        let task = tokio::spawn(request.run());

        SynthesizeStream {
            request_id,
            segment_id,
            input: Some(input_tx),
            events: events_rx,
            state: state_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

enum TextInput {
    Text(String),
    Flush,
}

/// Handle to one streaming request.
///
/// Push text with [`push_text`](Self::push_text), mark sentence boundaries
/// with [`flush`](Self::flush), finish with [`end_input`](Self::end_input),
/// and read audio with [`recv`](Self::recv) or as a [`Stream`]. The audio
/// stream ends when the request finishes; [`join`](Self::join) then reports
/// how it finished.
///
/// Dropping the handle cancels the request.
pub struct SynthesizeStream {
    request_id: String,
    segment_id: String,
    input: Option<mpsc::UnboundedSender<TextInput>>,
    events: mpsc::UnboundedReceiver<SynthesizedAudio>,
    state: watch::Receiver<StreamState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<Result<StreamOutcome>>>,
}

impl SynthesizeStream {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn segment_id(&self) -> &str {
        &self.segment_id
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    fn send_input(&self, item: TextInput) -> Result<()> {
        self.input
            .as_ref()
            .ok_or(TtsError::InputEnded)?
            .send(item)
            .map_err(|_| TtsError::ChannelClosed("synthesis request has stopped"))
    }

    /// Queue a text fragment.
    pub fn push_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_input(TextInput::Text(text.into()))
    }

    /// Treat everything pushed so far as complete sentences.
    pub fn flush(&self) -> Result<()> {
        self.send_input(TextInput::Flush)
    }

    /// Signal that no more text follows.
    pub fn end_input(&mut self) -> Result<()> {
        self.input.take().map(drop).ok_or(TtsError::InputEnded)
    }

    /// Next audio frame, or `None` once the request has finished.
    pub async fn recv(&mut self) -> Option<SynthesizedAudio> {
        self.events.recv().await
    }

    /// Ask all stages to stop. Audio already delivered is not retracted.
    pub fn cancel(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait for the request to finish. Ends input if it is still open.
    ///
    /// Returns [`StreamOutcome::Cancelled`] for cancelled requests; only
    /// configuration and backend failures are errors.
    pub async fn join(mut self) -> Result<StreamOutcome> {
        self.input = None;
        let Some(task) = self.task.take() else {
            return Err(TtsError::ChannelClosed("request already joined"));
        };
        task.await
            .map_err(|e| TtsError::Backend(format!("synthesis task aborted: {e}")))?
    }
}

impl Stream for SynthesizeStream {
    type Item = SynthesizedAudio;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SynthesizedAudio>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl Drop for SynthesizeStream {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.shutdown.send_replace(true);
        }
    }
}

/// Everything one request task owns.
struct Request {
    options: Arc<TtsOptions>,
    backend: Arc<dyn SynthesisBackend>,
    tokenizer: Arc<dyn Tokenizer>,
    request_id: String,
    segment_id: String,
    input: mpsc::UnboundedReceiver<TextInput>,
    events: mpsc::UnboundedSender<SynthesizedAudio>,
    state: watch::Sender<StreamState>,
    shutdown: watch::Receiver<bool>,
}

impl Request {
    async fn run(self) -> Result<StreamOutcome> {
        let Request {
            options,
            backend,
            tokenizer,
            request_id,
            segment_id,
            input,
            events,
            state,
            mut shutdown,
        } = self;
        state.send_replace(StreamState::Running);

        let (segmenter, segments) = tokenizer.stream();
        let chunker = AudioByteStream::with_frame_duration(
            options.sample_rate(),
            options.num_channels(),
            options.frame_duration(),
        );
        let (sink, audio, completion) = AudioSink::new(request_id.clone(), segment_id, chunker);

        let opened = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => None,
            opened = backend.open(&options, sink) => Some(opened),
        };
        let mut session = match opened {
            None => {
                log::info!("Request {request_id} cancelled before the session opened");
                state.send_replace(StreamState::Done);
                return Ok(StreamOutcome::Cancelled);
            }
            Some(Err(e)) => {
                log::error!("Request {request_id} failed to open a session: {e}");
                state.send_replace(StreamState::Failed);
                return Err(e);
            }
            Some(Ok(session)) => session,
        };

        let result = {
            let stages = async {
                tokio::try_join!(
                    run_intake(input, segmenter, &state),
                    run_dispatch(segments, session.as_mut(), completion),
                    run_output(audio, &events),
                )
            };
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => Ok(StreamOutcome::Cancelled),
                stages = stages => stages.map(|_| StreamOutcome::Completed),
            }
        };

        if let Err(e) = session.close().await {
            log::warn!("Ignoring error while closing session for {request_id}: {e}");
        }

        match &result {
            Ok(StreamOutcome::Completed) => {
                log::info!("Request {request_id} completed");
                state.send_replace(StreamState::Done);
            }
            Ok(StreamOutcome::Cancelled) => {
                log::info!("Request {request_id} cancelled");
                state.send_replace(StreamState::Done);
            }
            Err(e) => {
                log::error!("Request {request_id} failed: {e}");
                state.send_replace(StreamState::Failed);
            }
        }
        result
    }
}

/// Resolves once a cancel was requested or the handle is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|&stop| stop).await;
}

async fn run_intake<S: IncrementalSegmenter>(
    mut input: mpsc::UnboundedReceiver<TextInput>,
    mut segmenter: S,
    state: &watch::Sender<StreamState>,
) -> Result<()> {
    while let Some(item) = input.recv().await {
        match item {
            TextInput::Text(text) => segmenter.push_text(&text)?,
            TextInput::Flush => segmenter.flush()?,
        }
    }
    segmenter.end_input()?;
    state.send_replace(StreamState::Draining);
    log::debug!("Text input ended");
    Ok(())
}

async fn run_dispatch(
    mut segments: Segments,
    session: &mut dyn BackendSession,
    mut completion: Completion,
) -> Result<()> {
    let mut sent = 0usize;
    loop {
        tokio::select! {
            biased;
            early = &mut completion => {
                completion_result(early)?;
                return Err(TtsError::Backend(
                    "backend completed the session before all text was sent".to_string(),
                ));
            }
            sentence = segments.recv() => match sentence {
                Some(sentence) => {
                    log::info!("Synthesizing sentence: {}", sentence.text());
                    session.send(sentence.text()).await?;
                    sent += 1;
                }
                None => break,
            },
        }
    }

    log::debug!("All {sent} sentences sent, completing session");
    session.complete().await?;
    completion_result(completion.await)
}

async fn run_output(
    mut audio: mpsc::UnboundedReceiver<SynthesizedAudio>,
    events: &mpsc::UnboundedSender<SynthesizedAudio>,
) -> Result<()> {
    let mut frames = 0usize;
    while let Some(frame) = audio.recv().await {
        if events.send(frame).is_err() {
            log::debug!("Audio consumer went away, stopping output");
            break;
        }
        frames += 1;
    }
    log::debug!("Audio output finished after {frames} frames");
    Ok(())
}

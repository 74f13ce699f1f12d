/// Errors produced by the streaming synthesis pipeline.
///
/// Cancelling a request is not an error; see
/// [`StreamOutcome::Cancelled`](crate::synthesizer::StreamOutcome).
#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Synthesis backend error: {0}")]
    Backend(String),
    #[error("Input already ended; the stream cannot accept more text")]
    InputEnded,
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),
    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<derive_builder::UninitializedFieldError> for TtsError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        TtsError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TtsError>;

//! Text segmentation for streaming synthesis.
//!
//! Two granularities are provided:
//! - [`SentenceTokenizer`] - quote/bracket-aware sentence splitting, used to
//!   decide what is sent to a synthesis backend.
//! - [`WordTokenizer`] - script-aware word splitting (each CJK ideograph is a
//!   unit, Latin/digit runs stay joined).
//!
//! Both expose a one-shot [`Tokenizer::tokenize`] and an incremental
//! [`Tokenizer::stream`]. The incremental side is generic: any
//! [`BatchSegmenter`] can be wrapped in a [`SegmentStream`], so supporting a new
//! script only needs a batch splitter.
//!
//! ```
//! use tts_stream::tokenize::{IncrementalSegmenter, SentenceTokenizer, Tokenizer};
//!
//! let tokenizer = SentenceTokenizer::default();
//! let (mut stream, mut segments) = tokenizer.stream();
//! stream.push_text("今天天气很好，我们去公园散步吧。")?;
//! stream.push_text("你觉得怎么样？")?;
//! stream.end_input()?;
//!
//! let sentences: Vec<String> = segments.ready().map(|t| t.into_text()).collect();
//! assert_eq!(sentences, tokenizer.tokenize("今天天气很好，我们去公园散步吧。你觉得怎么样？"));
//! # Ok::<(), tts_stream::TtsError>(())
//! ```

pub mod sentence;
pub mod stream;
pub mod word;

pub use sentence::{SentenceSplitter, SentenceTokenizer, SentenceTokenizerOptions};
pub use stream::{SegmentStream, Segments};
pub use word::{WordSplitter, WordTokenizer, WordTokenizerOptions};

use crate::Result;

/// A segmented unit of text (sentence or word).
///
/// `start` and `end` are codepoint offsets into the text the producer has seen:
/// the input string for one-shot splitting, or everything pushed so far for a
/// [`SegmentStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    text: String,
    start: usize,
    end: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub(crate) fn shifted(self, base: usize) -> Self {
        Self {
            text: self.text,
            start: self.start + base,
            end: self.end + base,
        }
    }
}

/// One-shot splitter: text in, ordered units out.
///
/// Implementations must be total: any string, including the empty string, is
/// valid input.
pub trait BatchSegmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<Token>;
}

/// Incremental segmentation: text is pushed in fragments and finalized units
/// come out on the paired [`Segments`] receiver.
pub trait IncrementalSegmenter: Send {
    /// Append a text fragment.
    fn push_text(&mut self, text: &str) -> Result<()>;
    /// Emit everything buffered without waiting for more text.
    fn flush(&mut self) -> Result<()>;
    /// Emit everything buffered and close the output.
    fn end_input(&mut self) -> Result<()>;
}

/// A tokenizer usable by the synthesis coordinator.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Start a new incremental stream. Each call returns an independent stream
    /// with its own copy of the tokenizer options.
    fn stream(&self) -> (SegmentStream, Segments);
}

/// Joins consecutive units with a single space until the joined text reaches
/// `min_len` codepoints.
#[derive(Debug)]
pub(crate) struct UnitMerger {
    min_len: usize,
    text: String,
    len: usize,
    start: usize,
    end: usize,
}

impl UnitMerger {
    pub(crate) fn new(min_len: usize) -> Self {
        Self {
            min_len,
            text: String::new(),
            len: 0,
            start: 0,
            end: 0,
        }
    }

    /// Add a unit; returns the merged unit once it is long enough.
    pub(crate) fn push(&mut self, unit: Token) -> Option<Token> {
        if self.text.is_empty() {
            self.start = unit.start;
        } else {
            self.text.push(' ');
            self.len += 1;
        }
        self.len += unit.text.chars().count();
        self.text.push_str(&unit.text);
        self.end = unit.end;

        if self.len >= self.min_len {
            self.take()
        } else {
            None
        }
    }

    /// Take whatever is pending, even if it is still short.
    pub(crate) fn take(&mut self) -> Option<Token> {
        if self.text.is_empty() {
            return None;
        }
        self.len = 0;
        Some(Token {
            text: std::mem::take(&mut self.text),
            start: self.start,
            end: self.end,
        })
    }
}

pub(crate) fn merge_units(units: Vec<Token>, min_len: usize) -> Vec<Token> {
    let mut merger = UnitMerger::new(min_len);
    let mut merged: Vec<Token> = units
        .into_iter()
        .filter_map(|unit| merger.push(unit))
        .collect();
    merged.extend(merger.take());
    merged
}

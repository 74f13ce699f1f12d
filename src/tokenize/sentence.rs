use std::sync::Arc;

use super::stream::{SegmentStream, Segments};
use super::{merge_units, BatchSegmenter, Token, Tokenizer};

/// Configuration for [`SentenceTokenizer`].
#[derive(Debug, Clone)]
pub struct SentenceTokenizerOptions {
    /// Raw sentences are merged until the merged text has at least this many
    /// codepoints.
    pub min_sentence_len: usize,
    /// Number of trailing sentences held back by a stream on each push.
    pub stream_context_len: usize,
    /// Characters that end a sentence outside of quotes/brackets.
    pub sentence_ends: Vec<char>,
    /// Paired delimiters as `(open, close)`.
    pub quote_pairs: Vec<(char, char)>,
}

impl Default for SentenceTokenizerOptions {
    fn default() -> Self {
        Self {
            min_sentence_len: 10,
            stream_context_len: 5,
            sentence_ends: vec!['。', '！', '？', '…', '；', '.', '!', '?', ';'],
            quote_pairs: vec![
                ('\u{201c}', '\u{201d}'),
                ('\u{2018}', '\u{2019}'),
                ('"', '"'),
                ('「', '」'),
                ('『', '』'),
                ('（', '）'),
                ('(', ')'),
            ],
        }
    }
}

/// Raw sentence splitter: no length merging.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    sentence_ends: Vec<char>,
    quote_pairs: Vec<(char, char)>,
}

impl SentenceSplitter {
    pub fn new(sentence_ends: Vec<char>, quote_pairs: Vec<(char, char)>) -> Self {
        Self {
            sentence_ends,
            quote_pairs,
        }
    }

    fn is_sentence_end(&self, ch: char) -> bool {
        self.sentence_ends.contains(&ch)
    }

    /// Split `text` at terminators that are not inside an open delimiter.
    pub fn split(&self, text: &str) -> Vec<Token> {
        let mut sentences = Vec::new();
        let mut stack = DelimiterStack::new(&self.quote_pairs);
        let mut current = String::new();
        let mut start = 0;

        for (i, ch) in text.chars().enumerate() {
            current.push(ch);
            stack.feed(ch);

            if self.is_sentence_end(ch) && stack.is_balanced() {
                push_trimmed(&mut sentences, &current, start);
                current.clear();
                start = i + 1;
            }
        }
        push_trimmed(&mut sentences, &current, start);

        sentences
    }

    /// True if `text` ends with a terminator and every delimiter is closed.
    pub fn is_sentence_complete(&self, text: &str) -> bool {
        match text.chars().next_back() {
            Some(last) if self.is_sentence_end(last) => {
                let mut stack = DelimiterStack::new(&self.quote_pairs);
                text.chars().for_each(|ch| stack.feed(ch));
                stack.is_balanced()
            }
            _ => false,
        }
    }
}

impl BatchSegmenter for SentenceSplitter {
    fn segment(&self, text: &str) -> Vec<Token> {
        self.split(text)
    }
}

/// Sentence tokenizer aware of quotations and brackets.
///
/// A terminator inside `“…”`, `「…」` and similar pairs does not end the
/// sentence, so `“你好。再见”。` stays a single unit.
#[derive(Debug, Clone)]
pub struct SentenceTokenizer {
    options: SentenceTokenizerOptions,
    splitter: SentenceSplitter,
}

impl Default for SentenceTokenizer {
    fn default() -> Self {
        Self::new(SentenceTokenizerOptions::default())
    }
}

impl SentenceTokenizer {
    pub fn new(options: SentenceTokenizerOptions) -> Self {
        let splitter =
            SentenceSplitter::new(options.sentence_ends.clone(), options.quote_pairs.clone());
        Self { options, splitter }
    }

    pub fn options(&self) -> &SentenceTokenizerOptions {
        &self.options
    }

    /// Sentences with offsets, after merging short ones.
    pub fn split(&self, text: &str) -> Vec<Token> {
        merge_units(self.splitter.split(text), self.options.min_sentence_len)
    }

    pub fn is_sentence_complete(&self, text: &str) -> bool {
        self.splitter.is_sentence_complete(text)
    }
}

impl Tokenizer for SentenceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        self.split(text).into_iter().map(Token::into_text).collect()
    }

    fn stream(&self) -> (SegmentStream, Segments) {
        SegmentStream::new(
            Arc::new(self.splitter.clone()),
            self.options.min_sentence_len,
            self.options.stream_context_len,
        )
    }
}

/// Tracks currently open delimiters.
struct DelimiterStack<'a> {
    pairs: &'a [(char, char)],
    open: Vec<char>,
}

impl<'a> DelimiterStack<'a> {
    fn new(pairs: &'a [(char, char)]) -> Self {
        Self {
            pairs,
            open: Vec::new(),
        }
    }

    fn feed(&mut self, ch: char) {
        // A closer only counts when it matches the innermost opener. Checked
        // first so symmetric pairs like `"` can close.
        if let Some(&top) = self.open.last() {
            if self.pairs.iter().any(|&(o, c)| o == top && c == ch) {
                self.open.pop();
                return;
            }
        }
        if self.pairs.iter().any(|&(o, _)| o == ch) {
            self.open.push(ch);
        }
    }

    fn is_balanced(&self) -> bool {
        self.open.is_empty()
    }
}

fn push_trimmed(out: &mut Vec<Token>, sentence: &str, start: usize) {
    let trimmed = sentence.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = sentence
        .chars()
        .take_while(|c| c.is_whitespace())
        .count();
    let begin = start + lead;
    out.push(Token::new(
        trimmed,
        begin,
        begin + trimmed.chars().count(),
    ));
}

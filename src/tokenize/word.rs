use std::sync::Arc;

use super::stream::{SegmentStream, Segments};
use super::{BatchSegmenter, Token, Tokenizer};

const DEFAULT_PUNCTUATIONS: &[char] = &[
    '。', '，', '、', '：', '；', '！', '？', '（', '）', '\u{201c}', '\u{201d}', '\u{2018}',
    '\u{2019}', '「', '」', '『', '』', '【', '】', '《', '》', '〈', '〉', '…', '—', '～', '·',
    '〃', '.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']', '{', '}', '<', '>', '-',
    '_', '=', '+', '*', '/', '\\', '|', '@', '#', '$', '%', '^', '&',
];

/// Configuration for [`WordTokenizer`].
#[derive(Debug, Clone)]
pub struct WordTokenizerOptions {
    /// Minimum merged length of units emitted by a stream. Not applied by
    /// one-shot splitting.
    pub min_word_len: usize,
    /// Number of trailing words held back by a stream on each push.
    pub stream_context_len: usize,
    pub punctuations: Vec<char>,
    /// Drop punctuation instead of emitting it as single-character units.
    pub ignore_punctuation: bool,
}

impl Default for WordTokenizerOptions {
    fn default() -> Self {
        Self {
            min_word_len: 1,
            stream_context_len: 2,
            punctuations: DEFAULT_PUNCTUATIONS.to_vec(),
            ignore_punctuation: true,
        }
    }
}

/// CJK Unified Ideographs block.
pub fn is_cjk_ideograph(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&ch)
}

/// Raw word splitter.
#[derive(Debug, Clone)]
pub struct WordSplitter {
    punctuations: Vec<char>,
    ignore_punctuation: bool,
}

impl WordSplitter {
    pub fn new(punctuations: Vec<char>, ignore_punctuation: bool) -> Self {
        Self {
            punctuations,
            ignore_punctuation,
        }
    }

    fn is_punctuation(&self, ch: char) -> bool {
        self.punctuations.contains(&ch)
    }

    pub fn split(&self, text: &str) -> Vec<Token> {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut start = 0;
        let mut len = 0;

        for (i, ch) in text.chars().enumerate() {
            len = i + 1;

            if self.is_punctuation(ch) {
                flush_word(&mut words, &mut current, start, i);
                if !self.ignore_punctuation {
                    words.push(Token::new(ch.to_string(), i, i + 1));
                }
                continue;
            }

            if is_cjk_ideograph(ch) {
                flush_word(&mut words, &mut current, start, i);
                words.push(Token::new(ch.to_string(), i, i + 1));
                continue;
            }

            if ch.is_whitespace() {
                flush_word(&mut words, &mut current, start, i);
                continue;
            }

            if current.is_empty() {
                start = i;
            }
            current.push(ch);
        }
        flush_word(&mut words, &mut current, start, len);

        words
    }
}

impl BatchSegmenter for WordSplitter {
    fn segment(&self, text: &str) -> Vec<Token> {
        self.split(text)
    }
}

fn flush_word(words: &mut Vec<Token>, current: &mut String, start: usize, end: usize) {
    if !current.is_empty() {
        words.push(Token::new(std::mem::take(current), start, end));
    }
}

/// Word tokenizer for mixed CJK and Latin text.
///
/// Every CJK ideograph is its own unit; runs of letters and digits stay
/// joined; whitespace separates; punctuation is dropped or emitted on its own
/// depending on [`WordTokenizerOptions::ignore_punctuation`].
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    options: WordTokenizerOptions,
    splitter: WordSplitter,
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new(WordTokenizerOptions::default())
    }
}

impl WordTokenizer {
    pub fn new(options: WordTokenizerOptions) -> Self {
        let splitter = WordSplitter::new(options.punctuations.clone(), options.ignore_punctuation);
        Self { options, splitter }
    }

    pub fn options(&self) -> &WordTokenizerOptions {
        &self.options
    }

    /// Words with their codepoint offsets.
    pub fn split(&self, text: &str) -> Vec<Token> {
        self.splitter.split(text)
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        self.split(text).into_iter().map(Token::into_text).collect()
    }

    fn stream(&self) -> (SegmentStream, Segments) {
        SegmentStream::new(
            Arc::new(self.splitter.clone()),
            self.options.min_word_len,
            self.options.stream_context_len,
        )
    }
}

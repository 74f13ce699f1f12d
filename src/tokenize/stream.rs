use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::{BatchSegmenter, IncrementalSegmenter, Token, UnitMerger};
use crate::{Result, TtsError};

/// Incremental segmentation over any [`BatchSegmenter`].
///
/// Every push re-segments the buffered text. All units except the last
/// `context_len` are final: they are merged (see
/// [`Tokenizer::tokenize`](super::Tokenizer::tokenize)), sent to the paired
/// [`Segments`], and removed from the buffer. The held-back units may still
/// grow, e.g. when a quotation closes in a later fragment.
pub struct SegmentStream {
    segmenter: Arc<dyn BatchSegmenter>,
    context_len: usize,
    merger: UnitMerger,
    buffer: String,
    /// Codepoint offset of `buffer` within everything pushed so far.
    base: usize,
    tx: Option<mpsc::UnboundedSender<Token>>,
}

impl SegmentStream {
    /// Create a stream and its output half.
    ///
    /// `context_len` is raised to 1: the last unit of a partial buffer is never
    /// known to be complete.
    pub fn new(
        segmenter: Arc<dyn BatchSegmenter>,
        min_unit_len: usize,
        context_len: usize,
    ) -> (Self, Segments) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = Self {
            segmenter,
            context_len: context_len.max(1),
            merger: UnitMerger::new(min_unit_len),
            buffer: String::new(),
            base: 0,
            tx: Some(tx),
        };
        (stream, Segments { rx })
    }

    /// Text pushed but not yet emitted.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    fn ensure_open(&self) -> Result<()> {
        if self.tx.is_none() {
            return Err(TtsError::InputEnded);
        }
        Ok(())
    }

    fn emit(&mut self, unit: Token) {
        if let Some(merged) = self.merger.push(unit.shifted(self.base)) {
            self.send(merged);
        }
    }

    fn send(&self, token: Token) {
        if let Some(tx) = &self.tx {
            if tx.send(token).is_err() {
                log::debug!("Segment receiver dropped, discarding unit");
            }
        }
    }
}

impl IncrementalSegmenter for SegmentStream {
    fn push_text(&mut self, text: &str) -> Result<()> {
        self.ensure_open()?;
        self.buffer.push_str(text);

        let units = self.segmenter.segment(&self.buffer);
        if units.len() <= self.context_len {
            return Ok(());
        }

        let ready = units.len() - self.context_len;
        let mut consumed = 0;
        for unit in units.into_iter().take(ready) {
            consumed = unit.end();
            self.emit(unit);
        }

        let byte_end = self
            .buffer
            .char_indices()
            .nth(consumed)
            .map_or(self.buffer.len(), |(idx, _)| idx);
        self.buffer.drain(..byte_end);
        self.base += consumed;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;

        for unit in self.segmenter.segment(&self.buffer) {
            self.emit(unit);
        }
        if let Some(rest) = self.merger.take() {
            self.send(rest);
        }

        self.base += self.buffer.chars().count();
        self.buffer.clear();
        Ok(())
    }

    fn end_input(&mut self) -> Result<()> {
        self.flush()?;
        self.tx = None;
        Ok(())
    }
}

/// Output half of a [`SegmentStream`]: units in input order.
///
/// Ends once the stream has seen `end_input` and everything has been read.
/// Consume asynchronously through [`Stream`] / [`Segments::recv`], or
/// synchronously with [`Segments::try_next`].
pub struct Segments {
    rx: mpsc::UnboundedReceiver<Token>,
}

impl Segments {
    pub async fn recv(&mut self) -> Option<Token> {
        self.rx.recv().await
    }

    /// Next unit if one is already available.
    pub fn try_next(&mut self) -> Option<Token> {
        self.rx.try_recv().ok()
    }

    /// Iterate over the units available right now.
    pub fn ready(&mut self) -> impl Iterator<Item = Token> + '_ {
        std::iter::from_fn(move || self.try_next())
    }
}

impl Stream for Segments {
    type Item = Token;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Token>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::tokenize::{
        SentenceTokenizer, SentenceTokenizerOptions, Tokenizer, WordTokenizer,
    };

    fn push_in_chunks(
        tokenizer: &dyn Tokenizer,
        text: &str,
        chunk_chars: usize,
    ) -> Vec<Token> {
        let (mut stream, mut segments) = tokenizer.stream();
        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(chunk_chars) {
            stream
                .push_text(&chunk.iter().collect::<String>())
                .expect("stream open");
        }
        stream.end_input().expect("stream open");
        segments.ready().collect()
    }

    const TEXT: &str = "他说：\u{201c}明天见。后天也行。\u{201d}然后就走了。\
                        天气很好！我们去公园散步吧？好。Then we left. The end";

    #[test]
    fn chunked_sentences_match_one_shot() {
        let tokenizer = SentenceTokenizer::default();
        let expected = tokenizer.tokenize(TEXT);
        for chunk_chars in [1, 2, 3, 7, 13, 1000] {
            let streamed: Vec<String> = push_in_chunks(&tokenizer, TEXT, chunk_chars)
                .into_iter()
                .map(Token::into_text)
                .collect();
            assert_eq!(streamed, expected, "chunk size {chunk_chars}");
        }
    }

    #[test]
    fn chunked_sentences_match_with_small_context() {
        let tokenizer = SentenceTokenizer::new(SentenceTokenizerOptions {
            min_sentence_len: 0,
            stream_context_len: 0,
            ..Default::default()
        });
        let expected = tokenizer.tokenize(TEXT);
        for chunk_chars in [1, 4, 9] {
            let streamed: Vec<String> = push_in_chunks(&tokenizer, TEXT, chunk_chars)
                .into_iter()
                .map(Token::into_text)
                .collect();
            assert_eq!(streamed, expected, "chunk size {chunk_chars}");
        }
    }

    #[test]
    fn chunked_words_match_one_shot() {
        let tokenizer = WordTokenizer::default();
        let text = "我爱Python3，也爱 Rust 2021 edition。";
        let expected = tokenizer.split(text);
        for chunk_chars in [1, 2, 5] {
            assert_eq!(push_in_chunks(&tokenizer, text, chunk_chars), expected);
        }
    }

    #[test]
    fn offsets_are_cumulative_and_monotonic() {
        let tokenizer = SentenceTokenizer::new(SentenceTokenizerOptions {
            min_sentence_len: 0,
            stream_context_len: 1,
            ..Default::default()
        });
        let tokens = push_in_chunks(&tokenizer, TEXT, 3);
        let chars: Vec<char> = TEXT.chars().collect();
        let mut last_start = 0;
        for token in &tokens {
            assert!(token.start() >= last_start);
            last_start = token.start();
            let slice: String = chars[token.start()..token.end()].iter().collect();
            assert_eq!(slice, token.text());
        }
    }

    #[test]
    fn context_units_are_held_back_until_end() {
        let tokenizer = SentenceTokenizer::new(SentenceTokenizerOptions {
            min_sentence_len: 0,
            stream_context_len: 2,
            ..Default::default()
        });
        let (mut stream, mut segments) = tokenizer.stream();

        stream.push_text("一。二。").unwrap();
        assert!(segments.try_next().is_none());

        stream.push_text("三。").unwrap();
        assert_eq!(segments.try_next().unwrap().text(), "一。");
        assert!(segments.try_next().is_none());
        assert_eq!(stream.buffered(), "二。三。");

        stream.end_input().unwrap();
        let rest: Vec<String> = segments.ready().map(Token::into_text).collect();
        assert_eq!(rest, vec!["二。", "三。"]);
    }

    #[test]
    fn open_quote_is_not_emitted_early() {
        let tokenizer = SentenceTokenizer::new(SentenceTokenizerOptions {
            min_sentence_len: 0,
            stream_context_len: 1,
            ..Default::default()
        });
        let (mut stream, mut segments) = tokenizer.stream();
        stream.push_text("\u{201c}你好。").unwrap();
        stream.push_text("再见").unwrap();
        assert!(segments.try_next().is_none());
        stream.push_text("\u{201d}。后来。").unwrap();
        assert_eq!(
            segments.try_next().unwrap().text(),
            "\u{201c}你好。再见\u{201d}。"
        );
    }

    #[test]
    fn flush_emits_buffer_without_closing() {
        let tokenizer = SentenceTokenizer::default();
        let (mut stream, mut segments) = tokenizer.stream();
        stream.push_text("短句。没有结束").unwrap();
        stream.flush().unwrap();
        assert_eq!(segments.try_next().unwrap().text(), "短句。 没有结束");
        assert_eq!(stream.buffered(), "");

        stream.push_text("继续说下去，直到句子足够长。").unwrap();
        stream.end_input().unwrap();
        let last = segments.try_next().unwrap();
        assert_eq!(last.text(), "继续说下去，直到句子足够长。");
        assert_eq!(last.start(), 7);
    }

    #[test]
    fn input_after_end_is_rejected() {
        let (mut stream, _segments) = SentenceTokenizer::default().stream();
        stream.end_input().unwrap();
        assert!(matches!(stream.push_text("x"), Err(TtsError::InputEnded)));
        assert!(matches!(stream.flush(), Err(TtsError::InputEnded)));
        assert!(matches!(stream.end_input(), Err(TtsError::InputEnded)));
    }

    #[tokio::test]
    async fn segments_stream_terminates_after_end_input() {
        let (mut stream, segments) = SentenceTokenizer::default().stream();
        stream.push_text("第一句话已经足够长了。第二句").unwrap();
        stream.end_input().unwrap();
        let collected: Vec<Token> = segments.collect().await;
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[1].text(), "第二句");
    }
}

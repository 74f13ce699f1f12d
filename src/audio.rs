//! PCM framing.
//!
//! Backends deliver audio in whatever chunk sizes their transport produces.
//! [`AudioByteStream`] repacks those bytes into fixed-duration [`AudioFrame`]s
//! of interleaved signed 16-bit little-endian samples.

use std::io::{Cursor, Seek, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::{Result, TtsError};

/// Bytes per sample (16-bit PCM).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Frame duration used when none is configured.
pub const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(100);

/// An immutable block of interleaved PCM16 samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    data: Arc<[u8]>,
    sample_rate: u32,
    num_channels: u16,
}

impl AudioFrame {
    pub fn new(data: impl Into<Arc<[u8]>>, sample_rate: u32, num_channels: u16) -> Self {
        Self {
            data: data.into(),
            sample_rate,
            num_channels,
        }
    }

    /// Raw little-endian sample bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    pub fn samples_per_channel(&self) -> usize {
        self.data.len() / (BYTES_PER_SAMPLE * self.num_channels.max(1) as usize)
    }

    pub fn duration(&self) -> Duration {
        let nanos =
            self.samples_per_channel() as u128 * 1_000_000_000 / self.sample_rate.max(1) as u128;
        Duration::from_nanos(nanos as u64)
    }

    /// Decoded samples. A trailing partial sample is ignored.
    pub fn samples(&self) -> Vec<i16> {
        self.data
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }
}

/// One frame of a synthesis request, as delivered to the consumer.
///
/// All frames of one [`SynthesizeStream`](crate::SynthesizeStream) share the
/// same `(request_id, segment_id)` and are temporally contiguous.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub request_id: String,
    pub segment_id: String,
    pub frame: AudioFrame,
}

/// Repacks arbitrarily sized byte buffers into fixed-size frames.
///
/// Bytes are never dropped or duplicated: everything passed to
/// [`write`](Self::write) comes back out of `write` or [`flush`](Self::flush),
/// in order.
#[derive(Debug)]
pub struct AudioByteStream {
    sample_rate: u32,
    num_channels: u16,
    bytes_per_frame: usize,
    buf: Vec<u8>,
}

impl AudioByteStream {
    /// Chunker producing [`DEFAULT_FRAME_DURATION`] frames.
    pub fn new(sample_rate: u32, num_channels: u16) -> Self {
        Self::with_frame_duration(sample_rate, num_channels, DEFAULT_FRAME_DURATION)
    }

    pub fn with_frame_duration(sample_rate: u32, num_channels: u16, frame: Duration) -> Self {
        let samples_per_channel =
            ((sample_rate as u128 * frame.as_micros()) / 1_000_000).max(1) as usize;
        let bytes_per_frame = samples_per_channel * num_channels.max(1) as usize * BYTES_PER_SAMPLE;
        Self {
            sample_rate,
            num_channels,
            bytes_per_frame,
            buf: Vec::new(),
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_frame
    }

    /// Bytes held back waiting for a complete frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Append bytes and return every frame that is now complete.
    pub fn write(&mut self, data: &[u8]) -> Vec<AudioFrame> {
        self.buf.extend_from_slice(data);

        let complete = self.buf.len() / self.bytes_per_frame * self.bytes_per_frame;
        if complete == 0 {
            return Vec::new();
        }

        let frames = self.buf[..complete]
            .chunks_exact(self.bytes_per_frame)
            .map(|chunk| AudioFrame::new(chunk, self.sample_rate, self.num_channels))
            .collect();
        self.buf.drain(..complete);
        frames
    }

    /// Emit the remaining partial frame, if any.
    pub fn flush(&mut self) -> Vec<AudioFrame> {
        if self.buf.is_empty() {
            return Vec::new();
        }
        if self.buf.len() % (BYTES_PER_SAMPLE * self.num_channels.max(1) as usize) != 0 {
            log::warn!(
                "Flushing {} bytes that do not form whole samples; emitting as-is",
                self.buf.len()
            );
        }
        let data = std::mem::take(&mut self.buf);
        vec![AudioFrame::new(data, self.sample_rate, self.num_channels)]
    }
}

/// Encode frames as a 16-bit PCM WAV into `writer`.
///
/// All frames must share sample rate and channel count.
pub fn write_wav_to<W: Write + Seek>(frames: &[AudioFrame], writer: W) -> Result<()> {
    let first = frames
        .first()
        .ok_or_else(|| TtsError::Configuration("no audio frames to encode".to_string()))?;
    let spec = hound::WavSpec {
        channels: first.num_channels(),
        sample_rate: first.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut wav = hound::WavWriter::new(writer, spec)?;
    for frame in frames {
        if frame.sample_rate() != spec.sample_rate || frame.num_channels() != spec.channels {
            return Err(TtsError::Configuration(format!(
                "frame format {}Hz/{}ch differs from {}Hz/{}ch",
                frame.sample_rate(),
                frame.num_channels(),
                spec.sample_rate,
                spec.channels
            )));
        }
        for sample in frame.samples() {
            wav.write_sample(sample)?;
        }
    }
    wav.finalize()?;
    Ok(())
}

/// Encode frames as an in-memory WAV file.
pub fn encode_wav(frames: &[AudioFrame]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_wav_to(frames, &mut cursor)?;
    Ok(cursor.into_inner())
}

/// Write frames to a WAV file at `path`.
pub fn write_wav(frames: &[AudioFrame], path: &Path) -> Result<()> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_wav_to(frames, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn frame_size_follows_duration_rate_and_channels() {
        assert_eq!(AudioByteStream::new(16000, 1).bytes_per_frame(), 3200);
        assert_eq!(AudioByteStream::new(48000, 2).bytes_per_frame(), 19200);
        assert_eq!(
            AudioByteStream::with_frame_duration(24000, 1, Duration::from_millis(20))
                .bytes_per_frame(),
            960
        );
    }

    #[test]
    fn remainder_only_appears_on_flush() {
        let mut chunker = AudioByteStream::with_frame_duration(8000, 1, Duration::from_millis(10));
        let frame_size = chunker.bytes_per_frame();
        assert_eq!(frame_size, 160);

        let input = pattern(frame_size * 3 + 37);
        let mut out = Vec::new();
        let mut from_write = 0;
        for piece in [&input[..5], &input[5..170], &input[170..171], &input[171..]] {
            for frame in chunker.write(piece) {
                assert_eq!(frame.data().len(), frame_size);
                from_write += frame.data().len();
                out.extend_from_slice(frame.data());
            }
        }
        assert_eq!(from_write, frame_size * 3);
        assert_eq!(chunker.pending(), 37);

        let tail = chunker.flush();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].data().len(), 37);
        out.extend_from_slice(tail[0].data());

        assert_eq!(out, input);
        assert!(chunker.flush().is_empty());
    }

    #[test]
    fn exact_multiple_leaves_nothing_to_flush() {
        let mut chunker = AudioByteStream::new(16000, 1);
        let frames = chunker.write(&pattern(3200 * 2));
        assert_eq!(frames.len(), 2);
        assert!(chunker.flush().is_empty());
    }

    #[test]
    fn long_frame_duration_does_not_preallocate() {
        let mut chunker =
            AudioByteStream::with_frame_duration(48000, 2, Duration::from_secs(u32::MAX as u64));
        assert_eq!(chunker.pending(), 0);
        assert!(chunker.write(&[1u8; 8]).is_empty());
        assert_eq!(chunker.flush().len(), 1);
    }

    #[test]
    fn frame_metadata() {
        let mut chunker = AudioByteStream::new(16000, 1);
        let frames = chunker.write(&vec![0u8; 3200]);
        let frame = &frames[0];
        assert_eq!(frame.sample_rate(), 16000);
        assert_eq!(frame.num_channels(), 1);
        assert_eq!(frame.samples_per_channel(), 1600);
        assert_eq!(frame.duration(), Duration::from_millis(100));
    }

    #[test]
    fn samples_decode_little_endian() {
        let frame = AudioFrame::new(vec![0x01, 0x00, 0xff, 0xff, 0x00, 0x80], 8000, 1);
        assert_eq!(frame.samples(), vec![1, -1, i16::MIN]);
    }

    #[test]
    fn wav_encoding_keeps_every_sample() {
        let mut chunker = AudioByteStream::new(16000, 1);
        let mut frames = chunker.write(&pattern(7000));
        frames.extend(chunker.flush());

        let wav = encode_wav(&frames).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.len(), 3500);
    }

    #[test]
    fn wav_encoding_rejects_mixed_formats() {
        let frames = vec![
            AudioFrame::new(vec![0u8; 4], 16000, 1),
            AudioFrame::new(vec![0u8; 4], 24000, 1),
        ];
        assert!(matches!(encode_wav(&frames), Err(TtsError::Configuration(_))));
        assert!(matches!(encode_wav(&[]), Err(TtsError::Configuration(_))));
    }
}

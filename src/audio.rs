//! # Utterance Audio Buffer
//!
//! Accumulates decoded PCM bytes for one utterance. Unlike a sliding
//! capture window, this buffer never discards data: every frame the
//! client sent between two utterance boundaries reaches the backend, in
//! order. It is drained exactly once per utterance via [`UtteranceBuffer::take`].
//!
//! ## Audio Format:
//! - **Sample Rate**: 16 kHz
//! - **Bit Depth**: 16-bit signed PCM
//! - **Channels**: Mono
//! - **Encoding**: Little-endian

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// The only sample rate the pipeline accepts.
pub const SAMPLE_RATE: u32 = 16_000;

/// Per-utterance audio accumulation buffer.
///
/// Owned exclusively by the session task; no locking is needed.
#[derive(Debug, Default)]
pub struct UtteranceBuffer {
    data: Vec<u8>,
}

impl UtteranceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one decoded audio chunk.
    ///
    /// Validates the framing a 16-bit PCM stream requires: chunks must be
    /// non-empty and of even length.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), String> {
        if chunk.is_empty() {
            return Err("empty audio chunk".to_string());
        }
        if chunk.len() % 2 != 0 {
            return Err("audio chunk length must be even for 16-bit samples".to_string());
        }

        self.data.extend_from_slice(chunk);
        Ok(())
    }

    /// Drain the accumulated utterance, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration of buffered audio in seconds (16 kHz mono, 2 bytes per
    /// sample).
    pub fn duration_seconds(&self) -> f64 {
        (self.data.len() / 2) as f64 / SAMPLE_RATE as f64
    }
}

/// Peak absolute sample amplitude of a PCM chunk.
///
/// Used for debug-level instrumentation of incoming audio; a stream of
/// zero peaks usually means the client is sending silence or the capture
/// device is misconfigured.
pub fn peak_amplitude(pcm: &[u8]) -> i16 {
    let mut cursor = Cursor::new(pcm);
    let mut peak: i16 = 0;

    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        peak = peak.max(sample.saturating_abs());
    }

    peak
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_accumulates_in_order() {
        let mut buffer = UtteranceBuffer::new();
        buffer.append(&[1, 0, 2, 0]).unwrap();
        buffer.append(&[3, 0]).unwrap();
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.take(), vec![1, 0, 2, 0, 3, 0]);
    }

    #[test]
    fn take_clears_the_buffer() {
        let mut buffer = UtteranceBuffer::new();
        buffer.append(&[0, 0]).unwrap();
        let _ = buffer.take();
        assert!(buffer.is_empty());
    }

    #[test]
    fn rejects_empty_chunk() {
        let mut buffer = UtteranceBuffer::new();
        assert!(buffer.append(&[]).is_err());
    }

    #[test]
    fn rejects_odd_length_chunk() {
        let mut buffer = UtteranceBuffer::new();
        assert!(buffer.append(&[1, 2, 3]).is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn duration_matches_sample_math() {
        let mut buffer = UtteranceBuffer::new();
        // One second of 16 kHz mono 16-bit audio.
        buffer.append(&vec![0u8; 32_000]).unwrap();
        assert!((buffer.duration_seconds() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn peak_amplitude_finds_loudest_sample() {
        // Samples: 100, -2000, 50 (little-endian).
        let pcm = [100i16, -2000, 50]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect::<Vec<u8>>();
        assert_eq!(peak_amplitude(&pcm), 2000);
    }

    #[test]
    fn peak_amplitude_of_silence_is_zero() {
        assert_eq!(peak_amplitude(&[0u8; 64]), 0);
    }
}

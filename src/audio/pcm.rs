//! Base64 → PCM16 decoding.
//!
//! Gemini returns raw little-endian signed 16-bit samples, base64 encoded,
//! with no container header. Samples are normalized by `s / 32768.0`, so
//! `i16::MIN` maps to exactly -1.0 and `i16::MAX` to just under +1.0.

use std::num::NonZeroU16;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

/// Output sample rate of the Gemini TTS models.
pub const SAMPLE_RATE: u32 = 24000;

pub const MONO: NonZeroU16 = NonZeroU16::MIN;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Decoded, normalized audio, one sample vector per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    channels: Vec<Vec<f32>>,
    frame_count: usize,
    sample_rate: u32,
}

impl DecodedAudio {
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count as f64 / self.sample_rate as f64)
    }

    /// Frames re-interleaved for output devices that take a flat buffer.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.frame_count * self.channels.len());
        for i in 0..self.frame_count {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }
}

/// Decode a standard-alphabet, padded base64 string.
pub fn decode(base64: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(base64)?)
}

/// Interpret `bytes` as interleaved PCM16 LE and normalize to f32.
///
/// A trailing odd byte is ignored. If the sample count is not a multiple of
/// `channel_count`, the trailing partial frame is dropped.
pub fn decode_pcm(bytes: &[u8], sample_rate: u32, channel_count: NonZeroU16) -> DecodedAudio {
    let n_channels = channel_count.get() as usize;
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let frame_count = samples.len() / n_channels;
    let channels = (0..n_channels)
        .map(|c| {
            (0..frame_count)
                .map(|i| samples[i * n_channels + c] as f32 / 32768.0)
                .collect()
        })
        .collect();

    DecodedAudio {
        channels,
        frame_count,
        sample_rate,
    }
}

/// Decode a Gemini audio payload: base64 PCM16 mono at 24kHz.
pub fn decode_payload(base64: &str) -> Result<DecodedAudio, DecodeError> {
    let bytes = decode(base64)?;
    Ok(decode_pcm(&bytes, SAMPLE_RATE, MONO))
}

//! Audio side of the studio.
//!
//! Components:
//! - `pcm`: base64 → PCM16 → normalized f32 frames
//! - `playback`: single-voice playback controller over a lazily opened device
//! - `wav`: 16-bit WAV export with hound

pub mod pcm;
pub mod playback;
pub mod wav;

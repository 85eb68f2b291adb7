//! tts-studio-rs: text-to-speech studio for the Gemini speech models.
//!
//! Text goes to Gemini, the base64 PCM16 reply is decoded to f32 frames and
//! played through a single-voice playback controller. Recent clips are kept
//! in memory for replay.

pub mod api;
pub mod audio;
pub mod config;
pub mod gemini;
pub mod history;
pub mod studio;
pub mod voice;

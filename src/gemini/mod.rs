//! Gemini speech synthesis.
//!
//! Components:
//! - `wire`: request/response JSON and the parsed `SynthesisOutcome`
//! - `error`: `SynthesisError` and failure classification
//! - `client`: reqwest client for `generateContent`

pub mod client;
pub mod error;
pub mod wire;

use async_trait::async_trait;

use crate::voice::Voice;

pub use client::GeminiClient;
pub use error::{SynthesisError, SynthesisErrorKind};

/// Anything that turns text into a base64 PCM16 payload.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn generate_speech(&self, text: &str, voice: Voice) -> Result<String, SynthesisError>;
}

//! Synthesis failures and their classification.
//!
//! Provider errors come back as free-form messages with an HTTP status and
//! sometimes a gRPC-style status name. Classification checks, in order:
//! safety block, transient server fault, rate limit, credential problem.
//! The first match wins; anything else keeps the provider's own message.

use serde::Serialize;
use thiserror::Error;

use super::wire::ErrorEnvelope;

const NO_AUDIO_MESSAGE: &str =
    "No audio data received. Please check your API key and input.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisErrorKind {
    ContentBlocked,
    ServerBusy,
    RateLimited,
    AuthFailed,
    Unknown,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("The text was blocked by the provider's safety filters ({reason}). Try rephrasing it.")]
    ContentBlocked { reason: String },

    #[error("The speech service is busy or temporarily unavailable. Please try again in a moment.")]
    ServerBusy { detail: String },

    #[error("Rate limit or quota exceeded. Wait a little before generating more speech.")]
    RateLimited { detail: String },

    #[error("The API key was rejected. Check GEMINI_API_KEY and select a valid key.")]
    AuthFailed { detail: String },

    #[error("{message}")]
    Unknown { message: String },
}

impl SynthesisError {
    pub fn kind(&self) -> SynthesisErrorKind {
        match self {
            Self::ContentBlocked { .. } => SynthesisErrorKind::ContentBlocked,
            Self::ServerBusy { .. } => SynthesisErrorKind::ServerBusy,
            Self::RateLimited { .. } => SynthesisErrorKind::RateLimited,
            Self::AuthFailed { .. } => SynthesisErrorKind::AuthFailed,
            Self::Unknown { .. } => SynthesisErrorKind::Unknown,
        }
    }

    /// Raw provider message behind the user-facing one.
    pub fn detail(&self) -> &str {
        match self {
            Self::ContentBlocked { reason } => reason.as_str(),
            Self::ServerBusy { detail } | Self::RateLimited { detail } | Self::AuthFailed { detail } => {
                detail.as_str()
            }
            Self::Unknown { message } => message.as_str(),
        }
    }

    /// The caller should ask for a new credential.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, Self::AuthFailed { .. })
    }

    pub fn from_failure(failure: ProviderFailure) -> Self {
        let kind = classify(&failure);
        let detail = failure.message;
        match kind {
            SynthesisErrorKind::ContentBlocked => Self::ContentBlocked { reason: detail },
            SynthesisErrorKind::ServerBusy => Self::ServerBusy { detail },
            SynthesisErrorKind::RateLimited => Self::RateLimited { detail },
            SynthesisErrorKind::AuthFailed => Self::AuthFailed { detail },
            SynthesisErrorKind::Unknown => Self::Unknown { message: detail },
        }
    }

    /// Successful exchange that carried no audio. The model's own text is
    /// passed through as-is, never classified.
    pub fn no_audio(model_text: Option<String>) -> Self {
        Self::Unknown {
            message: model_text.unwrap_or_else(|| NO_AUDIO_MESSAGE.to_string()),
        }
    }

    pub fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::ServerBusy {
                detail: format!("request timed out: {err}"),
            };
        }
        Self::from_failure(ProviderFailure {
            http_status: err.status().map(|s| s.as_u16()),
            status: None,
            message: format!("Failed to communicate with the Gemini API: {err}"),
        })
    }
}

/// Everything known about a failed exchange, before classification.
#[derive(Debug, Clone, Default)]
pub struct ProviderFailure {
    pub http_status: Option<u16>,
    /// gRPC-style status name, e.g. `RESOURCE_EXHAUSTED`.
    pub status: Option<String>,
    pub message: String,
}

impl ProviderFailure {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Build from a non-2xx response, reading the JSON error envelope if present.
    pub fn from_http(code: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Self {
                http_status: Some(code),
                status: envelope.error.status,
                message: if envelope.error.message.is_empty() {
                    format!("HTTP {code}")
                } else {
                    envelope.error.message
                },
            },
            Err(_) => Self {
                http_status: Some(code),
                status: None,
                message: if body.trim().is_empty() {
                    format!("HTTP {code}")
                } else {
                    format!("HTTP {code}: {}", truncate(body.trim(), 300))
                },
            },
        }
    }
}

pub fn classify(failure: &ProviderFailure) -> SynthesisErrorKind {
    let status = failure.status.as_deref().unwrap_or("").to_ascii_uppercase();
    let message = failure.message.to_lowercase();
    let code = failure.http_status;

    if is_safety_block(&message) {
        return SynthesisErrorKind::ContentBlocked;
    }

    let server_fault = code.is_some_and(|c| (500..600).contains(&c))
        || matches!(status.as_str(), "INTERNAL" | "UNAVAILABLE" | "DEADLINE_EXCEEDED")
        || message.contains("overloaded")
        || (code.is_none() && [500, 502, 503, 504].iter().any(|c| mentions_code(&message, *c)));
    if server_fault {
        return SynthesisErrorKind::ServerBusy;
    }

    let rate_limited = code == Some(429)
        || status == "RESOURCE_EXHAUSTED"
        || message.contains("quota")
        || message.contains("rate limit")
        || message.contains("resource_exhausted")
        || (code.is_none() && mentions_code(&message, 429));
    if rate_limited {
        return SynthesisErrorKind::RateLimited;
    }

    let auth_failed = matches!(code, Some(401 | 403))
        || matches!(status.as_str(), "UNAUTHENTICATED" | "PERMISSION_DENIED")
        || message.contains("api key not valid")
        || message.contains("api_key_invalid")
        || message.contains("entity was not found")
        || message.contains("entity not found")
        || (code.is_none() && (mentions_code(&message, 401) || mentions_code(&message, 403)));
    if auth_failed {
        return SynthesisErrorKind::AuthFailed;
    }

    SynthesisErrorKind::Unknown
}

/// Block wording only; a message that merely names a safety setting is not
/// a block.
fn is_safety_block(message: &str) -> bool {
    let blocked = message.contains("blocked") || message.contains("block reason");
    let reason = ["safety", "prohibited_content", "blocklist", "spii"]
        .iter()
        .any(|needle| message.contains(needle));
    (blocked && reason) || message.contains("content was blocked")
}

/// True if `code` appears as a standalone number in `text`.
fn mentions_code(text: &str, code: u16) -> bool {
    let needle = code.to_string();
    text.match_indices(&needle).any(|(i, _)| {
        let before = text[..i].chars().next_back();
        let after = text[i + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

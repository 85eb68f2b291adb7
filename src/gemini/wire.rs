//! Gemini `generateContent` wire types.
//!
//! The response is deeply nested and every level is optional, so it is
//! parsed once into [`SynthesisOutcome`] and nothing downstream looks at the
//! raw shape again.

use serde::{Deserialize, Serialize};

use crate::voice::Voice;

/// Prepended to every request. Without an instruction the model sometimes
/// answers the text instead of reading it.
pub const TEXT_PREFIX: &str = "Say: ";

/// Finish reasons that mean the candidate was withheld by policy filters.
const SAFETY_FINISH_REASONS: [&str; 5] = [
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

// --- Request ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct RequestContent {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<&'static str>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: Voice,
}

impl GenerateContentRequest {
    pub fn speech(text: &str, voice: Voice) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![TextPart {
                    text: format!("{TEXT_PREFIX}{text}"),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: voice },
                    },
                },
            },
        }
    }
}

// --- Response ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<ResponseContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
    pub block_reason_message: Option<String>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
}

/// What a successful HTTP exchange actually produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// Base64 PCM16 audio.
    Audio(String),
    /// Refused by the provider's safety filters.
    Blocked(String),
    /// No audio and no block; carries any text the model returned instead.
    Empty(Option<String>),
}

impl GenerateContentResponse {
    pub fn into_outcome(self) -> SynthesisOutcome {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            let message = self
                .prompt_feedback
                .and_then(|f| f.block_reason_message)
                .map(|m| format!("{reason}: {m}"))
                .unwrap_or(reason);
            return SynthesisOutcome::Blocked(message);
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return SynthesisOutcome::Empty(None);
        };

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        let mut text = None;
        for part in parts {
            if let Some(inline) = part.inline_data {
                if !inline.data.is_empty() {
                    return SynthesisOutcome::Audio(inline.data);
                }
            }
            if text.is_none() {
                text = part.text.filter(|t| !t.trim().is_empty());
            }
        }

        match candidate.finish_reason {
            Some(reason) if SAFETY_FINISH_REASONS.contains(&reason.as_str()) => {
                SynthesisOutcome::Blocked(reason)
            }
            _ => SynthesisOutcome::Empty(text),
        }
    }
}

//! HTTP client for the Gemini speech models.
//!
//! One `generateContent` call per request, no retries: the caller decides
//! whether a `ServerBusy` or `RateLimited` failure is worth another attempt.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::error::{ProviderFailure, SynthesisError};
use super::wire::{GenerateContentRequest, GenerateContentResponse, SynthesisOutcome};
use super::SpeechSynthesizer;
use crate::config::{ConfigError, SynthesisConfig};
use crate::voice::Voice;

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Build a client from config, resolving the credential up front so a
    /// missing key fails before any request is made.
    pub fn new(config: &SynthesisConfig) -> Result<Self, ConfigError> {
        let api_key = config.resolve_api_key()?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &SynthesisConfig, api_key: String) -> Result<Self, ConfigError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Synthesize `text` with `voice`. Returns the base64 PCM payload.
    pub async fn generate_speech(&self, text: &str, voice: Voice) -> Result<String, SynthesisError> {
        let t_start = Instant::now();
        let body = GenerateContentRequest::speech(text, voice);
        debug!(
            "Sending {} chars to model '{}' (voice: {voice})",
            text.chars().count(),
            self.model
        );

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Gemini request failed: {e}");
                SynthesisError::transport(e)
            })?;

        let status = resp.status();
        let raw = resp.text().await.map_err(SynthesisError::transport)?;
        let latency_ms = t_start.elapsed().as_secs_f64() * 1000.0;

        if !status.is_success() {
            let failure = ProviderFailure::from_http(status.as_u16(), &raw);
            warn!("Gemini returned status {status}: {}", failure.message);
            return Err(SynthesisError::from_failure(failure));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&raw).map_err(|e| {
            warn!("Failed to parse Gemini response: {e}");
            SynthesisError::Unknown {
                message: format!("Unreadable response from the Gemini API: {e}"),
            }
        })?;

        match parsed.into_outcome() {
            SynthesisOutcome::Audio(data) => {
                info!(
                    "Synthesized {} chars → {} bytes of base64 audio ({latency_ms:.0}ms)",
                    text.chars().count(),
                    data.len()
                );
                Ok(data)
            }
            SynthesisOutcome::Blocked(reason) => {
                warn!("Gemini blocked the request: {reason}");
                Err(SynthesisError::ContentBlocked { reason })
            }
            SynthesisOutcome::Empty(model_text) => {
                warn!("Gemini returned no audio ({latency_ms:.0}ms)");
                Err(SynthesisError::no_audio(model_text))
            }
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn generate_speech(&self, text: &str, voice: Voice) -> Result<String, SynthesisError> {
        GeminiClient::generate_speech(self, text, voice).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::pick_api_key;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = SynthesisConfig {
            base_url: "http://localhost:9000/v1beta/".into(),
            ..SynthesisConfig::default()
        };
        let client = GeminiClient::with_api_key(&config, "key".into()).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash-preview-tts:generateContent"
        );
    }

    #[test]
    fn test_placeholder_key_is_rejected_before_client_is_built() {
        let err = pick_api_key([None, Some("PLACEHOLDER_API_KEY".into())]).unwrap_err();
        assert!(matches!(err, ConfigError::PlaceholderApiKey(ref k) if k == "PLACEHOLDER_API_KEY"));

        let config = SynthesisConfig::default();
        let client = GeminiClient::with_api_key(&config, "real-key".into()).unwrap();
        assert_eq!(client.api_key, "real-key");
    }
}

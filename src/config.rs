//! Configuration management for tts-studio-rs.
//!
//! Loads config from YAML files in standard locations. The Gemini credential
//! is taken from the environment first, so the config file can be shared
//! without a secret in it.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::voice::Voice;

const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No Gemini API key configured. Set GEMINI_API_KEY or synthesis.api_key in config.yaml.")]
    MissingApiKey,

    #[error("The Gemini API key '{0}' looks like a placeholder. Replace it with a real key.")]
    PlaceholderApiKey(String),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Transport timeout. Unset means the request may wait indefinitely.
    pub timeout_secs: Option<u64>,
    pub voice: Voice,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-preview-tts".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            api_key: None,
            timeout_secs: None,
            voice: Voice::default(),
        }
    }
}

impl SynthesisConfig {
    /// Resolve the credential: `GEMINI_API_KEY`, then `API_KEY`, then the
    /// config file.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        let from_env = API_KEY_ENV_VARS
            .iter()
            .map(|var| std::env::var(var).ok());
        pick_api_key(from_env.chain([self.api_key.clone()]))
    }
}

/// First non-empty candidate wins; a placeholder there is an error rather
/// than a reason to keep looking.
pub fn pick_api_key(
    candidates: impl IntoIterator<Item = Option<String>>,
) -> Result<String, ConfigError> {
    let key = candidates
        .into_iter()
        .flatten()
        .map(|k| k.trim().to_string())
        .find(|k| !k.is_empty())
        .ok_or(ConfigError::MissingApiKey)?;

    if is_placeholder(&key) {
        return Err(ConfigError::PlaceholderApiKey(key));
    }
    Ok(key)
}

fn is_placeholder(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.contains("placeholder")
        || lower.starts_with("your")
        || lower.starts_with('<')
        || lower == "changeme"
        || lower == "undefined"
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 8768 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub synthesis: SynthesisConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/tts-studio/config.yaml
    /// 3. /etc/tts-studio/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/tts-studio/config.yaml")),
                Some(PathBuf::from("/etc/tts-studio/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}

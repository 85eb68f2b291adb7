//! Prebuilt Gemini voices.
//!
//! The provider only accepts a fixed set of voice names; anything else is a
//! caller error, so the set is closed here as an enum.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
pub enum Voice {
    Kore,
    Puck,
    Charon,
    Fenrir,
    #[default]
    Zephyr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    Male,
    Female,
    Neutral,
}

impl Voice {
    pub const ALL: [Voice; 5] = [
        Voice::Kore,
        Voice::Puck,
        Voice::Charon,
        Voice::Fenrir,
        Voice::Zephyr,
    ];

    /// Name as sent in `prebuiltVoiceConfig.voiceName`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Kore => "Kore",
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Fenrir => "Fenrir",
            Self::Zephyr => "Zephyr",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Kore => "Energetic and bright",
            Self::Puck => "Friendly and warm",
            Self::Charon => "Deep and authoritative",
            Self::Fenrir => "Calm and steady",
            Self::Zephyr => "Smooth and professional",
        }
    }

    pub fn gender(self) -> Gender {
        match self {
            Self::Kore | Self::Zephyr => Gender::Female,
            Self::Puck | Self::Charon | Self::Fenrir => Gender::Male,
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "Male"),
            Self::Female => write!(f, "Female"),
            Self::Neutral => write!(f, "Neutral"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown voice '{0}' (expected one of Kore, Puck, Charon, Fenrir, Zephyr)")]
pub struct UnknownVoice(pub String);

impl FromStr for Voice {
    type Err = UnknownVoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVoice(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("kore".parse::<Voice>().unwrap(), Voice::Kore);
        assert_eq!(" ZEPHYR ".parse::<Voice>().unwrap(), Voice::Zephyr);
        assert!("Aoede".parse::<Voice>().is_err());
    }

    #[test]
    fn test_default_voice() {
        assert_eq!(Voice::default(), Voice::Zephyr);
    }

    #[test]
    fn test_serde_uses_provider_names() {
        let json = serde_json::to_string(&Voice::Charon).unwrap();
        assert_eq!(json, "\"Charon\"");
        let v: Voice = serde_json::from_str("\"Fenrir\"").unwrap();
        assert_eq!(v, Voice::Fenrir);
    }
}

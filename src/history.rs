//! In-memory history of generated clips.
//!
//! Keeps the 10 most recent generations, newest first, so they can be
//! replayed without another request. Nothing is written to disk; the list is
//! gone when the process exits.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::voice::Voice;

pub const HISTORY_CAPACITY: usize = 10;

/// Longest text kept in an entry, including the "..." marker.
const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    /// Request text, shortened for display.
    pub text: String,
    pub voice: Voice,
    pub timestamp: DateTime<Local>,
    /// Base64 PCM16 payload as returned by the provider.
    #[serde(skip)]
    pub audio_payload: String,
}

#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    last_id: i64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a generation at the front, evicting the oldest past capacity.
    pub fn record(&mut self, text: &str, voice: Voice, audio_payload: String) -> HistoryEntry {
        let timestamp = Local::now();
        // Millisecond timestamps, bumped if two records land in the same ms
        let id = timestamp.timestamp_millis().max(self.last_id + 1);
        self.last_id = id;

        let entry = HistoryEntry {
            id: id.to_string(),
            text: truncate(text, PREVIEW_CHARS),
            voice,
            timestamp,
            audio_payload,
        };

        self.entries.push_front(entry.clone());
        self.entries.truncate(HISTORY_CAPACITY);
        entry
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries, newest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_and_bounded() {
        let mut history = History::new();
        for i in 0..15 {
            history.record(&format!("clip {i}"), Voice::Puck, format!("payload{i}"));
        }

        let entries = history.entries();
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert_eq!(entries[0].text, "clip 14");
        assert_eq!(entries[9].text, "clip 5");
    }

    #[test]
    fn test_ids_are_unique() {
        let mut history = History::new();
        let a = history.record("a", Voice::Kore, String::new());
        let b = history.record("b", Voice::Kore, String::new());
        assert_ne!(a.id, b.id);
        assert_eq!(history.get(&a.id).map(|e| e.text.as_str()), Some("a"));
    }

    #[test]
    fn test_long_text_is_truncated() {
        let mut history = History::new();
        let long = "x".repeat(100);
        let entry = history.record(&long, Voice::Zephyr, String::new());
        assert_eq!(entry.text.chars().count(), 80);
        assert!(entry.text.ends_with("..."));
        assert_eq!(&entry.text[..77], &long[..77]);

        let exact = "y".repeat(80);
        assert_eq!(history.record(&exact, Voice::Zephyr, String::new()).text, exact);
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let text = "é".repeat(90);
        let short = truncate(&text, 80);
        assert_eq!(short.chars().count(), 80);
    }

    #[test]
    fn test_payload_kept_but_not_serialized() {
        let mut history = History::new();
        let entry = history.record("hello", Voice::Charon, "AIA=".into());
        assert_eq!(history.get(&entry.id).unwrap().audio_payload, "AIA=");

        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("audio_payload").is_none());
        assert_eq!(json["voice"], "Charon");
    }
}

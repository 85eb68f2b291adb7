//! Studio orchestration: text → synthesis → history → playback.
//!
//! IDLE → GENERATING → IDLE (+ playback started)
//!
//! Only one generation runs at a time; a second submission while one is in
//! flight is rejected rather than queued. Every failure leaves the studio
//! idle and ready for the next attempt.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{info, warn};

use crate::audio::pcm::{self, DecodeError};
use crate::audio::wav;
use crate::audio::playback::{PlaybackController, PlaybackError, PlaybackId};
use crate::gemini::{SpeechSynthesizer, SynthesisError};
use crate::history::{History, HistoryEntry};
use crate::voice::Voice;

/// Provider-side input cap.
pub const MAX_TEXT_CHARS: usize = 10_000;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Please enter some text.")]
    EmptyText,

    #[error("Text is too long ({chars} characters, the limit is {limit}).", limit = MAX_TEXT_CHARS)]
    TextTooLong { chars: usize },

    #[error("Speech is already being generated. Wait for it to finish.")]
    Busy,

    #[error("No history entry with id '{0}'.")]
    UnknownEntry(String),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("Failed to decode audio: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to play audio: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Failed to write WAV file: {0}")]
    Export(#[from] hound::Error),
}

impl StudioError {
    /// Stable machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyText => "empty_text",
            Self::TextTooLong { .. } => "text_too_long",
            Self::Busy => "busy",
            Self::UnknownEntry(_) => "unknown_entry",
            Self::Synthesis(e) => match e {
                SynthesisError::ContentBlocked { .. } => "content_blocked",
                SynthesisError::ServerBusy { .. } => "server_busy",
                SynthesisError::RateLimited { .. } => "rate_limited",
                SynthesisError::AuthFailed { .. } => "auth_failed",
                SynthesisError::Unknown { .. } => "unknown",
            },
            Self::Decode(_) => "decode",
            Self::Playback(_) => "playback",
            Self::Export(_) => "export",
        }
    }
}

/// Resets the generating flag however the generation ends.
struct GeneratingGuard<'a>(&'a AtomicBool);

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Studio {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    playback: Arc<PlaybackController>,
    history: Mutex<History>,
    generating: AtomicBool,
}

impl Studio {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, playback: PlaybackController) -> Self {
        Self {
            synthesizer,
            playback: Arc::new(playback),
            history: Mutex::new(History::new()),
            generating: AtomicBool::new(false),
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn active_playback(&self) -> Option<PlaybackId> {
        self.playback.active_id()
    }

    /// History entries, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock_history().entries()
    }

    /// Synthesize `text`, record it, and start playing it.
    ///
    /// The history entry is kept even if playback then fails.
    pub async fn generate(&self, text: &str, voice: Voice) -> Result<HistoryEntry, StudioError> {
        validate_text(text)?;
        // Opening the output device blocks
        let playback = Arc::clone(&self.playback);
        if let Err(e) = tokio::task::spawn_blocking(move || playback.resume_device()).await {
            warn!("Audio wake-up task failed: {e}");
        }

        let entry = self.synthesize(text, voice).await?;
        self.play_payload(&entry.audio_payload)?;
        Ok(entry)
    }

    /// Synthesize `text` and record it without playing.
    pub async fn synthesize(&self, text: &str, voice: Voice) -> Result<HistoryEntry, StudioError> {
        validate_text(text)?;

        if self.generating.swap(true, Ordering::SeqCst) {
            warn!("Rejected request: generation already in progress");
            return Err(StudioError::Busy);
        }
        let _guard = GeneratingGuard(&self.generating);

        info!("Generating speech: {} chars, voice {voice}", text.chars().count());
        let payload = self.synthesizer.generate_speech(text, voice).await?;

        let entry = self.lock_history().record(text, voice, payload);
        info!("Recorded history entry {}", entry.id);
        Ok(entry)
    }

    /// Decode a base64 PCM16 payload and play it.
    pub fn play_payload(&self, payload: &str) -> Result<PlaybackId, StudioError> {
        let audio = pcm::decode_payload(payload)?;
        Ok(self.playback.play(&audio)?)
    }

    /// Play a history entry again.
    pub fn replay(&self, id: &str) -> Result<PlaybackId, StudioError> {
        let payload = self.entry_payload(id)?;
        self.play_payload(&payload)
    }

    /// Save a history entry as a 16-bit WAV file.
    pub fn export_wav(&self, id: &str, path: &Path) -> Result<(), StudioError> {
        let payload = self.entry_payload(id)?;
        let audio = pcm::decode_payload(&payload)?;
        wav::write_wav(path, &audio)?;
        Ok(())
    }

    pub fn stop(&self) {
        self.playback.stop();
    }

    fn entry_payload(&self, id: &str) -> Result<String, StudioError> {
        self.lock_history()
            .get(id)
            .map(|e| e.audio_payload.clone())
            .ok_or_else(|| StudioError::UnknownEntry(id.to_string()))
    }

    fn lock_history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn validate_text(text: &str) -> Result<(), StudioError> {
    if text.trim().is_empty() {
        return Err(StudioError::EmptyText);
    }
    let chars = text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(StudioError::TextTooLong { chars });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::playback::testing::{Event, FakeOutput};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Two samples: -1.0 and just under +1.0
    const PAYLOAD: &str = "AID/fw==";

    #[derive(Default)]
    struct FakeSynth {
        calls: AtomicUsize,
        fail_with: Mutex<Option<SynthesisError>>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynth {
        async fn generate_speech(&self, _text: &str, _voice: Voice) -> Result<String, SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.fail_with.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(PAYLOAD.to_string()),
            }
        }
    }

    fn studio(synth: Arc<FakeSynth>) -> (Studio, FakeOutput) {
        let out = FakeOutput::default();
        (Studio::new(synth, out.controller()), out)
    }

    #[tokio::test]
    async fn test_generate_records_and_plays() {
        let synth = Arc::new(FakeSynth::default());
        let (studio, out) = studio(synth.clone());

        let entry = studio.generate("Hello world", Voice::Fenrir).await.unwrap();

        assert_eq!(entry.voice, Voice::Fenrir);
        assert_eq!(entry.audio_payload, PAYLOAD);
        assert_eq!(studio.history().len(), 1);
        assert!(studio.is_playing());
        assert!(!studio.is_generating());
        assert!(out.events().contains(&Event::Start { voice: 0, frames: 2 }));
    }

    #[tokio::test]
    async fn test_generate_wakes_device_off_the_runtime_thread() {
        let synth = Arc::new(FakeSynth::default());
        let (studio, out) = studio(synth);
        out.suspended.store(true, Ordering::SeqCst);

        studio.generate("Wake up", Voice::Kore).await.unwrap();

        let opened_on = out.opened_on.lock().unwrap().expect("device opened");
        assert_ne!(opened_on, std::thread::current().id());
        assert_eq!(
            out.events(),
            vec![Event::Open, Event::Resume, Event::Start { voice: 0, frames: 2 }]
        );
    }

    #[tokio::test]
    async fn test_empty_text_never_reaches_client() {
        let synth = Arc::new(FakeSynth::default());
        let (studio, out) = studio(synth.clone());

        for text in ["", "   ", "\n\t"] {
            let err = studio.generate(text, Voice::Kore).await.unwrap_err();
            assert!(matches!(err, StudioError::EmptyText));
        }
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
        assert!(out.events().is_empty());
    }

    #[tokio::test]
    async fn test_text_too_long() {
        let synth = Arc::new(FakeSynth::default());
        let (studio, _) = studio(synth.clone());

        let text = "a".repeat(MAX_TEXT_CHARS + 1);
        let err = studio.synthesize(&text, Voice::Kore).await.unwrap_err();
        assert!(matches!(err, StudioError::TextTooLong { chars } if chars == MAX_TEXT_CHARS + 1));
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_synthesis_error_resets_state() {
        let synth = Arc::new(FakeSynth::default());
        *synth.fail_with.lock().unwrap() = Some(SynthesisError::AuthFailed {
            detail: "API key not valid".into(),
        });
        let (studio, _) = studio(synth.clone());

        let err = studio.generate("hi", Voice::Kore).await.unwrap_err();
        assert_eq!(err.kind(), "auth_failed");
        assert!(matches!(&err, StudioError::Synthesis(e) if e.needs_reauth()));
        assert!(!studio.is_generating());
        assert!(!studio.is_playing());
        assert!(studio.history().is_empty());

        // Next attempt works
        assert!(studio.generate("hi", Voice::Kore).await.is_ok());
    }

    #[tokio::test]
    async fn test_overlapping_submission_is_rejected() {
        let gate = Arc::new(Notify::new());
        let synth = Arc::new(FakeSynth {
            gate: Some(gate.clone()),
            ..FakeSynth::default()
        });
        let (studio, _) = studio(synth.clone());
        let studio = Arc::new(studio);

        let first = tokio::spawn({
            let studio = studio.clone();
            async move { studio.synthesize("first", Voice::Puck).await }
        });
        while !studio.is_generating() {
            tokio::task::yield_now().await;
        }

        let err = studio.synthesize("second", Voice::Puck).await.unwrap_err();
        assert!(matches!(err, StudioError::Busy));

        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(!studio.is_generating());
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replay_and_unknown_entry() {
        let synth = Arc::new(FakeSynth::default());
        let (studio, out) = studio(synth);

        let entry = studio.synthesize("again", Voice::Charon).await.unwrap();
        assert!(!studio.is_playing());

        studio.replay(&entry.id).unwrap();
        assert!(studio.is_playing());
        studio.stop();
        assert!(!studio.is_playing());
        assert_eq!(out.events().last(), Some(&Event::Stop { voice: 0 }));

        assert!(matches!(studio.replay("missing"), Err(StudioError::UnknownEntry(_))));
    }

    #[tokio::test]
    async fn test_bad_payload_is_decode_error() {
        let synth = Arc::new(FakeSynth::default());
        let (studio, _) = studio(synth);

        let err = studio.play_payload("not base64!").unwrap_err();
        assert!(matches!(err, StudioError::Decode(_)));
        assert!(!studio.is_playing());
    }

    #[tokio::test]
    async fn test_export_survives_playback_failure() {
        let synth = Arc::new(FakeSynth::default());
        let (studio, out) = studio(synth);
        out.fail_start.store(true, Ordering::SeqCst);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        let entry = studio.synthesize("keep me", Voice::Puck).await.unwrap();
        studio.export_wav(&entry.id, &path).unwrap();
        assert!(matches!(studio.replay(&entry.id), Err(StudioError::Playback(_))));

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 2);
        assert!(matches!(
            studio.export_wav("missing", &path),
            Err(StudioError::UnknownEntry(_))
        ));
    }

    #[tokio::test]
    async fn test_playback_failure_keeps_history() {
        let synth = Arc::new(FakeSynth::default());
        let (studio, out) = studio(synth);
        out.fail_start.store(true, Ordering::SeqCst);

        let err = studio.generate("hello", Voice::Kore).await.unwrap_err();
        assert!(matches!(err, StudioError::Playback(_)));
        assert_eq!(studio.history().len(), 1);
        assert!(!studio.is_playing());
    }
}

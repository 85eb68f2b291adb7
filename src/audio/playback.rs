//! Playback controller: one voice at a time over a lazily opened device.
//!
//! Lifecycle:
//! 1. First `play` (or `resume_device`) opens the output device; it is then
//!    reused for the controller's lifetime.
//! 2. `play` stops any active voice, resumes a suspended device, starts the
//!    new voice and marks it active.
//! 3. A watcher thread polls the active voice and clears the playing flag on
//!    natural completion, but only if that voice is still the active one.
//! 4. `stop` halts the active voice. Idempotent.
//!
//! All of this runs under a single mutex so stop/play sequencing is atomic.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::pcm::DecodedAudio;

const WATCH_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to open audio output: {0}")]
    Device(String),
    #[error("invalid output buffer: {0}")]
    Buffer(String),
    #[error("failed to start playback: {0}")]
    Start(String),
    #[error("failed to stop playback: {0}")]
    Stop(String),
}

/// Identity of one playback. Monotonic per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackId(u64);

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interleaved f32 samples sized for the device.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    pub channels: u16,
    pub frame_count: usize,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl OutputBuffer {
    pub fn from_audio(audio: &DecodedAudio) -> Result<Self, PlaybackError> {
        if audio.channel_count() == 0 {
            return Err(PlaybackError::Buffer("no channels".into()));
        }
        if audio.sample_rate() == 0 {
            return Err(PlaybackError::Buffer("sample rate is zero".into()));
        }

        Ok(Self {
            channels: audio.channel_count(),
            frame_count: audio.frame_count(),
            sample_rate: audio.sample_rate(),
            samples: audio.interleaved(),
        })
    }
}

/// An output device that can play buffers.
pub trait AudioDevice: Send {
    /// Whether the device is in a power-saving state and needs `resume`.
    fn is_suspended(&self) -> bool {
        false
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn start(&mut self, buffer: OutputBuffer) -> Result<Box<dyn ActiveVoice>, PlaybackError>;
}

/// A buffer that has been handed to the device.
pub trait ActiveVoice: Send {
    fn stop(&mut self) -> Result<(), PlaybackError>;

    fn is_finished(&self) -> bool;
}

pub type DeviceOpener = Box<dyn Fn() -> Result<Box<dyn AudioDevice>, PlaybackError> + Send + Sync>;

// --- rodio device ---

/// Default system output through rodio.
pub struct RodioDevice {
    // In rodio 0.21, OutputStream is the handle; dropping it silences every sink
    stream: OutputStream,
}

impl RodioDevice {
    pub fn open_default() -> Result<Self, PlaybackError> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlaybackError::Device(e.to_string()))?;
        Ok(Self { stream })
    }
}

impl AudioDevice for RodioDevice {
    fn start(&mut self, buffer: OutputBuffer) -> Result<Box<dyn ActiveVoice>, PlaybackError> {
        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(SamplesBuffer::new(
            buffer.channels,
            buffer.sample_rate,
            buffer.samples,
        ));
        Ok(Box::new(RodioVoice { sink }))
    }
}

struct RodioVoice {
    sink: Sink,
}

impl ActiveVoice for RodioVoice {
    fn stop(&mut self) -> Result<(), PlaybackError> {
        self.sink.stop();
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}

// --- controller ---

struct ActivePlayback {
    id: PlaybackId,
    voice: Box<dyn ActiveVoice>,
}

#[derive(Default)]
struct State {
    device: Option<Box<dyn AudioDevice>>,
    active: Option<ActivePlayback>,
    last_id: u64,
}

struct Shared {
    state: Mutex<State>,
    playing: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stop and discard the active voice. Stop failures are swallowed: the
    /// voice may already have finished on its own.
    fn stop_active(&self, state: &mut State) -> Option<PlaybackId> {
        let mut active = state.active.take()?;
        if let Err(e) = active.voice.stop() {
            debug!("Ignoring stop error for playback {}: {e}", active.id);
        }
        self.playing.store(false, Ordering::Relaxed);
        Some(active.id)
    }

    /// Clear the active voice if it is `id`. Returns false once `id` is no
    /// longer the active playback.
    fn complete_if(&self, id: PlaybackId, finished: impl Fn(&dyn ActiveVoice) -> bool) -> bool {
        let mut state = self.lock();
        let Some(active) = state.active.as_ref().filter(|a| a.id == id) else {
            return false;
        };
        if !finished(active.voice.as_ref()) {
            return true;
        }
        state.active = None;
        self.playing.store(false, Ordering::Relaxed);
        debug!("Playback {id} finished");
        false
    }
}

pub struct PlaybackController {
    shared: Arc<Shared>,
    opener: DeviceOpener,
}

impl PlaybackController {
    /// Controller over the default rodio output. The device opens on first use.
    pub fn new() -> Self {
        Self::with_opener(Box::new(|| -> Result<Box<dyn AudioDevice>, PlaybackError> {
            Ok(Box::new(RodioDevice::open_default()?))
        }))
    }

    pub fn with_opener(opener: DeviceOpener) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                playing: AtomicBool::new(false),
            }),
            opener,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    pub fn active_id(&self) -> Option<PlaybackId> {
        self.shared.lock().active.as_ref().map(|a| a.id)
    }

    /// Play `audio`, superseding whatever is currently playing.
    pub fn play(&self, audio: &DecodedAudio) -> Result<PlaybackId, PlaybackError> {
        let mut state = self.shared.lock();

        if let Some(prev) = self.shared.stop_active(&mut state) {
            debug!("Playback {prev} superseded");
        }

        let buffer = OutputBuffer::from_audio(audio)?;
        let device = self.device(&mut state)?;
        resume_if_suspended(&mut **device);

        let voice = device.start(buffer)?;
        state.last_id += 1;
        let id = PlaybackId(state.last_id);
        state.active = Some(ActivePlayback { id, voice });
        self.shared.playing.store(true, Ordering::Relaxed);
        drop(state);

        info!(
            "Playback {id} started: {} frames, {:.1}s",
            audio.frame_count(),
            audio.duration().as_secs_f64()
        );
        self.watch(id);
        Ok(id)
    }

    /// Stop the active playback, if any.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        match self.shared.stop_active(&mut state) {
            Some(id) => info!("Playback {id} stopped"),
            None => self.shared.playing.store(false, Ordering::Relaxed),
        }
    }

    /// Mark `id` as naturally completed. No-op if a newer playback has
    /// replaced it.
    pub fn handle_completion(&self, id: PlaybackId) {
        self.shared.complete_if(id, |_| true);
    }

    /// Open the device if needed and wake it. Failures are logged only; the
    /// next `play` reports them.
    pub fn resume_device(&self) {
        let mut state = self.shared.lock();
        match self.device(&mut state) {
            Ok(device) => resume_if_suspended(&mut **device),
            Err(e) => warn!("Audio output unavailable: {e}"),
        }
    }

    fn device<'a>(&self, state: &'a mut State) -> Result<&'a mut Box<dyn AudioDevice>, PlaybackError> {
        let device = match state.device.take() {
            Some(d) => d,
            None => {
                let d = (self.opener)()?;
                info!("Audio output opened");
                d
            }
        };
        Ok(state.device.insert(device))
    }

    fn watch(&self, id: PlaybackId) {
        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("playback-watch".into())
            .spawn(move || loop {
                std::thread::sleep(WATCH_INTERVAL);
                if !shared.complete_if(id, |voice| voice.is_finished()) {
                    return;
                }
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn playback watcher for {id}: {e}");
        }
    }
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

fn resume_if_suspended(device: &mut dyn AudioDevice) {
    if device.is_suspended() {
        if let Err(e) = device.resume() {
            warn!("Failed to resume audio output: {e}");
        }
    }
}

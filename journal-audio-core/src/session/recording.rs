use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::timer::{EventPump, PeriodicTimer, TimerHandle};
use crate::crypto::engine::EncryptionEngine;
use crate::models::audio_models::AudioFormat;
use crate::models::config::RecordingConfiguration;
use crate::models::error::{ConfigError, RecordingError};
use crate::models::recording_result::RecordingResult;
use crate::models::state::RecordingState;
use crate::processing::wav_format;
use crate::storage::metadata;
use crate::storage::transient::{secure_delete, unique_path};
use crate::traits::capture_device::{CaptureDevice, CaptureEvent};
use crate::traits::recording_delegate::RecordingDelegate;

/// One capture, from start to its terminal transition.
struct RecordingSession {
    generation: u64,
    journal_id: String,
    format: AudioFormat,
    started_at: Instant,
    paused_total: Duration,
    paused_at: Option<Instant>,
    /// Paused by the platform rather than the caller.
    interrupted: bool,
    raw_path: PathBuf,
    sealed_path: PathBuf,
    current_amplitude: f32,
    timer: Option<TimerHandle>,
}

impl RecordingSession {
    /// Wall-clock time since start minus time spent paused.
    fn elapsed(&self) -> Duration {
        let paused_now = self.paused_at.map(|at| at.elapsed()).unwrap_or_default();
        self.started_at
            .elapsed()
            .saturating_sub(self.paused_total + paused_now)
    }

    fn pause_clock(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    fn resume_clock(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total += at.elapsed();
        }
        self.interrupted = false;
    }

    /// Remove everything this session wrote. Raw audio is wiped first.
    fn discard(&self) {
        if let Some(timer) = &self.timer {
            timer.cancel();
        }
        let sidecar = metadata::metadata_path(&self.sealed_path);
        for path in [&self.raw_path, &self.sealed_path, &sidecar] {
            if let Err(e) = secure_delete(path) {
                log::warn!("failed to delete {}: {}", path.display(), e);
            }
        }
    }
}

struct SessionState {
    state: RecordingState,
    session: Option<RecordingSession>,
    generation: u64,
}

impl SessionState {
    fn current(&mut self, generation: u64) -> Option<&mut RecordingSession> {
        self.session.as_mut().filter(|s| s.generation == generation)
    }

    fn take_current(&mut self, generation: u64) -> Option<RecordingSession> {
        if self.session.as_ref().map(|s| s.generation) == Some(generation) {
            self.session.take()
        } else {
            None
        }
    }
}

/// State shared with the event pump and the amplitude timer.
///
/// Lock order: `device` before `session_state`. Delegates are always
/// called with no lock held.
struct Shared<D> {
    device: Mutex<D>,
    session_state: Mutex<SessionState>,
    delegate: Mutex<Option<Arc<dyn RecordingDelegate>>>,
}

impl<D: CaptureDevice> Shared<D> {
    fn delegate(&self) -> Option<Arc<dyn RecordingDelegate>> {
        self.delegate.lock().clone()
    }

    fn publish_state(&self, state: RecordingState) {
        log::debug!("recording state -> {:?}", state);
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }

    fn publish_error(&self, error: &RecordingError) {
        log::error!("recording failed: {}", error);
        if let Some(delegate) = self.delegate() {
            delegate.on_error(error);
        }
    }

    /// End session `generation` as failed: stop the hardware, delete its
    /// files, then publish. No-op if that session is already gone.
    fn fail_session(&self, generation: u64, error: RecordingError) {
        {
            let mut device = self.device.lock();
            let mut s = self.session_state.lock();
            let Some(session) = s.take_current(generation) else {
                return;
            };
            if let Err(e) = device.stop() {
                log::warn!("capture device did not stop cleanly: {}", e);
            }
            session.discard();
            s.state = RecordingState::Failed;
        }
        self.publish_error(&error);
        self.publish_state(RecordingState::Failed);
    }

    /// Returns `false` once the pump should exit.
    fn handle_event(&self, generation: u64, event: CaptureEvent) -> bool {
        match event {
            CaptureEvent::Amplitude(level) => {
                if let Some(session) = self.session_state.lock().current(generation) {
                    session.current_amplitude = level.clamp(0.0, 1.0);
                }
                true
            }
            CaptureEvent::InterruptionBegan => {
                let outcome = {
                    let mut device = self.device.lock();
                    let mut s = self.session_state.lock();
                    if s.state != RecordingState::Recording || s.current(generation).is_none() {
                        return true;
                    }
                    match device.pause() {
                        Ok(()) => {
                            if let Some(session) = s.current(generation) {
                                session.pause_clock();
                                session.interrupted = true;
                            }
                            s.state = RecordingState::Paused;
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                };
                match outcome {
                    Ok(()) => {
                        log::info!("recording interrupted");
                        self.publish_state(RecordingState::Paused);
                        true
                    }
                    Err(e) => {
                        self.fail_session(generation, RecordingError::CaptureFailed(e));
                        false
                    }
                }
            }
            CaptureEvent::InterruptionEnded { should_resume } => {
                let outcome = {
                    let mut device = self.device.lock();
                    let mut s = self.session_state.lock();
                    let interrupted = s.current(generation).map(|x| x.interrupted).unwrap_or(false);
                    if s.state != RecordingState::Paused || !interrupted {
                        return true;
                    }
                    if !should_resume {
                        // Stays paused; the caller decides what happens next.
                        if let Some(session) = s.current(generation) {
                            session.interrupted = false;
                        }
                        return true;
                    }
                    match device.resume() {
                        Ok(()) => {
                            if let Some(session) = s.current(generation) {
                                session.resume_clock();
                            }
                            s.state = RecordingState::Recording;
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                };
                match outcome {
                    Ok(()) => {
                        log::info!("recording resumed after interruption");
                        self.publish_state(RecordingState::Recording);
                        true
                    }
                    Err(e) => {
                        self.fail_session(generation, RecordingError::CaptureFailed(e));
                        false
                    }
                }
            }
            CaptureEvent::Fault(message) => {
                self.fail_session(generation, RecordingError::CaptureFailed(message));
                false
            }
        }
    }
}

/// Drives one capture device through the recording state machine and seals
/// each finished capture.
///
/// ```text
/// [CaptureDevice] → raw WAV → stop → EncryptionEngine::encrypt_journal_file
///                                    → sealed file + AudioMetadata (+ sidecar)
/// ```
///
/// At most one session is active at a time; the raw capture never outlives
/// its session, whichever terminal state it reaches.
pub struct RecordingController<D: CaptureDevice + 'static> {
    engine: Arc<EncryptionEngine>,
    config: RecordingConfiguration,
    shared: Arc<Shared<D>>,
    timer: Option<PeriodicTimer>,
    pump: Option<EventPump>,
}

impl<D: CaptureDevice + 'static> RecordingController<D> {
    pub fn new(device: D, engine: Arc<EncryptionEngine>, config: RecordingConfiguration) -> Result<Self, ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(Self {
            engine,
            config,
            shared: Arc::new(Shared {
                device: Mutex::new(device),
                session_state: Mutex::new(SessionState {
                    state: RecordingState::Idle,
                    session: None,
                    generation: 0,
                }),
                delegate: Mutex::new(None),
            }),
            timer: None,
            pump: None,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn RecordingDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn state(&self) -> RecordingState {
        self.shared.session_state.lock().state
    }

    /// Latest input level while a session is active, otherwise 0.
    pub fn current_amplitude(&self) -> f32 {
        let s = self.shared.session_state.lock();
        s.session.as_ref().map(|x| x.current_amplitude).unwrap_or(0.0)
    }

    /// Recorded time of the active session, excluding pauses.
    pub fn current_duration(&self) -> Duration {
        let s = self.shared.session_state.lock();
        s.session.as_ref().map(|x| x.elapsed()).unwrap_or_default()
    }

    /// Path of the raw capture while a session is active.
    pub fn output_path(&self) -> Option<PathBuf> {
        let s = self.shared.session_state.lock();
        s.session.as_ref().map(|x| x.raw_path.clone())
    }

    /// Start a new session for `journal_id`. Transitions: idle → preparing → recording.
    ///
    /// Allowed from idle and from any terminal state. Starting while a session
    /// is active is an error; the hardware is exclusive.
    pub fn start_recording(&mut self, journal_id: &str) -> Result<(), RecordingError> {
        let generation = {
            let mut s = self.shared.session_state.lock();
            if s.state.is_active() {
                return Err(invalid("start", s.state));
            }
            s.state = RecordingState::Preparing;
            s.generation += 1;
            s.generation
        };
        // A session that failed asynchronously may have left its workers behind.
        self.stop_workers();
        self.shared.publish_state(RecordingState::Preparing);

        match self.begin_session(journal_id, generation) {
            Ok(()) => {
                log::info!("recording started for journal {}", journal_id);
                self.shared.publish_state(RecordingState::Recording);
                Ok(())
            }
            Err(error) => {
                self.stop_workers();
                {
                    let mut device = self.shared.device.lock();
                    let mut s = self.shared.session_state.lock();
                    if let Some(session) = s.session.take() {
                        if let Err(e) = device.stop() {
                            log::warn!("capture device did not stop cleanly: {}", e);
                        }
                        session.discard();
                    }
                    s.state = RecordingState::Failed;
                }
                self.shared.publish_error(&error);
                self.shared.publish_state(RecordingState::Failed);
                Err(error)
            }
        }
    }

    fn begin_session(&mut self, journal_id: &str, generation: u64) -> Result<(), RecordingError> {
        if journal_id.trim().is_empty() {
            return Err(RecordingError::CaptureFailed("journal id must not be empty".into()));
        }
        let dir = &self.config.output_directory;
        fs::create_dir_all(dir)
            .map_err(|e| RecordingError::FileOperationFailed(format!("failed to create {}: {}", dir.display(), e)))?;

        let raw_path = unique_path(dir, "capture", "wav");
        let sealed_path = dir.join(format!("{}-{}.jaef", file_stem(journal_id), uuid::Uuid::new_v4().simple()));
        let format = self.config.audio_format();
        let (events, receiver) = mpsc::channel();

        {
            let mut device = self.shared.device.lock();
            if !device.is_available() {
                return Err(RecordingError::CaptureFailed("capture device unavailable".into()));
            }
            if let Err(e) = device.start(&raw_path, &format, events) {
                let _ = secure_delete(&raw_path);
                return Err(RecordingError::CaptureFailed(e));
            }
            let mut s = self.shared.session_state.lock();
            s.session = Some(RecordingSession {
                generation,
                journal_id: journal_id.to_string(),
                format,
                started_at: Instant::now(),
                paused_total: Duration::ZERO,
                paused_at: None,
                interrupted: false,
                raw_path,
                sealed_path,
                current_amplitude: 0.0,
                timer: None,
            });
            s.state = RecordingState::Recording;
        }

        let shared = Arc::clone(&self.shared);
        self.pump = Some(
            EventPump::spawn("recording-events", receiver, move |event| shared.handle_event(generation, event))
                .map_err(|e| RecordingError::CaptureFailed(format!("failed to spawn event pump: {e}")))?,
        );

        let shared = Arc::clone(&self.shared);
        let timer = PeriodicTimer::start("recording-amplitude", self.config.amplitude_interval(), move || {
            let sample = {
                let mut s = shared.session_state.lock();
                if s.state != RecordingState::Recording {
                    None
                } else {
                    s.current(generation).map(|x| (x.current_amplitude, x.elapsed()))
                }
            };
            if let (Some((level, duration)), Some(delegate)) = (sample, shared.delegate()) {
                delegate.on_amplitude(level, duration);
            }
        })
        .map_err(|e| RecordingError::CaptureFailed(format!("failed to spawn amplitude timer: {e}")))?;

        if let Some(session) = self.shared.session_state.lock().current(generation) {
            session.timer = Some(timer.handle());
        }
        self.timer = Some(timer);
        Ok(())
    }

    /// Transitions: recording → paused.
    pub fn pause_recording(&mut self) -> Result<(), RecordingError> {
        let failure = {
            let mut device = self.shared.device.lock();
            let mut s = self.shared.session_state.lock();
            if s.state != RecordingState::Recording {
                return Err(invalid("pause", s.state));
            }
            let generation = s.generation;
            match device.pause() {
                Ok(()) => {
                    if let Some(session) = s.current(generation) {
                        session.pause_clock();
                        session.interrupted = false;
                    }
                    s.state = RecordingState::Paused;
                    None
                }
                Err(e) => Some((generation, e)),
            }
        };
        if let Some((generation, e)) = failure {
            return self.fail(generation, RecordingError::CaptureFailed(e));
        }
        self.shared.publish_state(RecordingState::Paused);
        Ok(())
    }

    /// Transitions: paused → recording.
    pub fn resume_recording(&mut self) -> Result<(), RecordingError> {
        let failure = {
            let mut device = self.shared.device.lock();
            let mut s = self.shared.session_state.lock();
            if s.state != RecordingState::Paused {
                return Err(invalid("resume", s.state));
            }
            let generation = s.generation;
            match device.resume() {
                Ok(()) => {
                    if let Some(session) = s.current(generation) {
                        session.resume_clock();
                    }
                    s.state = RecordingState::Recording;
                    None
                }
                Err(e) => Some((generation, e)),
            }
        };
        if let Some((generation, e)) = failure {
            return self.fail(generation, RecordingError::CaptureFailed(e));
        }
        self.shared.publish_state(RecordingState::Recording);
        Ok(())
    }

    /// Stop capture and seal the recording.
    /// Transitions: recording/paused → completed, or failed if sealing fails.
    ///
    /// The raw capture is wiped on every outcome.
    pub fn stop_recording(&mut self) -> Result<RecordingResult, RecordingError> {
        {
            let s = self.shared.session_state.lock();
            if !matches!(s.state, RecordingState::Recording | RecordingState::Paused) {
                return Err(invalid("stop", s.state));
            }
        }

        // No device event may act on the session once stopping begins.
        self.stop_workers();
        let session = {
            let mut s = self.shared.session_state.lock();
            match s.session.take() {
                Some(session) => session,
                // A fault ended the session before the stop request.
                None => return Err(invalid("stop", s.state)),
            }
        };
        let duration = session.elapsed();
        let stopped = self.shared.device.lock().stop();

        let sealed = stopped
            .map_err(RecordingError::CaptureFailed)
            .and_then(|()| self.seal(&session, duration));
        match sealed {
            Ok(result) => {
                self.shared.session_state.lock().state = RecordingState::Completed;
                log::info!(
                    "recording for journal {} sealed at {} ({} ms)",
                    session.journal_id,
                    result.sealed_path.display(),
                    result.metadata.duration_ms
                );
                self.shared.publish_state(RecordingState::Completed);
                if let Some(delegate) = self.shared.delegate() {
                    delegate.on_recording_finished(&result);
                }
                Ok(result)
            }
            Err(error) => {
                session.discard();
                self.shared.session_state.lock().state = RecordingState::Failed;
                self.shared.publish_error(&error);
                self.shared.publish_state(RecordingState::Failed);
                Err(error)
            }
        }
    }

    fn seal(&self, session: &RecordingSession, duration: Duration) -> Result<RecordingResult, RecordingError> {
        let wav = wav_format::read_wav_info(&session.raw_path).map_err(RecordingError::FileOperationFailed)?;
        if wav.format != session.format {
            log::warn!("capture delivered {:?}, requested {:?}", wav.format, session.format);
        }

        let sealed = self
            .engine
            .encrypt_journal_file(&session.raw_path, &session.sealed_path, &session.journal_id)?;
        let metadata = metadata::create_audio_metadata(&session.journal_id, &wav.format, wav.data_len, &sealed);
        if self.config.write_metadata_sidecar {
            metadata::write_metadata(&metadata, &sealed.path)?;
        }

        secure_delete(&session.raw_path)
            .map_err(|e| RecordingError::FileOperationFailed(format!("failed to wipe raw capture: {e}")))?;

        Ok(RecordingResult {
            sealed_path: sealed.path,
            duration,
            metadata,
        })
    }

    /// Abandon the session and delete everything it wrote.
    /// Transitions: recording/paused → cancelled.
    pub fn cancel_recording(&mut self) -> Result<(), RecordingError> {
        {
            let s = self.shared.session_state.lock();
            if !matches!(s.state, RecordingState::Recording | RecordingState::Paused) {
                return Err(invalid("cancel", s.state));
            }
        }

        self.stop_workers();
        {
            let mut device = self.shared.device.lock();
            let mut s = self.shared.session_state.lock();
            let Some(session) = s.session.take() else {
                return Err(invalid("cancel", s.state));
            };
            if let Err(e) = device.stop() {
                log::warn!("capture device did not stop cleanly: {}", e);
            }
            session.discard();
            s.state = RecordingState::Cancelled;
        }
        log::info!("recording cancelled");
        self.shared.publish_state(RecordingState::Cancelled);
        Ok(())
    }

    fn fail<T>(&mut self, generation: u64, error: RecordingError) -> Result<T, RecordingError> {
        self.stop_workers();
        self.shared.fail_session(generation, error.clone());
        Err(error)
    }

    fn stop_workers(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
        if let Some(mut pump) = self.pump.take() {
            pump.stop();
        }
    }
}

impl<D: CaptureDevice + 'static> Drop for RecordingController<D> {
    fn drop(&mut self) {
        if self.state().is_active() {
            if let Err(e) = self.cancel_recording() {
                log::warn!("failed to cancel recording on drop: {}", e);
            }
        }
        self.stop_workers();
    }
}

fn invalid(operation: &'static str, state: RecordingState) -> RecordingError {
    RecordingError::InvalidRecordingState { operation, state }
}

/// Journal ids are caller-supplied; keep file names to a safe alphabet.
fn file_stem(journal_id: &str) -> String {
    journal_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

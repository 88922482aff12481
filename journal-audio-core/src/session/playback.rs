use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::timer::{EventPump, PeriodicTimer, TimerHandle};
use crate::crypto::engine::EncryptionEngine;
use crate::models::artifact::SealedAudioRef;
use crate::models::config::PlaybackConfiguration;
use crate::models::error::{ConfigError, PlaybackError};
use crate::models::state::PlaybackState;
use crate::storage::transient::{unique_path, TransientFile};
use crate::traits::playback_delegate::PlaybackDelegate;
use crate::traits::playback_device::{OutputEvent, PlaybackDevice};

struct PlaybackSession {
    generation: u64,
    source: PathBuf,
    transient: Option<TransientFile>,
    duration: Duration,
    interrupted: bool,
    timer: Option<TimerHandle>,
}

impl PlaybackSession {
    /// Stop the device, let go of the plaintext and wipe it.
    fn end<D: PlaybackDevice>(mut self, device: &mut D) {
        if let Some(timer) = &self.timer {
            timer.cancel();
        }
        device.stop();
        device.unload();
        if let Some(file) = self.transient.take() {
            let path = file.path().to_path_buf();
            if let Err(e) = file.delete() {
                log::warn!("failed to delete transient plaintext {}: {}", path.display(), e);
            }
        }
        log::debug!("playback session for {} released", self.source.display());
    }
}

struct SessionState {
    state: PlaybackState,
    session: Option<PlaybackSession>,
    generation: u64,
}

impl SessionState {
    fn current(&mut self, generation: u64) -> Option<&mut PlaybackSession> {
        self.session.as_mut().filter(|s| s.generation == generation)
    }

    fn take_current(&mut self, generation: u64) -> Option<PlaybackSession> {
        if self.session.as_ref().map(|s| s.generation) == Some(generation) {
            self.session.take()
        } else {
            None
        }
    }
}

/// Lock order: `device` before `session_state`.
struct Shared<D> {
    device: Mutex<D>,
    session_state: Mutex<SessionState>,
    delegate: Mutex<Option<Arc<dyn PlaybackDelegate>>>,
}

impl<D: PlaybackDevice> Shared<D> {
    fn delegate(&self) -> Option<Arc<dyn PlaybackDelegate>> {
        self.delegate.lock().clone()
    }

    fn publish_state(&self, state: PlaybackState) {
        log::debug!("playback state -> {:?}", state);
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }

    fn publish_error(&self, error: &PlaybackError) {
        log::error!("playback failed: {}", error);
        if let Some(delegate) = self.delegate() {
            delegate.on_error(error);
        }
    }

    /// End of media for session `generation`. Safe to call from both the
    /// timer and the event pump; only the first call wins.
    fn complete(&self, generation: u64) {
        let duration = {
            let mut device = self.device.lock();
            let mut s = self.session_state.lock();
            if s.state != PlaybackState::Playing {
                return;
            }
            let Some(session) = s.take_current(generation) else {
                return;
            };
            let duration = session.duration;
            session.end(&mut *device);
            s.state = PlaybackState::Completed;
            duration
        };
        log::info!("playback completed");
        if let Some(delegate) = self.delegate() {
            delegate.on_progress(duration, duration);
        }
        self.publish_state(PlaybackState::Completed);
    }

    fn fail_session(&self, generation: u64, error: PlaybackError) {
        {
            let mut device = self.device.lock();
            let mut s = self.session_state.lock();
            let Some(session) = s.take_current(generation) else {
                return;
            };
            session.end(&mut *device);
            s.state = PlaybackState::Failed;
        }
        self.publish_error(&error);
        self.publish_state(PlaybackState::Failed);
    }

    fn tick(&self, generation: u64) {
        let progress = {
            let device = self.device.lock();
            let mut s = self.session_state.lock();
            if s.state != PlaybackState::Playing || s.current(generation).is_none() {
                return;
            }
            (device.current_time(), device.duration())
        };
        let (position, duration) = progress;
        if position >= duration {
            self.complete(generation);
        } else if let Some(delegate) = self.delegate() {
            delegate.on_progress(position, duration);
        }
    }

    /// Returns `false` once the pump should exit.
    fn handle_event(&self, generation: u64, event: OutputEvent) -> bool {
        match event {
            OutputEvent::Finished => {
                self.complete(generation);
                false
            }
            OutputEvent::InterruptionBegan => {
                let outcome = {
                    let mut device = self.device.lock();
                    let mut s = self.session_state.lock();
                    if s.state != PlaybackState::Playing || s.current(generation).is_none() {
                        return true;
                    }
                    device.pause().map(|()| {
                        if let Some(session) = s.current(generation) {
                            session.interrupted = true;
                        }
                        s.state = PlaybackState::Paused;
                    })
                };
                match outcome {
                    Ok(()) => {
                        log::info!("playback interrupted");
                        self.publish_state(PlaybackState::Paused);
                        true
                    }
                    Err(e) => {
                        self.fail_session(generation, PlaybackError::PlaybackFailed(e));
                        false
                    }
                }
            }
            OutputEvent::InterruptionEnded { should_resume } => {
                let outcome = {
                    let mut device = self.device.lock();
                    let mut s = self.session_state.lock();
                    let Some(session) = s.current(generation) else {
                        return true;
                    };
                    let interrupted = std::mem::take(&mut session.interrupted);
                    if s.state != PlaybackState::Paused || !interrupted || !should_resume {
                        return true;
                    }
                    device.play().map(|()| s.state = PlaybackState::Playing)
                };
                match outcome {
                    Ok(()) => {
                        log::info!("playback resumed after interruption");
                        self.publish_state(PlaybackState::Playing);
                        true
                    }
                    Err(e) => {
                        self.fail_session(generation, PlaybackError::PlaybackFailed(e));
                        false
                    }
                }
            }
            OutputEvent::Fault(message) => {
                self.fail_session(generation, PlaybackError::PlaybackFailed(message));
                false
            }
        }
    }
}

/// Plays sealed journal audio through a [`PlaybackDevice`].
///
/// Preparing opens the sealed file into a transient plaintext WAV under the
/// configured transient directory. That file exists only while the session
/// does: stop, completion, failure, [`cleanup`](Self::cleanup) and drop all
/// wipe it.
pub struct PlaybackController<D: PlaybackDevice + 'static> {
    engine: Arc<EncryptionEngine>,
    config: PlaybackConfiguration,
    shared: Arc<Shared<D>>,
    timer: Option<PeriodicTimer>,
    pump: Option<EventPump>,
}

impl<D: PlaybackDevice + 'static> PlaybackController<D> {
    pub fn new(device: D, engine: Arc<EncryptionEngine>, config: PlaybackConfiguration) -> Result<Self, ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(Self {
            engine,
            config,
            shared: Arc::new(Shared {
                device: Mutex::new(device),
                session_state: Mutex::new(SessionState {
                    state: PlaybackState::Idle,
                    session: None,
                    generation: 0,
                }),
                delegate: Mutex::new(None),
            }),
            timer: None,
            pump: None,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn PlaybackDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.session_state.lock().state
    }

    pub fn current_time(&self) -> Duration {
        self.shared.device.lock().current_time()
    }

    /// Duration of the prepared audio, zero without a session.
    pub fn duration(&self) -> Duration {
        let s = self.shared.session_state.lock();
        s.session.as_ref().map(|x| x.duration).unwrap_or_default()
    }

    /// Location of the transient plaintext while a session holds one.
    pub fn transient_path(&self) -> Option<PathBuf> {
        let s = self.shared.session_state.lock();
        s.session
            .as_ref()
            .and_then(|x| x.transient.as_ref())
            .map(|file| file.path().to_path_buf())
    }

    /// Open `audio` for playback and return its duration.
    /// Transitions: idle/stopped → preparing → stopped (ready), or failed.
    ///
    /// A session prepared earlier is released first.
    pub fn prepare_for_playback(&mut self, audio: &SealedAudioRef) -> Result<Duration, PlaybackError> {
        let generation = {
            let mut device = self.shared.device.lock();
            let mut s = self.shared.session_state.lock();
            if !s.state.can_prepare() {
                return Err(invalid("prepare", s.state));
            }
            if let Some(previous) = s.session.take() {
                previous.end(&mut *device);
            }
            s.state = PlaybackState::Preparing;
            s.generation += 1;
            s.generation
        };
        self.stop_workers();
        self.shared.publish_state(PlaybackState::Preparing);

        match self.open_session(audio, generation) {
            Ok(duration) => {
                log::info!("prepared {} for playback ({} ms)", audio.path.display(), duration.as_millis());
                self.shared.publish_state(PlaybackState::Stopped);
                Ok(duration)
            }
            Err(error) => {
                self.stop_workers();
                {
                    let mut device = self.shared.device.lock();
                    let mut s = self.shared.session_state.lock();
                    if let Some(session) = s.session.take() {
                        session.end(&mut *device);
                    }
                    s.state = PlaybackState::Failed;
                }
                self.shared.publish_error(&error);
                self.shared.publish_state(PlaybackState::Failed);
                Err(error)
            }
        }
    }

    fn open_session(&mut self, audio: &SealedAudioRef, generation: u64) -> Result<Duration, PlaybackError> {
        if !audio.path.is_file() {
            return Err(PlaybackError::FileNotFound(audio.path.display().to_string()));
        }
        let header = self.engine.read_file_header(&audio.path)?;
        if audio.iv.is_some_and(|iv| iv != header.iv) {
            log::warn!("IV of {} does not match its metadata", audio.path.display());
            return Err(PlaybackError::DecryptionFailed);
        }

        let dir = &self.config.transient_directory;
        fs::create_dir_all(dir)
            .map_err(|e| PlaybackError::FileOperationFailed(format!("failed to create {}: {}", dir.display(), e)))?;
        let transient = TransientFile::new(unique_path(dir, "playback", "wav"));
        let opened = self
            .engine
            .decrypt_journal_file(&audio.path, transient.path(), &audio.journal_id)?;
        if audio.checksum.as_ref().is_some_and(|expected| *expected != opened.checksum) {
            log::warn!("checksum of {} does not match its metadata", audio.path.display());
            return Err(PlaybackError::DecryptionFailed);
        }

        let (events, receiver) = mpsc::channel();
        let duration = {
            let mut device = self.shared.device.lock();
            let duration = device
                .load(transient.path(), events)
                .map_err(PlaybackError::PlaybackFailed)?;
            let mut s = self.shared.session_state.lock();
            s.session = Some(PlaybackSession {
                generation,
                source: audio.path.clone(),
                transient: Some(transient),
                duration,
                interrupted: false,
                timer: None,
            });
            duration
        };

        let shared = Arc::clone(&self.shared);
        self.pump = Some(
            EventPump::spawn("playback-events", receiver, move |event| shared.handle_event(generation, event))
                .map_err(|e| PlaybackError::PlaybackFailed(format!("failed to spawn event pump: {e}")))?,
        );
        let shared = Arc::clone(&self.shared);
        let timer = PeriodicTimer::start("playback-progress", self.config.progress_interval(), move || {
            shared.tick(generation)
        })
        .map_err(|e| PlaybackError::PlaybackFailed(format!("failed to spawn progress timer: {e}")))?;

        let mut s = self.shared.session_state.lock();
        if let Some(session) = s.current(generation) {
            session.timer = Some(timer.handle());
        }
        s.state = PlaybackState::Stopped;
        drop(s);
        self.timer = Some(timer);
        Ok(duration)
    }

    /// Transitions: stopped (ready) → playing.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        self.transition("start", &[PlaybackState::Stopped], PlaybackState::Playing, |device| device.play())
    }

    /// Transitions: playing → paused.
    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        self.transition("pause", &[PlaybackState::Playing], PlaybackState::Paused, |device| device.pause())
    }

    /// Transitions: paused → playing.
    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        self.transition("resume", &[PlaybackState::Paused], PlaybackState::Playing, |device| device.play())
    }

    fn transition(
        &mut self,
        operation: &'static str,
        from: &[PlaybackState],
        to: PlaybackState,
        drive: impl FnOnce(&mut D) -> Result<(), String>,
    ) -> Result<(), PlaybackError> {
        let failure = {
            let mut device = self.shared.device.lock();
            let mut s = self.shared.session_state.lock();
            if !from.contains(&s.state) || s.session.is_none() {
                return Err(invalid(operation, s.state));
            }
            let generation = s.generation;
            match drive(&mut *device) {
                Ok(()) => {
                    if let Some(session) = s.current(generation) {
                        session.interrupted = false;
                    }
                    s.state = to;
                    None
                }
                Err(e) => Some((generation, e)),
            }
        };
        if let Some((generation, e)) = failure {
            self.stop_workers();
            let error = PlaybackError::PlaybackFailed(e);
            self.shared.fail_session(generation, error.clone());
            return Err(error);
        }
        self.shared.publish_state(to);
        Ok(())
    }

    /// End the session and wipe its plaintext.
    /// Transitions: playing/paused → stopped. A new prepare is needed to play again.
    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        {
            let s = self.shared.session_state.lock();
            if !matches!(s.state, PlaybackState::Playing | PlaybackState::Paused) {
                return Err(invalid("stop", s.state));
            }
        }
        self.stop_workers();
        {
            let mut device = self.shared.device.lock();
            let mut s = self.shared.session_state.lock();
            // Playback may have reached the end while the workers wound down.
            if !matches!(s.state, PlaybackState::Playing | PlaybackState::Paused) {
                return Err(invalid("stop", s.state));
            }
            if let Some(session) = s.session.take() {
                session.end(&mut *device);
            }
            s.state = PlaybackState::Stopped;
        }
        self.shared.publish_state(PlaybackState::Stopped);
        Ok(())
    }

    /// Move the play head, clamped to the audio duration.
    ///
    /// Valid while playing, paused or prepared.
    pub fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        let failure = {
            let mut device = self.shared.device.lock();
            let mut s = self.shared.session_state.lock();
            let state = s.state;
            let seekable = matches!(
                state,
                PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Stopped
            );
            let generation = s.generation;
            let duration = match s.current(generation) {
                Some(session) if seekable => session.duration,
                _ => return Err(invalid("seek", state)),
            };
            device.seek(position.min(duration)).err().map(|e| (generation, e))
        };
        if let Some((generation, e)) = failure {
            self.stop_workers();
            let error = PlaybackError::PlaybackFailed(e);
            self.shared.fail_session(generation, error.clone());
            return Err(error);
        }
        Ok(())
    }

    /// Release everything and return to idle. Callable from any state.
    ///
    /// This is the path that always removes the transient plaintext, even
    /// after a failure or an unfinished prepare.
    pub fn cleanup(&mut self) {
        self.stop_workers();
        let previous = {
            let mut device = self.shared.device.lock();
            let mut s = self.shared.session_state.lock();
            match s.session.take() {
                Some(session) => session.end(&mut *device),
                None => {
                    device.stop();
                    device.unload();
                }
            }
            std::mem::replace(&mut s.state, PlaybackState::Idle)
        };
        if previous != PlaybackState::Idle {
            self.shared.publish_state(PlaybackState::Idle);
        }
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

impl<D: PlaybackDevice + 'static> Drop for PlaybackController<D> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn invalid(operation: &'static str, state: PlaybackState) -> PlaybackError {
    PlaybackError::InvalidPlaybackState { operation, state }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::AudioFormat;
    use crate::models::config::EncryptionConfiguration;
    use crate::platform::memory::MemoryKeyStore;
    use crate::platform::simulated::ClockPlayback;
    use crate::processing::wav_format::generate_wav_header;
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::thread;

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<PlaybackState>>,
        progress: Mutex<Vec<(Duration, Duration)>>,
        errors: Mutex<Vec<PlaybackError>>,
    }

    impl PlaybackDelegate for Recorder {
        fn on_state_changed(&self, state: PlaybackState) {
            self.states.lock().push(state);
        }

        fn on_progress(&self, position: Duration, duration: Duration) {
            self.progress.lock().push((position, duration));
        }

        fn on_error(&self, error: &PlaybackError) {
            self.errors.lock().push(error.clone());
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        engine: Arc<EncryptionEngine>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                engine: Arc::new(EncryptionEngine::new(
                    Arc::new(MemoryKeyStore::new()),
                    EncryptionConfiguration::default(),
                )
                .unwrap()),
            }
        }

        fn transient_dir(&self) -> PathBuf {
            self.dir.path().join("transient")
        }

        fn controller(&self) -> (PlaybackController<ClockPlayback>, Arc<Recorder>) {
            let config = PlaybackConfiguration {
                transient_directory: self.transient_dir(),
                progress_interval_ms: 20,
            };
            let mut controller = PlaybackController::new(ClockPlayback::new(), Arc::clone(&self.engine), config).unwrap();
            let recorder = Arc::new(Recorder::default());
            controller.set_delegate(recorder.clone());
            (controller, recorder)
        }

        /// Seal `millis` of silence for `journal_id`.
        fn sealed(&self, journal_id: &str, millis: u32) -> SealedAudioRef {
            let format = AudioFormat::default();
            let data = vec![0u8; (format.byte_rate() / 1000 * millis) as usize];
            let raw = self.dir.path().join(format!("{journal_id}.wav"));
            let mut file = fs::File::create(&raw).unwrap();
            file.write_all(&generate_wav_header(&format, data.len() as u32)).unwrap();
            file.write_all(&data).unwrap();
            drop(file);

            let sealed_path = self.dir.path().join(format!("{journal_id}.jaef"));
            let sealed = self.engine.encrypt_journal_file(&raw, &sealed_path, journal_id).unwrap();
            fs::remove_file(&raw).unwrap();
            SealedAudioRef {
                path: sealed_path,
                journal_id: journal_id.into(),
                iv: Some(sealed.iv),
                checksum: Some(sealed.checksum),
            }
        }

        fn transient_files(&self) -> usize {
            fs::read_dir(self.transient_dir()).map(|d| d.count()).unwrap_or(0)
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..300 {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn prepare_leaves_controller_ready() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 500);
        let (mut controller, recorder) = fixture.controller();

        let duration = controller.prepare_for_playback(&audio).unwrap();
        assert_eq!(duration, Duration::from_millis(500));
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(controller.transient_path().unwrap().exists());
        assert_eq!(*recorder.states.lock(), vec![PlaybackState::Preparing, PlaybackState::Stopped]);
    }

    #[test]
    fn cleanup_deletes_transient_file_from_every_state() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 2_000);

        type Drive = fn(&mut PlaybackController<ClockPlayback>);
        let drives: [Drive; 4] = [
            |_| {},
            |c| c.start().unwrap(),
            |c| {
                c.start().unwrap();
                c.pause().unwrap();
            },
            |c| {
                c.start().unwrap();
                c.seek(Duration::from_millis(700)).unwrap();
            },
        ];
        for drive in drives {
            let (mut controller, _) = fixture.controller();
            controller.prepare_for_playback(&audio).unwrap();
            let transient = controller.transient_path().unwrap();
            drive(&mut controller);

            controller.cleanup();
            assert!(!transient.exists());
            assert_eq!(controller.state(), PlaybackState::Idle);
            assert_eq!(fixture.transient_files(), 0);
        }
    }

    #[test]
    fn cleanup_from_idle_is_harmless() {
        let fixture = Fixture::new();
        let (mut controller, recorder) = fixture.controller();
        controller.cleanup();
        controller.cleanup();
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(recorder.states.lock().is_empty());
    }

    #[test]
    fn preconditions_are_enforced() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 1_000);
        let (mut controller, _) = fixture.controller();

        assert_eq!(
            controller.pause().unwrap_err(),
            PlaybackError::InvalidPlaybackState {
                operation: "pause",
                state: PlaybackState::Idle
            }
        );
        assert!(controller.start().is_err());
        assert!(controller.stop().is_err());
        assert!(controller.seek(Duration::ZERO).is_err());

        controller.prepare_for_playback(&audio).unwrap();
        assert!(controller.resume().is_err());
        controller.start().unwrap();
        assert_eq!(
            controller.prepare_for_playback(&audio).unwrap_err(),
            PlaybackError::InvalidPlaybackState {
                operation: "prepare",
                state: PlaybackState::Playing
            }
        );
        assert!(controller.start().is_err());
        controller.pause().unwrap();
        assert!(controller.pause().is_err());
        controller.resume().unwrap();
        controller.cleanup();
    }

    #[test]
    fn stop_wipes_plaintext_and_requires_new_prepare() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 1_000);
        let (mut controller, _) = fixture.controller();
        controller.prepare_for_playback(&audio).unwrap();
        let transient = controller.transient_path().unwrap();
        controller.start().unwrap();

        controller.stop().unwrap();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!transient.exists());
        assert!(controller.start().is_err());

        controller.prepare_for_playback(&audio).unwrap();
        controller.start().unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    #[test]
    fn playback_runs_to_completion() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 150);
        let (mut controller, recorder) = fixture.controller();
        controller.prepare_for_playback(&audio).unwrap();
        let transient = controller.transient_path().unwrap();
        controller.start().unwrap();

        assert!(wait_for(|| controller.state() == PlaybackState::Completed));
        assert!(!transient.exists());
        assert_eq!(
            recorder.states.lock().last().copied(),
            Some(PlaybackState::Completed)
        );
        let progress = recorder.progress.lock().clone();
        assert!(progress.contains(&(Duration::from_millis(150), Duration::from_millis(150))));
        assert_eq!(recorder.states.lock().iter().filter(|s| **s == PlaybackState::Completed).count(), 1);

        assert!(controller.prepare_for_playback(&audio).is_err());
        controller.cleanup();
        controller.prepare_for_playback(&audio).unwrap();
    }

    #[test]
    fn seek_clamps_to_duration() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 1_000);
        let (mut controller, _) = fixture.controller();
        controller.prepare_for_playback(&audio).unwrap();

        controller.seek(Duration::from_secs(60)).unwrap();
        assert_eq!(controller.current_time(), Duration::from_millis(1_000));
        controller.seek(Duration::from_millis(250)).unwrap();
        assert_eq!(controller.current_time(), Duration::from_millis(250));
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }

    #[test]
    fn missing_file_is_reported() {
        let fixture = Fixture::new();
        let (mut controller, recorder) = fixture.controller();
        let audio = SealedAudioRef::new(fixture.dir.path().join("absent.jaef"), "entry-1");
        assert!(matches!(
            controller.prepare_for_playback(&audio),
            Err(PlaybackError::FileNotFound(_))
        ));
        assert_eq!(controller.state(), PlaybackState::Failed);
        assert_eq!(recorder.errors.lock().len(), 1);
    }

    #[test]
    fn tampered_file_fails_without_plaintext() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 1_000);
        let mut file = fs::OpenOptions::new().read(true).write(true).open(&audio.path).unwrap();
        let len = file.metadata().unwrap().len();
        file.seek(SeekFrom::Start(len - 40)).unwrap();
        let mut byte = [0u8; 1];
        file.read_exact(&mut byte).unwrap();
        file.seek(SeekFrom::Start(len - 40)).unwrap();
        file.write_all(&[byte[0] ^ 0x01]).unwrap();
        drop(file);

        let (mut controller, _) = fixture.controller();
        assert_eq!(
            controller.prepare_for_playback(&audio).unwrap_err(),
            PlaybackError::DecryptionFailed
        );
        assert_eq!(controller.state(), PlaybackState::Failed);
        assert_eq!(fixture.transient_files(), 0);
    }

    #[test]
    fn mismatched_iv_is_rejected_before_decrypting() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 200).with_iv([0u8; 12]);
        let (mut controller, _) = fixture.controller();
        assert_eq!(
            controller.prepare_for_playback(&audio).unwrap_err(),
            PlaybackError::DecryptionFailed
        );
        assert_eq!(fixture.transient_files(), 0);
    }

    #[test]
    fn checksum_mismatch_wipes_plaintext() {
        let fixture = Fixture::new();
        let mut audio = fixture.sealed("entry-1", 200);
        audio.checksum = Some("00".repeat(32));
        let (mut controller, _) = fixture.controller();
        assert_eq!(
            controller.prepare_for_playback(&audio).unwrap_err(),
            PlaybackError::DecryptionFailed
        );
        assert_eq!(fixture.transient_files(), 0);
    }

    #[test]
    fn wrong_journal_is_a_decryption_failure() {
        let fixture = Fixture::new();
        let mut audio = fixture.sealed("entry-1", 200);
        fixture.engine.journal_key("entry-2", true).unwrap();
        audio.journal_id = "entry-2".into();
        let (mut controller, _) = fixture.controller();
        assert_eq!(
            controller.prepare_for_playback(&audio).unwrap_err(),
            PlaybackError::DecryptionFailed
        );
    }

    #[test]
    fn interruption_pauses_and_resumes() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 5_000);
        let (mut controller, _) = fixture.controller();
        controller.prepare_for_playback(&audio).unwrap();
        let injector = fixture_injector(&controller);
        controller.start().unwrap();

        assert!(injector.send(OutputEvent::InterruptionBegan));
        assert!(wait_for(|| controller.state() == PlaybackState::Paused));
        assert!(injector.send(OutputEvent::InterruptionEnded { should_resume: true }));
        assert!(wait_for(|| controller.state() == PlaybackState::Playing));
        controller.cleanup();
    }

    #[test]
    fn device_fault_fails_and_wipes_plaintext() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 5_000);
        let (mut controller, recorder) = fixture.controller();
        controller.prepare_for_playback(&audio).unwrap();
        let transient = controller.transient_path().unwrap();
        let injector = fixture_injector(&controller);
        controller.start().unwrap();

        injector.send(OutputEvent::Fault("output device removed".into()));
        assert!(wait_for(|| controller.state() == PlaybackState::Failed));
        assert!(!transient.exists());
        assert_eq!(
            *recorder.errors.lock(),
            vec![PlaybackError::PlaybackFailed("output device removed".into())]
        );
    }

    #[test]
    fn drop_wipes_plaintext() {
        let fixture = Fixture::new();
        let audio = fixture.sealed("entry-1", 1_000);
        let (mut controller, _) = fixture.controller();
        controller.prepare_for_playback(&audio).unwrap();
        controller.start().unwrap();
        drop(controller);
        assert_eq!(fixture.transient_files(), 0);
    }

    fn fixture_injector(controller: &PlaybackController<ClockPlayback>) -> crate::platform::simulated::EventInjector<OutputEvent> {
        controller.shared.device.lock().injector()
    }
}

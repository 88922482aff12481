//! Software stand-ins for the platform audio primitives.
//!
//! `ToneCapture` records a sine tone to a WAV file in real time and
//! `ClockPlayback` "plays" a WAV file against the wall clock. Both accept
//! injected interruption and fault events through an [`EventInjector`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::audio_models::AudioFormat;
use crate::processing::levels::{encode_pcm, rms_level};
use crate::processing::wav_format::{self, generate_wav_header};
use crate::traits::capture_device::{CaptureDevice, CaptureEvent};
use crate::traits::playback_device::{OutputEvent, PlaybackDevice};

/// Length of one generated capture block.
const BLOCK: Duration = Duration::from_millis(20);

type EventSlot<E> = Arc<Mutex<Option<Sender<E>>>>;

/// Pushes events into whatever session a simulated device is running.
#[derive(Clone)]
pub struct EventInjector<E> {
    slot: EventSlot<E>,
}

impl<E> EventInjector<E> {
    /// Returns `false` when no session is listening.
    pub fn send(&self, event: E) -> bool {
        match self.slot.lock().as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }
}

struct ToneWorker {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    join: JoinHandle<Result<(), String>>,
}

/// Capture device producing a continuous sine tone.
pub struct ToneCapture {
    frequency: f32,
    level: f32,
    available: bool,
    events: EventSlot<CaptureEvent>,
    worker: Option<ToneWorker>,
}

impl ToneCapture {
    pub fn new(frequency: f32, level: f32) -> Self {
        Self {
            frequency,
            level: level.clamp(0.0, 1.0),
            available: true,
            events: Arc::new(Mutex::new(None)),
            worker: None,
        }
    }

    /// A device that reports no capture hardware.
    pub fn unavailable() -> Self {
        let mut capture = Self::new(440.0, 0.5);
        capture.available = false;
        capture
    }

    pub fn injector(&self) -> EventInjector<CaptureEvent> {
        EventInjector {
            slot: Arc::clone(&self.events),
        }
    }
}

impl Default for ToneCapture {
    fn default() -> Self {
        Self::new(440.0, 0.5)
    }
}

impl CaptureDevice for ToneCapture {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&mut self, output: &Path, format: &AudioFormat, events: Sender<CaptureEvent>) -> Result<(), String> {
        if !self.available {
            return Err("no capture hardware".into());
        }
        if self.worker.is_some() {
            return Err("capture already running".into());
        }

        let file = File::create(output).map_err(|e| format!("failed to create {}: {}", output.display(), e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&generate_wav_header(format, 0))
            .map_err(|e| format!("failed to write header: {e}"))?;

        *self.events.lock() = Some(events);
        let running = Arc::new(AtomicBool::new(true));
        let paused = Arc::new(AtomicBool::new(false));
        let tone = ToneLoop {
            format: *format,
            frequency: self.frequency,
            level: self.level,
            running: Arc::clone(&running),
            paused: Arc::clone(&paused),
            events: Arc::clone(&self.events),
        };
        let join = thread::Builder::new()
            .name("tone-capture".into())
            .spawn(move || tone.run(writer))
            .map_err(|e| format!("failed to spawn capture thread: {e}"))?;

        self.worker = Some(ToneWorker { running, paused, join });
        log::debug!("tone capture started at {}", output.display());
        Ok(())
    }

    fn pause(&mut self) -> Result<(), String> {
        let worker = self.worker.as_ref().ok_or("capture is not running")?;
        worker.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), String> {
        let worker = self.worker.as_ref().ok_or("capture is not running")?;
        worker.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), String> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.running.store(false, Ordering::SeqCst);
        let outcome = worker.join.join().map_err(|_| "capture thread panicked".to_string())?;
        self.events.lock().take();
        outcome
    }
}

impl Drop for ToneCapture {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("tone capture stopped with error: {}", e);
        }
    }
}

struct ToneLoop {
    format: AudioFormat,
    frequency: f32,
    level: f32,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    events: EventSlot<CaptureEvent>,
}

impl ToneLoop {
    fn run(self, mut writer: BufWriter<File>) -> Result<(), String> {
        let frames_per_block = (self.format.sample_rate as u64 * BLOCK.as_millis() as u64 / 1000) as usize;
        let channels = usize::from(self.format.channels.max(1));
        let step = 2.0 * std::f32::consts::PI * self.frequency / self.format.sample_rate as f32;
        let mut phase = 0.0f32;
        let mut data_len: u64 = 0;
        let mut next = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            next += BLOCK;
            if let Some(wait) = next.checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }
            if self.paused.load(Ordering::SeqCst) {
                continue;
            }

            let mono: Vec<f32> = (0..frames_per_block)
                .map(|_| {
                    let sample = phase.sin() * self.level;
                    phase = (phase + step) % (2.0 * std::f32::consts::PI);
                    sample
                })
                .collect();
            let interleaved: Vec<f32> = mono.iter().flat_map(|s| std::iter::repeat(*s).take(channels)).collect();
            let pcm = encode_pcm(&interleaved, self.format.bit_depth);

            if let Err(e) = writer.write_all(&pcm) {
                let message = format!("capture write failed: {e}");
                self.emit(CaptureEvent::Fault(message.clone()));
                return Err(message);
            }
            data_len += pcm.len() as u64;
            self.emit(CaptureEvent::Amplitude(rms_level(&mono)));
        }

        let mut file = writer.into_inner().map_err(|e| format!("failed to flush capture: {}", e.error()))?;
        wav_format::finalize_header(&mut file, data_len).map_err(|e| format!("failed to finalize header: {e}"))?;
        file.sync_all().map_err(|e| format!("failed to sync capture: {e}"))?;
        Ok(())
    }

    fn emit(&self, event: CaptureEvent) {
        if let Some(sender) = self.events.lock().as_ref() {
            let _ = sender.send(event);
        }
    }
}

struct FinishWatch {
    cancelled: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl FinishWatch {
    fn spawn(remaining: Duration, events: EventSlot<OutputEvent>) -> Result<Self, String> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let deadline = Instant::now() + remaining;
        let join = thread::Builder::new()
            .name("clock-playback".into())
            .spawn(move || {
                while !flag.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    if now >= deadline {
                        if let Some(sender) = events.lock().as_ref() {
                            let _ = sender.send(OutputEvent::Finished);
                        }
                        return;
                    }
                    thread::park_timeout(deadline - now);
                }
            })
            .map_err(|e| format!("failed to spawn playback clock: {e}"))?;
        Ok(Self { cancelled, join })
    }

    fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.join.thread().unpark();
        let _ = self.join.join();
    }
}

/// Playback device that advances a clock over the loaded WAV's duration.
///
/// Holds the file open while loaded, like a real decoder would.
pub struct ClockPlayback {
    file: Option<(PathBuf, File)>,
    duration: Duration,
    position: Duration,
    playing_since: Option<Instant>,
    events: EventSlot<OutputEvent>,
    watch: Option<FinishWatch>,
}

impl ClockPlayback {
    pub fn new() -> Self {
        Self {
            file: None,
            duration: Duration::ZERO,
            position: Duration::ZERO,
            playing_since: None,
            events: Arc::new(Mutex::new(None)),
            watch: None,
        }
    }

    pub fn injector(&self) -> EventInjector<OutputEvent> {
        EventInjector {
            slot: Arc::clone(&self.events),
        }
    }

    pub fn loaded_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    fn halt(&mut self) {
        self.position = self.current_time();
        self.playing_since = None;
        if let Some(watch) = self.watch.take() {
            watch.cancel();
        }
    }

    fn run_from_position(&mut self) -> Result<(), String> {
        self.playing_since = Some(Instant::now());
        let remaining = self.duration.saturating_sub(self.position);
        self.watch = Some(FinishWatch::spawn(remaining, Arc::clone(&self.events))?);
        Ok(())
    }
}

impl Default for ClockPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackDevice for ClockPlayback {
    fn load(&mut self, path: &Path, events: Sender<OutputEvent>) -> Result<Duration, String> {
        self.unload();
        let info = wav_format::read_wav_info(path)?;
        let file = File::open(path).map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
        self.file = Some((path.to_path_buf(), file));
        self.duration = Duration::from_millis(info.format.duration_ms(info.data_len));
        self.position = Duration::ZERO;
        *self.events.lock() = Some(events);
        Ok(self.duration)
    }

    fn play(&mut self) -> Result<(), String> {
        if self.file.is_none() {
            return Err("nothing loaded".into());
        }
        if self.playing_since.is_some() {
            return Ok(());
        }
        if self.position >= self.duration {
            self.position = Duration::ZERO;
        }
        self.run_from_position()
    }

    fn pause(&mut self) -> Result<(), String> {
        if self.file.is_none() {
            return Err("nothing loaded".into());
        }
        self.halt();
        Ok(())
    }

    fn stop(&mut self) {
        self.halt();
        self.position = Duration::ZERO;
    }

    fn seek(&mut self, position: Duration) -> Result<(), String> {
        if self.file.is_none() {
            return Err("nothing loaded".into());
        }
        let playing = self.playing_since.is_some();
        self.halt();
        self.position = position.min(self.duration);
        if playing {
            self.run_from_position()?;
        }
        Ok(())
    }

    fn current_time(&self) -> Duration {
        let advanced = self.playing_since.map(|since| since.elapsed()).unwrap_or_default();
        (self.position + advanced).min(self.duration)
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn unload(&mut self) {
        self.stop();
        self.file = None;
        self.duration = Duration::ZERO;
        self.events.lock().take();
    }
}

impl Drop for ClockPlayback {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn tone_capture_writes_valid_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let (tx, rx) = mpsc::channel();

        let mut capture = ToneCapture::default();
        capture.start(&path, &AudioFormat::default(), tx).unwrap();
        thread::sleep(Duration::from_millis(120));
        capture.stop().unwrap();

        let info = wav_format::read_wav_info(&path).unwrap();
        assert_eq!(info.format, AudioFormat::default());
        assert!(info.data_len > 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), info.data_len + 44);

        let levels: Vec<f32> = rx
            .try_iter()
            .filter_map(|e| match e {
                CaptureEvent::Amplitude(level) => Some(level),
                _ => None,
            })
            .collect();
        assert!(!levels.is_empty());
        assert!(levels.iter().all(|l| *l > 0.2 && *l < 0.5));
    }

    #[test]
    fn paused_capture_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let (tx, _rx) = mpsc::channel();

        let mut capture = ToneCapture::default();
        capture.start(&path, &AudioFormat::default(), tx).unwrap();
        capture.pause().unwrap();
        thread::sleep(Duration::from_millis(100));
        capture.stop().unwrap();

        assert_eq!(wav_format::read_wav_info(&path).unwrap().data_len, 0);
    }

    #[test]
    fn unavailable_capture_refuses_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel();
        let mut capture = ToneCapture::unavailable();
        assert!(!capture.is_available());
        assert!(capture.start(&dir.path().join("x.wav"), &AudioFormat::default(), tx).is_err());
    }

    #[test]
    fn injector_reaches_running_session_only() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let mut capture = ToneCapture::default();
        let injector = capture.injector();
        assert!(!injector.send(CaptureEvent::InterruptionBegan));

        capture.start(&dir.path().join("x.wav"), &AudioFormat::default(), tx).unwrap();
        assert!(injector.send(CaptureEvent::InterruptionBegan));
        capture.stop().unwrap();
        assert!(rx.try_iter().any(|e| e == CaptureEvent::InterruptionBegan));
        assert!(!injector.send(CaptureEvent::InterruptionBegan));
    }

    fn short_wav(dir: &Path, millis: u64) -> PathBuf {
        let path = dir.join("clip.wav");
        let format = AudioFormat::default();
        let data_len = u64::from(format.byte_rate()) * millis / 1000;
        let mut bytes = generate_wav_header(&format, data_len as u32).to_vec();
        bytes.resize(bytes.len() + data_len as usize, 0);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn clock_playback_reports_duration_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let path = short_wav(dir.path(), 80);
        let (tx, rx) = mpsc::channel();

        let mut playback = ClockPlayback::new();
        assert_eq!(playback.load(&path, tx).unwrap(), Duration::from_millis(80));
        playback.play().unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), OutputEvent::Finished);
        assert_eq!(playback.current_time(), Duration::from_millis(80));
    }

    #[test]
    fn clock_playback_pause_and_seek() {
        let dir = tempfile::tempdir().unwrap();
        let path = short_wav(dir.path(), 1000);
        let (tx, _rx) = mpsc::channel();

        let mut playback = ClockPlayback::new();
        playback.load(&path, tx).unwrap();
        playback.seek(Duration::from_millis(400)).unwrap();
        assert_eq!(playback.current_time(), Duration::from_millis(400));

        playback.play().unwrap();
        thread::sleep(Duration::from_millis(30));
        playback.pause().unwrap();
        let paused_at = playback.current_time();
        assert!(paused_at > Duration::from_millis(400));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(playback.current_time(), paused_at);

        playback.seek(Duration::from_secs(10)).unwrap();
        assert_eq!(playback.current_time(), Duration::from_millis(1000));
    }

    #[test]
    fn unload_releases_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = short_wav(dir.path(), 50);
        let (tx, _rx) = mpsc::channel();

        let mut playback = ClockPlayback::new();
        playback.load(&path, tx).unwrap();
        assert_eq!(playback.loaded_path(), Some(path.as_path()));
        playback.unload();
        assert!(playback.loaded_path().is_none());
        assert!(playback.play().is_err());
    }

    #[test]
    fn load_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.bin");
        std::fs::write(&path, vec![1u8; 100]).unwrap();
        let (tx, _rx) = mpsc::channel();
        assert!(ClockPlayback::new().load(&path, tx).is_err());
    }
}

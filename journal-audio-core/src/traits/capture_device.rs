use std::path::Path;
use std::sync::mpsc::Sender;

use crate::models::audio_models::AudioFormat;

/// Asynchronous notifications from a capture primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// Current normalized input level (0.0–1.0).
    Amplitude(f32),
    /// A call, another app or the OS took the input away.
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    /// Unrecoverable hardware or I/O fault.
    Fault(String),
}

/// Platform audio capture primitive.
///
/// Writes raw audio to the given path; the controller owns sealing and cleanup.
/// The event sender is valid for one session; implementations drop it on `stop`.
/// Sending never blocks, so events may be emitted from real-time threads.
pub trait CaptureDevice: Send {
    /// Whether the capture hardware is currently available.
    fn is_available(&self) -> bool;

    /// Begin writing audio to `output`. Returns once the hardware is running.
    fn start(&mut self, output: &Path, format: &AudioFormat, events: Sender<CaptureEvent>) -> Result<(), String>;

    fn pause(&mut self) -> Result<(), String>;

    fn resume(&mut self) -> Result<(), String>;

    /// Stop capturing and finalize the raw file.
    fn stop(&mut self) -> Result<(), String>;
}

use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Asynchronous notifications from a playback primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The decoder reached the end of the media.
    Finished,
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    Fault(String),
}

/// Platform audio decode/playback primitive.
pub trait PlaybackDevice: Send {
    /// Open the plaintext file at `path`, returning its duration.
    fn load(&mut self, path: &Path, events: Sender<OutputEvent>) -> Result<Duration, String>;

    fn play(&mut self) -> Result<(), String>;

    fn pause(&mut self) -> Result<(), String>;

    /// Halt output and rewind to the start.
    fn stop(&mut self);

    fn seek(&mut self, position: Duration) -> Result<(), String>;

    fn current_time(&self) -> Duration;

    fn duration(&self) -> Duration;

    /// Release every handle on the loaded file. Safe to call when nothing is loaded.
    fn unload(&mut self);
}

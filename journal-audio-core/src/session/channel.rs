//! Channel adapters for controller observers.
//!
//! Each adapter implements a delegate trait by forwarding every callback as
//! a message, so a UI or async runtime can consume controller notifications
//! from its own thread.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::models::error::{PlaybackError, RecordingError};
use crate::models::recording_result::RecordingResult;
use crate::models::state::{PlaybackState, RecordingState};
use crate::traits::playback_delegate::PlaybackDelegate;
use crate::traits::recording_delegate::RecordingDelegate;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordingUpdate {
    State(RecordingState),
    Amplitude { level: f32, duration: Duration },
    Error(RecordingError),
    Finished(RecordingResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackUpdate {
    State(PlaybackState),
    Progress { position: Duration, duration: Duration },
    Error(PlaybackError),
}

/// Forwards recording notifications into a channel.
///
/// Sends after the receiver is gone are dropped silently.
pub struct ChannelRecordingDelegate {
    sender: Sender<RecordingUpdate>,
}

impl ChannelRecordingDelegate {
    pub fn new() -> (Self, Receiver<RecordingUpdate>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }

    fn send(&self, update: RecordingUpdate) {
        let _ = self.sender.send(update);
    }
}

impl RecordingDelegate for ChannelRecordingDelegate {
    fn on_state_changed(&self, state: RecordingState) {
        self.send(RecordingUpdate::State(state));
    }

    fn on_amplitude(&self, level: f32, duration: Duration) {
        self.send(RecordingUpdate::Amplitude { level, duration });
    }

    fn on_error(&self, error: &RecordingError) {
        self.send(RecordingUpdate::Error(error.clone()));
    }

    fn on_recording_finished(&self, result: &RecordingResult) {
        self.send(RecordingUpdate::Finished(result.clone()));
    }
}

/// Forwards playback notifications into a channel.
pub struct ChannelPlaybackDelegate {
    sender: Sender<PlaybackUpdate>,
}

impl ChannelPlaybackDelegate {
    pub fn new() -> (Self, Receiver<PlaybackUpdate>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }

    fn send(&self, update: PlaybackUpdate) {
        let _ = self.sender.send(update);
    }
}

impl PlaybackDelegate for ChannelPlaybackDelegate {
    fn on_state_changed(&self, state: PlaybackState) {
        self.send(PlaybackUpdate::State(state));
    }

    fn on_progress(&self, position: Duration, duration: Duration) {
        self.send(PlaybackUpdate::Progress { position, duration });
    }

    fn on_error(&self, error: &PlaybackError) {
        self.send(PlaybackUpdate::Error(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_updates_arrive_in_order() {
        let (delegate, updates) = ChannelRecordingDelegate::new();
        delegate.on_state_changed(RecordingState::Recording);
        delegate.on_amplitude(0.5, Duration::from_millis(100));
        delegate.on_error(&RecordingError::CaptureFailed("gone".into()));

        let received: Vec<_> = updates.try_iter().collect();
        assert_eq!(
            received,
            vec![
                RecordingUpdate::State(RecordingState::Recording),
                RecordingUpdate::Amplitude {
                    level: 0.5,
                    duration: Duration::from_millis(100)
                },
                RecordingUpdate::Error(RecordingError::CaptureFailed("gone".into())),
            ]
        );
    }

    #[test]
    fn send_after_receiver_dropped_is_ignored() {
        let (delegate, updates) = ChannelPlaybackDelegate::new();
        drop(updates);
        delegate.on_state_changed(PlaybackState::Playing);
        delegate.on_progress(Duration::ZERO, Duration::from_secs(1));
    }

    #[test]
    fn playback_updates_cross_threads() {
        let (delegate, updates) = ChannelPlaybackDelegate::new();
        let delegate = std::sync::Arc::new(delegate);
        let sender = std::sync::Arc::clone(&delegate);
        std::thread::spawn(move || sender.on_state_changed(PlaybackState::Completed))
            .join()
            .unwrap();
        assert_eq!(updates.recv().unwrap(), PlaybackUpdate::State(PlaybackState::Completed));
    }
}

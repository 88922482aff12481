use std::time::Duration;

use crate::models::error::PlaybackError;
use crate::models::state::PlaybackState;

/// Observer for playback controller notifications.
///
/// Same threading rules as [`RecordingDelegate`](super::recording_delegate::RecordingDelegate).
pub trait PlaybackDelegate: Send + Sync {
    fn on_state_changed(&self, state: PlaybackState);

    /// Called at the progress interval while playing.
    fn on_progress(&self, position: Duration, duration: Duration);

    fn on_error(&self, error: &PlaybackError);
}

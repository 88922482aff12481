use std::time::Duration;

use crate::models::error::RecordingError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::RecordingState;

/// Observer for recording controller notifications.
///
/// Methods run on controller or timer threads, sometimes while the controller
/// is mid-transition. Implementations must not call back into the controller
/// synchronously; marshal to another thread if needed.
pub trait RecordingDelegate: Send + Sync {
    /// Called after every state transition.
    fn on_state_changed(&self, state: RecordingState);

    /// Called at the sampling interval while recording.
    fn on_amplitude(&self, level: f32, duration: Duration);

    fn on_error(&self, error: &RecordingError);

    /// Called once the artifact is sealed and the raw capture removed.
    fn on_recording_finished(&self, result: &RecordingResult);
}

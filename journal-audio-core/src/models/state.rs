use serde::{Deserialize, Serialize};

/// Recording state machine.
///
/// State transitions:
/// ```text
/// idle → preparing → recording ↔ paused
///                        ↓          ↓
///                 completed / cancelled / failed
/// ```
/// Interruptions move `recording → paused` and, when the platform reports the
/// session as resumable, back again. Any capture or sealing fault ends in
/// `failed`; a new session has to be started afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Idle,
    Preparing,
    Recording,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl RecordingState {
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// A session exists and owns the capture hardware.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Preparing | Self::Recording | Self::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Playback state machine.
///
/// ```text
/// idle/stopped → preparing → stopped (ready) → playing ↔ paused
///                    ↓                            ↓
///                  failed                 stopped / completed
/// ```
/// `cleanup()` returns to `idle` from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Preparing,
    Playing,
    Paused,
    Stopped,
    Completed,
    Failed,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// States from which a new sealed artifact may be prepared.
    pub fn can_prepare(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_recording_states() {
        assert!(RecordingState::Preparing.is_active());
        assert!(RecordingState::Recording.is_active());
        assert!(RecordingState::Paused.is_active());
        assert!(!RecordingState::Idle.is_active());
        assert!(!RecordingState::Failed.is_active());
    }

    #[test]
    fn terminal_recording_states() {
        for state in [RecordingState::Completed, RecordingState::Cancelled, RecordingState::Failed] {
            assert!(state.is_terminal());
            assert!(!state.is_active());
        }
    }

    #[test]
    fn prepare_only_from_idle_or_stopped() {
        assert!(PlaybackState::Idle.can_prepare());
        assert!(PlaybackState::Stopped.can_prepare());
        assert!(!PlaybackState::Playing.can_prepare());
        assert!(!PlaybackState::Completed.can_prepare());
    }

    #[test]
    fn states_serialize_lowercase() {
        let json = serde_json::to_string(&RecordingState::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}

pub mod channel;
pub mod playback;
pub mod recording;
pub mod timer;

pub use channel::{ChannelPlaybackDelegate, ChannelRecordingDelegate, PlaybackUpdate, RecordingUpdate};
pub use playback::PlaybackController;
pub use recording::RecordingController;

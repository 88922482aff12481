pub mod capture_device;
pub mod key_store;
pub mod playback_delegate;
pub mod playback_device;
pub mod recording_delegate;
pub mod user_presence;
pub mod value_store;

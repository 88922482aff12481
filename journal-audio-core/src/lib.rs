//! # journal-audio-core
//!
//! Secure audio journaling core library.
//!
//! Records voice entries, seals them at rest with AES-256-GCM under
//! per-journal keys, and plays them back through a transient plaintext file
//! that never outlives the playback session. Platform backends implement the
//! capture, playback, key container and value store traits and plug into the
//! generic controllers.
//!
//! ## Architecture
//!
//! ```text
//! journal-audio-core (this crate)
//! ├── traits/       ← KeyStore, ValueStore, CaptureDevice, PlaybackDevice, delegates
//! ├── models/       ← errors, states, configuration, SealedArtifact, AudioMetadata
//! ├── crypto/       ← EncryptionEngine, streaming file format, password KDF
//! ├── storage/      ← SecureStorage, metadata sidecars, transient files
//! ├── processing/   ← WAV header build/parse, level metering
//! ├── session/      ← RecordingController, PlaybackController, timers
//! ├── platform/     ← in-memory and simulated backends
//! └── services      ← JournalAudioServices composition root
//! ```

pub mod crypto;
pub mod models;
pub mod platform;
pub mod processing;
pub mod services;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use crypto::engine::{journal_key_identifier, EncryptionEngine, FileJob};
pub use models::artifact::{OpenedFileInfo, SealedArtifact, SealedAudioRef, SealedFileInfo};
pub use models::audio_models::AudioFormat;
pub use models::config::{
    EncryptionConfiguration, JournalAudioConfig, PlaybackConfiguration, RecordingConfiguration, StorageConfiguration,
};
pub use models::error::{ConfigError, CryptoError, KeyStoreError, PlaybackError, RecordingError, StorageError};
pub use models::recording_result::{AudioMetadata, RecordingResult};
pub use models::state::{PlaybackState, RecordingState};
pub use services::JournalAudioServices;
pub use session::channel::{ChannelPlaybackDelegate, ChannelRecordingDelegate, PlaybackUpdate, RecordingUpdate};
pub use session::playback::PlaybackController;
pub use session::recording::RecordingController;
pub use storage::secure_storage::{MigrationReport, SecureStorage};
pub use traits::capture_device::{CaptureDevice, CaptureEvent};
pub use traits::key_store::{KeyAccess, KeyOrigin, KeyStore, SymmetricKey};
pub use traits::playback_delegate::PlaybackDelegate;
pub use traits::playback_device::{OutputEvent, PlaybackDevice};
pub use traits::recording_delegate::RecordingDelegate;
pub use traits::user_presence::{PresenceOutcome, UserPresence};
pub use traits::value_store::{AccessibilityPolicy, ValueStore};

//! Authenticated encryption for journal payloads and audio files.
//!
//! All sealing is AES-256-GCM. Byte payloads become a [`SealedArtifact`];
//! files use the chunked stream format in [`stream`].
//!
//! [`SealedArtifact`]: crate::models::artifact::SealedArtifact

pub mod encoding;
pub mod engine;
pub mod format;
pub mod kdf;
pub mod stream;

pub use engine::{journal_key_identifier, EncryptionEngine, FileJob};

use thiserror::Error;

use super::state::{PlaybackState, RecordingState};

/// Errors raised by a [`KeyStore`](crate::traits::key_store::KeyStore) backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    /// User-presence confirmation failed or was cancelled.
    #[error("user authentication failed or was cancelled")]
    AuthFailed,

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("key store backend error: {0}")]
    Backend(String),
}

/// Errors from the encryption engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Empty, wrongly sized or otherwise unusable key (or password).
    #[error("invalid key")]
    InvalidKey,

    /// Tag mismatch or structural corruption. Never partially trusted.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("unsupported format version: {0}")]
    UnsupportedFormat(u8),

    #[error("file operation failed: {0}")]
    FileOperationFailed(String),

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl CryptoError {
    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        Self::FileOperationFailed(format!("{context}: {err}"))
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors from [`SecureStorage`](crate::storage::secure_storage::SecureStorage)
/// and the value-store collaborators underneath it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("no value stored for key: {0}")]
    NotFound(String),

    #[error("user authentication failed or was cancelled")]
    AuthFailed,

    #[error("stored value is corrupt: {0}")]
    Corrupt(String),

    #[error("unrecognized format: {0}")]
    UnrecognizedFormat(String),

    #[error(transparent)]
    Crypto(CryptoError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<CryptoError> for StorageError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyStore(KeyStoreError::AuthFailed) => Self::AuthFailed,
            CryptoError::DecryptionFailed => Self::Corrupt("authentication tag mismatch".into()),
            other => Self::Crypto(other),
        }
    }
}

impl From<KeyStoreError> for StorageError {
    fn from(err: KeyStoreError) -> Self {
        Self::from(CryptoError::KeyStore(err))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from the recording controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("cannot {operation} while recording is {state:?}")]
    InvalidRecordingState {
        operation: &'static str,
        state: RecordingState,
    },

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("file operation failed: {0}")]
    FileOperationFailed(String),
}

/// Errors from the playback controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("cannot {operation} while playback is {state:?}")]
    InvalidPlaybackState {
        operation: &'static str,
        state: PlaybackState,
    },

    #[error("sealed audio file not found: {0}")]
    FileNotFound(String),

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("playback failed: {0}")]
    PlaybackFailed(String),

    #[error("file operation failed: {0}")]
    FileOperationFailed(String),
}

impl From<CryptoError> for PlaybackError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::FileOperationFailed(msg) => Self::FileOperationFailed(msg),
            CryptoError::KeyStore(e) => Self::PlaybackFailed(format!("key unavailable: {e}")),
            _ => Self::DecryptionFailed,
        }
    }
}

/// Errors loading or validating configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

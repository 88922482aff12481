use serde::{Deserialize, Serialize};

use crate::models::error::StorageError;

/// When a persisted value may be read, mirroring platform keychain classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessibilityPolicy {
    WhenUnlocked,
    WhenUnlockedThisDeviceOnly,
    AfterFirstUnlock,
    AfterFirstUnlockThisDeviceOnly,
}

/// Opaque key-value persistence collaborator underneath `SecureStorage`.
///
/// Values arrive already sealed; implementations only move bytes.
pub trait ValueStore: Send + Sync {
    fn save(&self, bytes: &[u8], key: &str, policy: AccessibilityPolicy) -> Result<(), StorageError>;

    /// `Ok(None)` when nothing is stored under `key`.
    fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    fn contains(&self, key: &str) -> Result<bool, StorageError>;
}

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::container::{ExportPackage, ExportPayload, SecureContainer};
use super::locks::KeyedLocks;
use crate::crypto::engine::EncryptionEngine;
use crate::crypto::kdf::PASSWORD_KEY_IDENTIFIER;
use crate::models::config::StorageConfiguration;
use crate::models::error::{CryptoError, KeyStoreError, StorageError, StorageResult};
use crate::traits::key_store::{KeyAccess, SymmetricKey};
use crate::traits::value_store::ValueStore;

/// Key store identifier sealing values stored without a user-presence gate.
pub const STANDARD_STORAGE_KEY: &str = "journal-audio.storage.standard";

/// Key store identifier sealing values that require user presence to read.
pub const PROTECTED_STORAGE_KEY: &str = "journal-audio.storage.protected";

/// Outcome of [`SecureStorage::migrate_from_legacy_storage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: Vec<String>,
    pub missing: Vec<String>,
}

/// Encrypted key-value storage for small values.
///
/// Each value is sealed under a storage key held in the key store, wrapped in a
/// versioned [`SecureContainer`] and handed to the value store under
/// `{namespace}.{key}`. The logical key is bound into the associated data, so
/// a container copied to another slot fails to open.
///
/// Reads and writes of the same logical key are serialized; different keys
/// never block each other.
pub struct SecureStorage {
    engine: Arc<EncryptionEngine>,
    backend: Arc<dyn ValueStore>,
    config: StorageConfiguration,
    locks: KeyedLocks,
}

impl SecureStorage {
    pub fn new(engine: Arc<EncryptionEngine>, backend: Arc<dyn ValueStore>, config: StorageConfiguration) -> Self {
        Self {
            engine,
            backend,
            config,
            locks: KeyedLocks::new(),
        }
    }

    /// Seal and persist `data` under `key`.
    ///
    /// With `biometric_gate` the value is sealed under a storage key that
    /// requires user presence on every later read.
    pub fn store(&self, data: &[u8], key: &str, biometric_gate: bool) -> StorageResult<()> {
        let slot = self.slot(key)?;
        let lock = self.locks.handle(&slot);
        let _guard = lock.lock();

        let sealing_key = self.sealing_key(biometric_gate)?;
        let artifact = self.engine.seal(data, &sealing_key, slot.as_bytes())?;
        let bytes = SecureContainer::seal(artifact).to_bytes()?;
        self.backend.save(&bytes, &slot, self.config.accessibility)?;
        log::debug!("stored secure value {}", key);
        Ok(())
    }

    /// Read and open the value under `key`.
    ///
    /// A value sealed with the gate always demands user presence, whatever
    /// `biometric_gate` says; passing `true` additionally demands it for
    /// ungated values.
    pub fn retrieve(&self, key: &str, biometric_gate: bool) -> StorageResult<Vec<u8>> {
        let slot = self.slot(key)?;
        let lock = self.locks.handle(&slot);
        let _guard = lock.lock();

        let bytes = self
            .backend
            .retrieve(&slot)?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        let container = SecureContainer::from_bytes(&bytes)?;

        let access = if biometric_gate { KeyAccess::UserPresence } else { KeyAccess::Always };
        let sealing_key = match self.engine.key_store().get_key(&container.key_identifier, access) {
            Ok(k) => k,
            Err(KeyStoreError::NotFound(_)) => {
                return Err(StorageError::Corrupt(format!("sealing key for {key} is gone")));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(self.engine.open(&container.artifact(), &sealing_key, slot.as_bytes())?)
    }

    /// Remove the value. Deleting a missing key is not an error.
    pub fn delete(&self, key: &str) -> StorageResult<()> {
        let slot = self.slot(key)?;
        let lock = self.locks.handle(&slot);
        let _guard = lock.lock();
        self.backend.delete(&slot)
    }

    pub fn exists(&self, key: &str) -> StorageResult<bool> {
        let slot = self.slot(key)?;
        self.backend.contains(&slot)
    }

    pub fn store_codable<T: Serialize>(&self, value: &T, key: &str, biometric_gate: bool) -> StorageResult<()> {
        let json = serde_json::to_vec(value).map_err(|e| StorageError::Backend(format!("failed to encode {key}: {e}")))?;
        self.store(&json, key, biometric_gate)
    }

    pub fn retrieve_codable<T: DeserializeOwned>(&self, key: &str, biometric_gate: bool) -> StorageResult<T> {
        let json = self.retrieve(key, biometric_gate)?;
        serde_json::from_slice(&json).map_err(|e| StorageError::Corrupt(format!("failed to decode {key}: {e}")))
    }

    /// Export the value under `key` as a password-protected package.
    pub fn secure_export(&self, key: &str, password: &str) -> StorageResult<Vec<u8>> {
        let value = self.retrieve(key, false)?;
        let payload = ExportPayload {
            key: key.to_string(),
            value,
            exported_at: chrono::Utc::now().to_rfc3339(),
        };
        let wrapped =
            serde_json::to_vec(&payload).map_err(|e| StorageError::Backend(format!("failed to encode export: {e}")))?;
        let (sealed, salt) = self.engine.encrypt_with_password(&wrapped, password).map_err(StorageError::Crypto)?;
        log::info!("exported secure value {}", key);
        ExportPackage::new(salt, sealed).to_bytes()
    }

    /// Restore a package produced by [`secure_export`](Self::secure_export)
    /// under its original key, returning that key.
    ///
    /// A wrong password surfaces as `StorageError::Crypto(DecryptionFailed)`.
    pub fn secure_import(&self, package: &[u8], password: &str, biometric_gate: bool) -> StorageResult<String> {
        let package = ExportPackage::from_bytes(package)?;
        if package.sealed.key_identifier() != PASSWORD_KEY_IDENTIFIER {
            return Err(StorageError::UnrecognizedFormat(format!(
                "export sealed under {}",
                package.sealed.key_identifier()
            )));
        }
        let wrapped = self
            .engine
            .decrypt_with_password(&package.sealed, password, &package.salt)
            .map_err(StorageError::Crypto)?;
        let payload: ExportPayload =
            serde_json::from_slice(&wrapped).map_err(|e| StorageError::Corrupt(format!("malformed export payload: {e}")))?;
        self.store(&payload.value, &payload.key, biometric_gate)?;
        log::info!("imported secure value {}", payload.key);
        Ok(payload.key)
    }

    /// Move plaintext values from a legacy store into sealed storage.
    ///
    /// Each legacy copy is deleted only after its sealed copy is persisted.
    pub fn migrate_from_legacy_storage(&self, legacy: &dyn ValueStore, keys: &[&str]) -> StorageResult<MigrationReport> {
        let mut report = MigrationReport::default();
        for &key in keys {
            match legacy.retrieve(key)? {
                Some(value) => {
                    self.store(&value, key, false)?;
                    legacy.delete(key)?;
                    report.migrated.push(key.to_string());
                }
                None => report.missing.push(key.to_string()),
            }
        }
        if !report.migrated.is_empty() {
            log::info!("migrated {} legacy values into secure storage", report.migrated.len());
        }
        Ok(report)
    }

    fn slot(&self, key: &str) -> StorageResult<String> {
        if key.is_empty() {
            return Err(StorageError::Backend("storage key must not be empty".into()));
        }
        Ok(format!("{}.{}", self.config.namespace, key))
    }

    fn sealing_key(&self, biometric_gate: bool) -> StorageResult<SymmetricKey> {
        let (id, access) = if biometric_gate {
            (PROTECTED_STORAGE_KEY, KeyAccess::UserPresence)
        } else {
            (STANDARD_STORAGE_KEY, KeyAccess::Always)
        };
        self.engine
            .key_store()
            .get_or_create_key(id, access)
            .map_err(|e| StorageError::from(CryptoError::KeyStore(e)))
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use parking_lot::Mutex;
use zeroize::Zeroizing;

use crate::crypto::format::KEY_LEN;
use crate::models::error::{KeyStoreError, StorageError};
use crate::traits::key_store::{KeyAccess, KeyOrigin, KeyStore, SymmetricKey};
use crate::traits::user_presence::{PresenceOutcome, UserPresence};
use crate::traits::value_store::{AccessibilityPolicy, ValueStore};

struct StoredKey {
    material: Zeroizing<Vec<u8>>,
    access: KeyAccess,
}

impl StoredKey {
    fn generate(access: KeyAccess) -> Self {
        let mut material = Zeroizing::new(vec![0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut material);
        Self { material, access }
    }

    fn handle(&self, id: &str) -> SymmetricKey {
        SymmetricKey::from_bytes(id, KeyOrigin::Generated, &self.material)
    }
}

/// Process-local key container.
///
/// Keys live only as long as the store. User-presence checks go through the
/// optional [`UserPresence`] provider; without one every such check fails.
pub struct MemoryKeyStore {
    keys: Mutex<HashMap<String, StoredKey>>,
    presence: Option<Arc<dyn UserPresence>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            presence: None,
        }
    }

    pub fn with_presence(presence: Arc<dyn UserPresence>) -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            presence: Some(presence),
        }
    }

    /// Prompt without holding the key table, so a slow or cancelled prompt
    /// leaves the table untouched.
    fn confirm(&self, id: &str) -> Result<(), KeyStoreError> {
        let Some(presence) = &self.presence else {
            log::warn!("key {} requires user presence but no provider is configured", id);
            return Err(KeyStoreError::AuthFailed);
        };
        match presence.confirm(&format!("Unlock {id}")) {
            PresenceOutcome::Confirmed => Ok(()),
            outcome => {
                log::info!("user presence for key {} not confirmed: {:?}", id, outcome);
                Err(KeyStoreError::AuthFailed)
            }
        }
    }

    fn lookup(&self, id: &str, access: KeyAccess, create: bool) -> Result<SymmetricKey, KeyStoreError> {
        if id.is_empty() {
            return Err(KeyStoreError::InvalidKeyMaterial("empty key identifier".into()));
        }

        let mut confirmed = false;
        loop {
            if access == KeyAccess::UserPresence && !confirmed {
                self.confirm(id)?;
                confirmed = true;
            }

            let mut keys = self.keys.lock();
            if let Some(stored) = keys.get(id) {
                if stored.access == KeyAccess::UserPresence && !confirmed {
                    drop(keys);
                    self.confirm(id)?;
                    confirmed = true;
                    continue;
                }
                return Ok(stored.handle(id));
            }

            if !create {
                return Err(KeyStoreError::NotFound(id.to_string()));
            }
            let stored = StoredKey::generate(access);
            let key = stored.handle(id);
            keys.insert(id.to_string(), stored);
            log::debug!("generated key {}", id);
            return Ok(key);
        }
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get_or_create_key(&self, id: &str, access: KeyAccess) -> Result<SymmetricKey, KeyStoreError> {
        self.lookup(id, access, true)
    }

    fn get_key(&self, id: &str, access: KeyAccess) -> Result<SymmetricKey, KeyStoreError> {
        self.lookup(id, access, false)
    }

    fn delete_key(&self, id: &str) -> Result<(), KeyStoreError> {
        if self.keys.lock().remove(id).is_some() {
            log::debug!("deleted key {}", id);
        }
        Ok(())
    }

    fn exists(&self, id: &str) -> bool {
        self.keys.lock().contains_key(id)
    }
}

/// Process-local value store recording the policy each value was saved with.
#[derive(Default)]
pub struct MemoryValueStore {
    values: Mutex<HashMap<String, (Vec<u8>, AccessibilityPolicy)>>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy_of(&self, key: &str) -> Option<AccessibilityPolicy> {
        self.values.lock().get(key).map(|(_, policy)| *policy)
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl ValueStore for MemoryValueStore {
    fn save(&self, bytes: &[u8], key: &str, policy: AccessibilityPolicy) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), (bytes.to_vec(), policy));
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.values.lock().get(key).map(|(bytes, _)| bytes.clone()))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.values.lock().contains_key(key))
    }
}

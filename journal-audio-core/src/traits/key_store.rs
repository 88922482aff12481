use zeroize::Zeroizing;

use crate::models::error::KeyStoreError;

/// How a symmetric key came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyOrigin {
    /// Random key generated by the key container.
    Generated,
    /// Derived from a user password for export/import.
    PasswordDerived,
}

/// Access requirement attached to a stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyAccess {
    #[default]
    Always,
    /// Retrieval requires platform user-presence confirmation (e.g. biometrics).
    UserPresence,
}

/// Opaque handle to symmetric key material.
///
/// Raw bytes are only readable inside this crate's encryption boundary and are
/// zeroized on drop. Never serialized.
pub struct SymmetricKey {
    identifier: String,
    origin: KeyOrigin,
    material: Zeroizing<Vec<u8>>,
}

impl SymmetricKey {
    /// Wrap key bytes produced by a key container.
    ///
    /// Length is not validated here; the engine rejects unusable keys with
    /// `CryptoError::InvalidKey`.
    pub fn from_bytes(identifier: impl Into<String>, origin: KeyOrigin, bytes: &[u8]) -> Self {
        Self {
            identifier: identifier.into(),
            origin,
            material: Zeroizing::new(bytes.to_vec()),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }

    pub(crate) fn material(&self) -> &[u8] {
        &self.material
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("identifier", &self.identifier)
            .field("origin", &self.origin)
            .field("material", &"<redacted>")
            .finish()
    }
}

/// Hardware/OS-backed secure key container.
///
/// Implemented by:
/// - `MemoryKeyStore` (tests, demos)
/// - Platform keychains/keystores supplied by the host application
///
/// Generate-and-store must be atomic from the caller's view: two concurrent
/// `get_or_create_key` calls for the same identifier return the same key.
pub trait KeyStore: Send + Sync {
    /// Return the key stored under `id`, generating it with a CSPRNG if absent.
    ///
    /// `access` is applied when the key is created. On retrieval, user presence
    /// is confirmed when either the stored key or the request demands it.
    /// A failed or cancelled confirmation leaves the store untouched and
    /// returns `KeyStoreError::AuthFailed`.
    fn get_or_create_key(&self, id: &str, access: KeyAccess) -> Result<SymmetricKey, KeyStoreError>;

    /// Return an existing key without creating one.
    fn get_key(&self, id: &str, access: KeyAccess) -> Result<SymmetricKey, KeyStoreError>;

    /// Remove the key. Deleting a missing key is not an error.
    fn delete_key(&self, id: &str) -> Result<(), KeyStoreError>;

    fn exists(&self, id: &str) -> bool;
}

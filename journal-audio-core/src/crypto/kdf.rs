use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use super::format::{format_spec, KEY_LEN, SALT_LEN};
use crate::models::error::{CryptoError, CryptoResult};
use crate::traits::key_store::{KeyOrigin, SymmetricKey};

/// Identifier carried by artifacts sealed under a password-derived key.
pub const PASSWORD_KEY_IDENTIFIER: &str = "password-derived";

/// Fresh random salt for one password derivation.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a key from `password` with the Argon2id costs frozen for `version`.
pub fn derive_password_key(password: &str, salt: &[u8], version: u8) -> CryptoResult<SymmetricKey> {
    if password.is_empty() {
        return Err(CryptoError::InvalidKey);
    }
    if salt.len() != SALT_LEN {
        return Err(CryptoError::Encoding(format!("salt is {} bytes, expected {}", salt.len(), SALT_LEN)));
    }

    let cost = format_spec(version)?.kdf;
    let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, Some(KEY_LEN))
        .map_err(|e| CryptoError::Encoding(format!("invalid KDF parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut derived = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut derived[..])
        .map_err(|e| CryptoError::Encoding(format!("key derivation failed: {e}")))?;

    Ok(SymmetricKey::from_bytes(
        PASSWORD_KEY_IDENTIFIER,
        KeyOrigin::PasswordDerived,
        &derived[..],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::format::CURRENT_FORMAT_VERSION;

    #[test]
    fn same_password_and_salt_derive_same_key() {
        let salt = [5u8; SALT_LEN];
        let a = derive_password_key("hunter2", &salt, CURRENT_FORMAT_VERSION).unwrap();
        let b = derive_password_key("hunter2", &salt, CURRENT_FORMAT_VERSION).unwrap();
        assert_eq!(a.material(), b.material());
        assert_eq!(a.material().len(), KEY_LEN);
        assert_eq!(a.origin(), KeyOrigin::PasswordDerived);
    }

    #[test]
    fn different_salt_derives_different_key() {
        let a = derive_password_key("hunter2", &[1u8; SALT_LEN], CURRENT_FORMAT_VERSION).unwrap();
        let b = derive_password_key("hunter2", &[2u8; SALT_LEN], CURRENT_FORMAT_VERSION).unwrap();
        assert_ne!(a.material(), b.material());
    }

    #[test]
    fn empty_password_is_invalid_key() {
        let err = derive_password_key("", &[0u8; SALT_LEN], CURRENT_FORMAT_VERSION).unwrap_err();
        assert_eq!(err, CryptoError::InvalidKey);
    }

    #[test]
    fn short_salt_is_rejected() {
        assert!(derive_password_key("pw", &[0u8; 4], CURRENT_FORMAT_VERSION).is_err());
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}

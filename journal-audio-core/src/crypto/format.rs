//! Versioned format constants.
//!
//! Every value here is frozen per `format_version`. Changing any of them means
//! adding a new version so older artifacts stay decryptable.

use crate::models::error::{CryptoError, CryptoResult};

/// AES-256-GCM key length.
pub const KEY_LEN: usize = 32;
/// GCM nonce length.
pub const IV_LEN: usize = 12;
/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;
/// Password KDF salt length.
pub const SALT_LEN: usize = 16;

pub const FORMAT_VERSION_1: u8 = 1;
pub const CURRENT_FORMAT_VERSION: u8 = FORMAT_VERSION_1;

/// Domain separation prefix mixed into every associated-data block.
pub(crate) const AAD_DOMAIN: &[u8] = b"journal-audio";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// Constants for one format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    pub version: u8,
    pub algorithm: &'static str,
    pub kdf: KdfCost,
}

const V1: FormatSpec = FormatSpec {
    version: FORMAT_VERSION_1,
    algorithm: "AES-256-GCM",
    kdf: KdfCost {
        memory_kib: 19 * 1024,
        iterations: 2,
        parallelism: 1,
    },
};

pub fn format_spec(version: u8) -> CryptoResult<&'static FormatSpec> {
    match version {
        FORMAT_VERSION_1 => Ok(&V1),
        other => Err(CryptoError::UnsupportedFormat(other)),
    }
}

/// `domain || version || len(key id) || key id || context`.
pub(crate) fn associated_data(version: u8, key_identifier: &str, context: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(AAD_DOMAIN.len() + 3 + key_identifier.len() + context.len());
    aad.extend_from_slice(AAD_DOMAIN);
    aad.push(version);
    aad.extend_from_slice(&(key_identifier.len() as u16).to_be_bytes());
    aad.extend_from_slice(key_identifier.as_bytes());
    aad.extend_from_slice(context);
    aad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_version_is_known() {
        let spec = format_spec(CURRENT_FORMAT_VERSION).unwrap();
        assert_eq!(spec.algorithm, "AES-256-GCM");
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert_eq!(format_spec(9), Err(CryptoError::UnsupportedFormat(9)));
    }

    #[test]
    fn associated_data_separates_identifier_from_context() {
        let a = associated_data(1, "ab", b"c");
        let b = associated_data(1, "a", b"bc");
        assert_ne!(a, b);
    }
}

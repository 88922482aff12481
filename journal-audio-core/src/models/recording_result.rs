use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{CryptoError, CryptoResult};
use crate::crypto::encoding;
use crate::crypto::format::IV_LEN;

/// Result returned when a recording session completes and its artifact is sealed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub sealed_path: PathBuf,
    pub duration: Duration,
    pub metadata: AudioMetadata,
}

/// Metadata travelling alongside a sealed recording.
///
/// `iv`, `key_identifier` and `format_version` are not secret; the record may
/// travel in the clear next to the sealed file. `checksum` is the SHA-256 of
/// the plaintext audio, computed before sealing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub journal_id: String,
    pub file_format: String,
    pub sample_rate: u32,
    /// Bits per second of the uncompressed capture.
    pub bit_rate: u32,
    pub channels: u16,
    pub duration_ms: u64,
    pub checksum: String,
    pub key_identifier: String,
    /// Base64 of the sealed file's base IV.
    pub iv: String,
    pub format_version: u8,
    pub sealed_size: u64,
    pub created_at: String,
}

impl AudioMetadata {
    pub fn iv_bytes(&self) -> CryptoResult<[u8; IV_LEN]> {
        let bytes = encoding::decode_base64(&self.iv)?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| CryptoError::Encoding(format!("metadata iv is {} bytes, expected {}", b.len(), IV_LEN)))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(iv: String) -> AudioMetadata {
        AudioMetadata {
            journal_id: "j-1".into(),
            file_format: "wav".into(),
            sample_rate: 48000,
            bit_rate: 768_000,
            channels: 1,
            duration_ms: 1500,
            checksum: "ab".repeat(32),
            key_identifier: "journal.j-1".into(),
            iv,
            format_version: 1,
            sealed_size: 1024,
            created_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn iv_decodes_from_base64() {
        let iv = [3u8; IV_LEN];
        let meta = metadata(encoding::encode_base64(&iv));
        assert_eq!(meta.iv_bytes().unwrap(), iv);
        assert_eq!(meta.duration(), Duration::from_millis(1500));
    }

    #[test]
    fn iv_with_wrong_length_is_rejected() {
        let meta = metadata(encoding::encode_base64(&[1u8; 4]));
        assert!(matches!(meta.iv_bytes(), Err(CryptoError::Encoding(_))));
    }
}

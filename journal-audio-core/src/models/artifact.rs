use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{CryptoError, CryptoResult};
use super::recording_result::AudioMetadata;
use crate::crypto::encoding::{self, base64_bytes};
use crate::crypto::format::{IV_LEN, TAG_LEN};

/// Authenticated ciphertext plus everything needed to open it except the key.
///
/// Immutable once created: updating content means sealing a new artifact.
///
/// Combined wire form (see [`SealedArtifact::to_combined`]):
/// ```text
/// [12-byte IV] [ciphertext] [16-byte GCM authentication tag]
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedArtifact {
    #[serde(with = "base64_bytes")]
    ciphertext: Vec<u8>,
    #[serde(with = "base64_bytes")]
    iv: [u8; IV_LEN],
    #[serde(with = "base64_bytes")]
    tag: [u8; TAG_LEN],
    key_identifier: String,
    format_version: u8,
}

impl SealedArtifact {
    /// Reassemble an artifact from parts received from a storage or sync
    /// collaborator. Nothing is trusted until the tag verifies on decrypt.
    pub fn from_parts(
        ciphertext: Vec<u8>,
        iv: [u8; IV_LEN],
        tag: [u8; TAG_LEN],
        key_identifier: impl Into<String>,
        format_version: u8,
    ) -> Self {
        Self {
            ciphertext,
            iv,
            tag,
            key_identifier: key_identifier.into(),
            format_version,
        }
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn tag(&self) -> &[u8; TAG_LEN] {
        &self.tag
    }

    pub fn key_identifier(&self) -> &str {
        &self.key_identifier
    }

    pub fn format_version(&self) -> u8 {
        self.format_version
    }

    /// `iv || ciphertext || tag`.
    pub fn to_combined(&self) -> Vec<u8> {
        let mut combined = Vec::with_capacity(IV_LEN + self.ciphertext.len() + TAG_LEN);
        combined.extend_from_slice(&self.iv);
        combined.extend_from_slice(&self.ciphertext);
        combined.extend_from_slice(&self.tag);
        combined
    }

    pub fn from_combined(combined: &[u8], key_identifier: impl Into<String>, format_version: u8) -> CryptoResult<Self> {
        if combined.len() < IV_LEN + TAG_LEN {
            return Err(CryptoError::Encoding(format!(
                "combined artifact is {} bytes, need at least {}",
                combined.len(),
                IV_LEN + TAG_LEN
            )));
        }
        let (iv, rest) = combined.split_at(IV_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

        let mut iv_bytes = [0u8; IV_LEN];
        iv_bytes.copy_from_slice(iv);
        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag);

        Ok(Self::from_parts(ciphertext.to_vec(), iv_bytes, tag_bytes, key_identifier, format_version))
    }

    /// Base64 of the combined form.
    pub fn to_base64(&self) -> String {
        encoding::encode_base64(&self.to_combined())
    }

    pub fn from_base64(encoded: &str, key_identifier: impl Into<String>, format_version: u8) -> CryptoResult<Self> {
        let combined = encoding::decode_base64(encoded)?;
        Self::from_combined(&combined, key_identifier, format_version)
    }
}

// Ciphertext is not secret, but dumping it into logs is noise.
impl std::fmt::Debug for SealedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedArtifact")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("key_identifier", &self.key_identifier)
            .field("format_version", &self.format_version)
            .finish_non_exhaustive()
    }
}

/// Summary of a streaming seal of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedFileInfo {
    pub path: PathBuf,
    pub key_identifier: String,
    pub iv: [u8; IV_LEN],
    pub format_version: u8,
    pub plaintext_len: u64,
    pub sealed_len: u64,
    /// SHA-256 hex of the plaintext.
    pub checksum: String,
}

/// Summary of a streaming open of a sealed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedFileInfo {
    pub path: PathBuf,
    pub plaintext_len: u64,
    pub checksum: String,
}

/// Reference to a sealed audio file handed to the playback controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedAudioRef {
    pub path: PathBuf,
    pub journal_id: String,
    /// Expected base IV of the file. Checked against the file header.
    pub iv: Option<[u8; IV_LEN]>,
    /// Expected plaintext checksum, verified after decryption when present.
    pub checksum: Option<String>,
}

impl SealedAudioRef {
    pub fn new(path: impl Into<PathBuf>, journal_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            journal_id: journal_id.into(),
            iv: None,
            checksum: None,
        }
    }

    pub fn with_iv(mut self, iv: [u8; IV_LEN]) -> Self {
        self.iv = Some(iv);
        self
    }

    /// Build a reference carrying every check the metadata record allows.
    pub fn from_metadata(path: &Path, metadata: &AudioMetadata) -> CryptoResult<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            journal_id: metadata.journal_id.clone(),
            iv: Some(metadata.iv_bytes()?),
            checksum: Some(metadata.checksum.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SealedArtifact {
        SealedArtifact::from_parts(vec![1, 2, 3, 4], [7u8; IV_LEN], [9u8; TAG_LEN], "journal.abc", 1)
    }

    #[test]
    fn combined_layout() {
        let combined = sample().to_combined();
        assert_eq!(combined.len(), IV_LEN + 4 + TAG_LEN);
        assert_eq!(&combined[..IV_LEN], &[7u8; IV_LEN]);
        assert_eq!(&combined[IV_LEN..IV_LEN + 4], &[1, 2, 3, 4]);
        assert_eq!(&combined[IV_LEN + 4..], &[9u8; TAG_LEN]);
    }

    #[test]
    fn combined_parse_restores_parts() {
        let artifact = sample();
        let parsed = SealedArtifact::from_combined(&artifact.to_combined(), "journal.abc", 1).unwrap();
        assert_eq!(parsed, artifact);
    }

    #[test]
    fn combined_too_short_is_rejected() {
        let err = SealedArtifact::from_combined(&[0u8; 10], "k", 1).unwrap_err();
        assert!(matches!(err, CryptoError::Encoding(_)));
    }

    #[test]
    fn json_uses_base64_fields() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["ciphertext"], "AQIDBA==");
        assert_eq!(json["key_identifier"], "journal.abc");
        assert_eq!(json["format_version"], 1);
        let back: SealedArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn json_with_wrong_iv_length_fails() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["iv"] = serde_json::Value::String("AAAA".into());
        assert!(serde_json::from_value::<SealedArtifact>(json).is_err());
    }

    #[test]
    fn debug_omits_ciphertext() {
        let rendered = format!("{:?}", sample());
        assert!(rendered.contains("ciphertext_len: 4"));
        assert!(!rendered.contains("[1, 2, 3, 4]"));
    }
}

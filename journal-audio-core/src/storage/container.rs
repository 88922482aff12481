use serde::{Deserialize, Serialize};

use crate::crypto::encoding::base64_bytes;
use crate::crypto::format::{format_spec, IV_LEN, SALT_LEN, TAG_LEN};
use crate::models::artifact::SealedArtifact;
use crate::models::error::{StorageError, StorageResult};

/// Format marker of a value persisted by `SecureStorage`.
pub const CONTAINER_FORMAT: &str = "journal-audio.secure";

/// Format marker of a password-protected export.
pub const EXPORT_FORMAT: &str = "journal-audio.export";

pub const EXPORT_VERSION: u8 = 1;

/// Versioned envelope handed to the value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureContainer {
    pub format: String,
    pub version: u8,
    /// RFC 3339 time of sealing.
    pub timestamp: String,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub iv: [u8; IV_LEN],
    #[serde(with = "base64_bytes")]
    pub tag: [u8; TAG_LEN],
    pub key_identifier: String,
}

impl SecureContainer {
    pub fn seal(artifact: SealedArtifact) -> Self {
        Self {
            format: CONTAINER_FORMAT.into(),
            version: artifact.format_version(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            ciphertext: artifact.ciphertext().to_vec(),
            iv: *artifact.iv(),
            tag: *artifact.tag(),
            key_identifier: artifact.key_identifier().to_string(),
        }
    }

    pub fn artifact(&self) -> SealedArtifact {
        SealedArtifact::from_parts(self.ciphertext.clone(), self.iv, self.tag, self.key_identifier.clone(), self.version)
    }

    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StorageError::Backend(format!("failed to encode container: {e}")))
    }

    /// Parse and check the marker and version before anything is decrypted.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        let container: Self =
            serde_json::from_slice(bytes).map_err(|e| StorageError::Corrupt(format!("unreadable container: {e}")))?;
        if container.format != CONTAINER_FORMAT {
            return Err(StorageError::UnrecognizedFormat(container.format));
        }
        format_spec(container.version)?;
        Ok(container)
    }
}

/// Cleartext carried inside an export: the value and the key it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ExportPayload {
    pub key: String,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    pub exported_at: String,
}

/// Portable password-protected export of one stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPackage {
    pub format: String,
    pub version: u8,
    #[serde(with = "base64_bytes")]
    pub salt: [u8; SALT_LEN],
    pub sealed: SealedArtifact,
}

impl ExportPackage {
    pub fn new(salt: [u8; SALT_LEN], sealed: SealedArtifact) -> Self {
        Self {
            format: EXPORT_FORMAT.into(),
            version: EXPORT_VERSION,
            salt,
            sealed,
        }
    }

    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| StorageError::Backend(format!("failed to encode export: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        #[derive(Deserialize)]
        struct Marker {
            format: Option<String>,
            version: Option<u8>,
        }

        // Check the marker first so foreign documents are reported as such.
        let marker: Marker =
            serde_json::from_slice(bytes).map_err(|e| StorageError::UnrecognizedFormat(format!("not an export package: {e}")))?;
        match (marker.format.as_deref(), marker.version) {
            (Some(EXPORT_FORMAT), Some(EXPORT_VERSION)) => {}
            (Some(EXPORT_FORMAT), Some(v)) => {
                return Err(StorageError::UnrecognizedFormat(format!("unsupported export version {v}")))
            }
            (format, _) => return Err(StorageError::UnrecognizedFormat(format.unwrap_or("<missing>").to_string())),
        }
        serde_json::from_slice(bytes).map_err(|e| StorageError::Corrupt(format!("malformed export package: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> SealedArtifact {
        SealedArtifact::from_parts(vec![1, 2, 3, 4], [7u8; IV_LEN], [9u8; TAG_LEN], "journal-audio.storage.standard", 1)
    }

    #[test]
    fn container_round_trip() {
        let container = SecureContainer::seal(artifact());
        let parsed = SecureContainer::from_bytes(&container.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, container);
        assert_eq!(parsed.artifact(), artifact());
    }

    #[test]
    fn container_with_foreign_marker_is_rejected() {
        let mut container = SecureContainer::seal(artifact());
        container.format = "something-else".into();
        let err = SecureContainer::from_bytes(&container.to_bytes().unwrap()).unwrap_err();
        assert_eq!(err, StorageError::UnrecognizedFormat("something-else".into()));
    }

    #[test]
    fn container_with_unknown_version_is_rejected() {
        let mut container = SecureContainer::seal(artifact());
        container.version = 9;
        let err = SecureContainer::from_bytes(&container.to_bytes().unwrap()).unwrap_err();
        assert!(matches!(err, StorageError::Crypto(_)));
    }

    #[test]
    fn garbage_container_is_corrupt() {
        assert!(matches!(SecureContainer::from_bytes(b"\x00\x01"), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn export_package_json_shape() {
        let package = ExportPackage::new([4u8; SALT_LEN], artifact());
        let value: serde_json::Value = serde_json::from_slice(&package.to_bytes().unwrap()).unwrap();
        assert_eq!(value["format"], EXPORT_FORMAT);
        assert_eq!(value["version"], 1);
        assert!(value["salt"].is_string());
        assert!(value["sealed"].is_object());
    }

    #[test]
    fn export_package_round_trip() {
        let package = ExportPackage::new([4u8; SALT_LEN], artifact());
        assert_eq!(ExportPackage::from_bytes(&package.to_bytes().unwrap()).unwrap(), package);
    }

    #[test]
    fn export_with_unknown_marker_is_rejected() {
        let doc = br#"{"format":"other.app","version":1,"salt":"AAAA","sealed":{}}"#;
        assert_eq!(
            ExportPackage::from_bytes(doc).unwrap_err(),
            StorageError::UnrecognizedFormat("other.app".into())
        );
        assert!(matches!(ExportPackage::from_bytes(b"not json"), Err(StorageError::UnrecognizedFormat(_))));
    }

    #[test]
    fn export_with_future_version_is_rejected() {
        let mut package = ExportPackage::new([4u8; SALT_LEN], artifact());
        package.version = 2;
        assert!(matches!(
            ExportPackage::from_bytes(&package.to_bytes().unwrap()),
            Err(StorageError::UnrecognizedFormat(_))
        ));
    }
}

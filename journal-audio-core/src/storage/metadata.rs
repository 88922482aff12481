use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::encoding;
use crate::models::artifact::SealedFileInfo;
use crate::models::audio_models::AudioFormat;
use crate::models::error::{CryptoError, CryptoResult};
use crate::models::recording_result::AudioMetadata;

/// Sidecar location for a sealed recording: `{sealed}.metadata.json`.
pub fn metadata_path(sealed_path: &Path) -> PathBuf {
    let mut name = sealed_path.as_os_str().to_os_string();
    name.push(".metadata.json");
    PathBuf::from(name)
}

/// Build the metadata record for a freshly sealed recording.
///
/// `data_len` is the PCM payload length, used for the duration.
pub fn create_audio_metadata(journal_id: &str, format: &AudioFormat, data_len: u64, sealed: &SealedFileInfo) -> AudioMetadata {
    AudioMetadata {
        journal_id: journal_id.to_string(),
        file_format: "wav".into(),
        sample_rate: format.sample_rate,
        bit_rate: format.bit_rate(),
        channels: format.channels,
        duration_ms: format.duration_ms(data_len),
        checksum: sealed.checksum.clone(),
        key_identifier: sealed.key_identifier.clone(),
        iv: encoding::encode_base64(&sealed.iv),
        format_version: sealed.format_version,
        sealed_size: sealed.sealed_len,
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Write recording metadata as a JSON sidecar next to the sealed file.
pub fn write_metadata(metadata: &AudioMetadata, sealed_path: &Path) -> CryptoResult<PathBuf> {
    let path = metadata_path(sealed_path);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CryptoError::Encoding(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&path, json).map_err(|e| CryptoError::io("failed to write metadata", e))?;
    Ok(path)
}

/// Read the JSON sidecar of a sealed recording.
pub fn read_metadata(sealed_path: &Path) -> CryptoResult<AudioMetadata> {
    let json = fs::read_to_string(metadata_path(sealed_path)).map_err(|e| CryptoError::io("failed to read metadata", e))?;
    serde_json::from_str(&json).map_err(|e| CryptoError::Encoding(format!("failed to parse metadata: {}", e)))
}

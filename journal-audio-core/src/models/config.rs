use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::AudioFormat;
use super::error::ConfigError;
use crate::traits::value_store::AccessibilityPolicy;

/// Smallest and largest plaintext chunk accepted by the streaming file format.
pub const MIN_CHUNK_SIZE: usize = 1024;
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for a recording controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfiguration {
    /// Directory where raw captures and sealed artifacts are written.
    pub output_directory: PathBuf,

    /// Capture sample rate in Hz (default: 48000).
    pub sample_rate: u32,

    /// Bit depth for PCM capture (default: 16). Valid values: 16, 24, 32.
    pub bit_depth: u16,

    /// Number of capture channels (default: 1).
    pub channels: u16,

    /// Amplitude/duration sampling interval while recording.
    pub amplitude_interval_ms: u64,

    /// Write `{sealed}.metadata.json` next to each sealed recording.
    pub write_metadata_sidecar: bool,
}

impl RecordingConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![16, 24, 32].contains(&self.bit_depth) {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.amplitude_interval_ms == 0 {
            return Err("amplitude interval must be positive".into());
        }
        Ok(())
    }

    pub fn amplitude_interval(&self) -> Duration {
        Duration::from_millis(self.amplitude_interval_ms)
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            bit_depth: self.bit_depth,
            channels: self.channels,
        }
    }
}

impl Default for RecordingConfiguration {
    fn default() -> Self {
        Self {
            output_directory: std::env::temp_dir().join("journal-audio").join("recordings"),
            sample_rate: 48000,
            bit_depth: 16,
            channels: 1,
            amplitude_interval_ms: 100,
            write_metadata_sidecar: true,
        }
    }
}

/// Configuration for a playback controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfiguration {
    /// Directory that holds transient plaintext while a session is alive.
    pub transient_directory: PathBuf,

    /// Progress reporting interval while playing.
    pub progress_interval_ms: u64,
}

impl PlaybackConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.progress_interval_ms == 0 {
            return Err("progress interval must be positive".into());
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for PlaybackConfiguration {
    fn default() -> Self {
        Self {
            transient_directory: std::env::temp_dir().join("journal-audio").join("playback"),
            progress_interval_ms: 100,
        }
    }
}

/// Streaming encryption parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfiguration {
    /// Plaintext bytes sealed per frame of an encrypted file.
    pub chunk_size: usize,
}

impl EncryptionConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(format!(
                "chunk size {} outside {}..={}",
                self.chunk_size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            ));
        }
        Ok(())
    }
}

impl Default for EncryptionConfiguration {
    fn default() -> Self {
        Self { chunk_size: 64 * 1024 }
    }
}

/// Secure storage parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfiguration {
    /// Accessibility policy handed to the value store for every write.
    pub accessibility: AccessibilityPolicy,

    /// Prefix applied to every persisted key.
    pub namespace: String,
}

impl StorageConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.namespace.is_empty() {
            return Err("storage namespace must not be empty".into());
        }
        Ok(())
    }
}

impl Default for StorageConfiguration {
    fn default() -> Self {
        Self {
            accessibility: AccessibilityPolicy::WhenUnlockedThisDeviceOnly,
            namespace: "journal-audio".into(),
        }
    }
}

/// Top-level configuration for the journal audio services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalAudioConfig {
    pub recording: RecordingConfiguration,
    pub playback: PlaybackConfiguration,
    pub encryption: EncryptionConfiguration,
    pub storage: StorageConfiguration,
}

impl JournalAudioConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.recording.validate().map_err(ConfigError::Invalid)?;
        self.playback.validate().map_err(ConfigError::Invalid)?;
        self.encryption.validate().map_err(ConfigError::Invalid)?;
        self.storage.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }

    /// Places recordings and transient playback files under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        let mut config = Self::default();
        config.recording.output_directory = root.join("recordings");
        config.playback.transient_directory = root.join("playback");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(JournalAudioConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        let config = RecordingConfiguration {
            bit_depth: 12,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err("unsupported bit depth: 12".to_string()));
    }

    #[test]
    fn rejects_tiny_chunk_size() {
        let config = EncryptionConfiguration { chunk_size: 16 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = JournalAudioConfig::from_json_str(
            r#"{ "recording": { "sample_rate": 16000 }, "playback": { "progress_interval_ms": 50 } }"#,
        )
        .unwrap();
        assert_eq!(config.recording.sample_rate, 16000);
        assert_eq!(config.recording.bit_depth, 16);
        assert_eq!(config.playback.progress_interval(), Duration::from_millis(50));
        assert_eq!(config.encryption.chunk_size, 64 * 1024);
    }

    #[test]
    fn invalid_json_values_are_rejected() {
        let err = JournalAudioConfig::from_json_str(r#"{ "recording": { "channels": 6 } }"#).unwrap_err();
        assert_eq!(err, ConfigError::Invalid("unsupported channel count: 6".into()));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = JournalAudioConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rooted_config_places_directories() {
        let root = Path::new("/tmp/journal-root");
        let config = JournalAudioConfig::rooted_at(root);
        assert_eq!(config.recording.output_directory, root.join("recordings"));
        assert_eq!(config.playback.transient_directory, root.join("playback"));
    }
}

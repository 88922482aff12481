use std::path::Path;
use std::sync::Arc;

use crate::crypto::engine::EncryptionEngine;
use crate::models::artifact::SealedAudioRef;
use crate::models::config::JournalAudioConfig;
use crate::models::error::{ConfigError, CryptoError, CryptoResult};
use crate::platform::memory::{MemoryKeyStore, MemoryValueStore};
use crate::session::playback::PlaybackController;
use crate::session::recording::RecordingController;
use crate::storage::metadata;
use crate::storage::secure_storage::SecureStorage;
use crate::storage::transient::secure_delete;
use crate::traits::capture_device::CaptureDevice;
use crate::traits::key_store::KeyStore;
use crate::traits::playback_device::PlaybackDevice;
use crate::traits::value_store::ValueStore;

/// Process-wide services, built once and shared by reference.
///
/// Owns the key store, the encryption engine and secure storage, and builds
/// controllers wired to them.
pub struct JournalAudioServices {
    config: JournalAudioConfig,
    key_store: Arc<dyn KeyStore>,
    engine: Arc<EncryptionEngine>,
    storage: Arc<SecureStorage>,
}

impl JournalAudioServices {
    pub fn new(
        config: JournalAudioConfig,
        key_store: Arc<dyn KeyStore>,
        value_store: Arc<dyn ValueStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let engine = Arc::new(EncryptionEngine::new(Arc::clone(&key_store), config.encryption.clone())?);
        let storage = Arc::new(SecureStorage::new(
            Arc::clone(&engine),
            value_store,
            config.storage.clone(),
        ));
        log::info!(
            "journal audio services ready (recordings in {})",
            config.recording.output_directory.display()
        );
        Ok(Self {
            config,
            key_store,
            engine,
            storage,
        })
    }

    /// Services backed by process-local key and value stores.
    pub fn in_memory(config: JournalAudioConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(MemoryKeyStore::new()), Arc::new(MemoryValueStore::new()))
    }

    pub fn config(&self) -> &JournalAudioConfig {
        &self.config
    }

    pub fn key_store(&self) -> &Arc<dyn KeyStore> {
        &self.key_store
    }

    pub fn engine(&self) -> &Arc<EncryptionEngine> {
        &self.engine
    }

    pub fn storage(&self) -> &Arc<SecureStorage> {
        &self.storage
    }

    pub fn recording_controller<D: CaptureDevice + 'static>(&self, device: D) -> Result<RecordingController<D>, ConfigError> {
        RecordingController::new(device, Arc::clone(&self.engine), self.config.recording.clone())
    }

    pub fn playback_controller<D: PlaybackDevice + 'static>(&self, device: D) -> Result<PlaybackController<D>, ConfigError> {
        PlaybackController::new(device, Arc::clone(&self.engine), self.config.playback.clone())
    }

    /// Playback reference for a sealed recording, checked against its sidecar.
    pub fn sealed_audio_ref(&self, sealed_path: &Path) -> CryptoResult<SealedAudioRef> {
        let metadata = metadata::read_metadata(sealed_path)?;
        SealedAudioRef::from_metadata(sealed_path, &metadata)
    }

    /// Remove a recording for good: the sealed file, its sidecar and the
    /// journal key. Other copies of the sealed file become unreadable.
    pub fn delete_recording(&self, sealed_path: &Path, journal_id: &str) -> CryptoResult<()> {
        for path in [sealed_path.to_path_buf(), metadata::metadata_path(sealed_path)] {
            secure_delete(&path).map_err(|e| CryptoError::io(&format!("failed to delete {}", path.display()), e))?;
        }
        self.engine.delete_journal_key(journal_id)?;
        log::info!("deleted recording {} for journal {}", sealed_path.display(), journal_id);
        Ok(())
    }
}

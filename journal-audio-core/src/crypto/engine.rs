use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce, Tag};

use super::encoding;
use super::format::{associated_data, format_spec, CURRENT_FORMAT_VERSION, IV_LEN, KEY_LEN, SALT_LEN, TAG_LEN};
use super::kdf::{derive_password_key, generate_salt, PASSWORD_KEY_IDENTIFIER};
use super::stream::{decrypt_stream, encrypt_stream, StreamHeader};
use crate::models::artifact::{OpenedFileInfo, SealedArtifact, SealedFileInfo};
use crate::models::config::EncryptionConfiguration;
use crate::models::error::{ConfigError, CryptoError, CryptoResult};
use crate::storage::locks::KeyedLocks;
use crate::storage::transient::secure_delete;
use crate::traits::key_store::{KeyAccess, KeyStore, SymmetricKey};

/// Key store identifier of the dedicated key for `journal_id`.
pub fn journal_key_identifier(journal_id: &str) -> String {
    format!("journal-audio.journal.{journal_id}")
}

/// Authenticated encryption of payloads and files.
///
/// One instance per process, owned by the composition root and shared via `Arc`.
/// Streaming operations on the same target file are serialized.
pub struct EncryptionEngine {
    key_store: Arc<dyn KeyStore>,
    config: EncryptionConfiguration,
    file_locks: KeyedLocks,
}

impl EncryptionEngine {
    pub fn new(key_store: Arc<dyn KeyStore>, config: EncryptionConfiguration) -> Result<Self, ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(Self {
            key_store,
            config,
            file_locks: KeyedLocks::new(),
        })
    }

    pub fn key_store(&self) -> &Arc<dyn KeyStore> {
        &self.key_store
    }

    /// Seal `plaintext` under `key` with a fresh random IV.
    pub fn encrypt(&self, plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<SealedArtifact> {
        self.seal(plaintext, key, &[])
    }

    /// Verify and open an artifact. No byte is released unless the tag verifies.
    pub fn decrypt(&self, artifact: &SealedArtifact, key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
        self.open(artifact, key, &[])
    }

    /// Seal with extra caller context bound into the associated data.
    pub(crate) fn seal(&self, plaintext: &[u8], key: &SymmetricKey, context: &[u8]) -> CryptoResult<SealedArtifact> {
        let spec = format_spec(CURRENT_FORMAT_VERSION)?;
        let cipher = cipher_for(key)?;
        let aad = associated_data(spec.version, key.identifier(), context);

        // Fresh IV per call; never derived from the plaintext or a counter.
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(&nonce, &aad, &mut buffer)
            .map_err(|_| CryptoError::Encoding("AES-GCM encryption failed".into()))?;

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&nonce);
        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(&tag);

        Ok(SealedArtifact::from_parts(buffer, iv, tag_bytes, key.identifier(), spec.version))
    }

    pub(crate) fn open(&self, artifact: &SealedArtifact, key: &SymmetricKey, context: &[u8]) -> CryptoResult<Vec<u8>> {
        format_spec(artifact.format_version())?;
        let cipher = cipher_for(key)?;
        let aad = associated_data(artifact.format_version(), artifact.key_identifier(), context);

        let mut buffer = artifact.ciphertext().to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(artifact.iv()),
                &aad,
                &mut buffer,
                Tag::from_slice(artifact.tag()),
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(buffer)
    }

    /// Seal under the dedicated key of `journal_id`, creating it if needed.
    pub fn encrypt_journal(&self, plaintext: &[u8], journal_id: &str) -> CryptoResult<SealedArtifact> {
        let key = self.journal_key(journal_id, true)?;
        self.encrypt(plaintext, &key)
    }

    pub fn decrypt_journal(&self, artifact: &SealedArtifact, journal_id: &str) -> CryptoResult<Vec<u8>> {
        let key = self.journal_key(journal_id, false)?;
        self.decrypt(artifact, &key)
    }

    /// Resolve the key for a journal entry. Opening never creates keys.
    pub fn journal_key(&self, journal_id: &str, create: bool) -> CryptoResult<SymmetricKey> {
        if journal_id.trim().is_empty() {
            return Err(CryptoError::InvalidKey);
        }
        let id = journal_key_identifier(journal_id);
        let key = if create {
            self.key_store.get_or_create_key(&id, KeyAccess::Always)?
        } else {
            self.key_store.get_key(&id, KeyAccess::Always)?
        };
        Ok(key)
    }

    /// Destroy a journal's key, rendering all of its artifacts unreadable.
    pub fn delete_journal_key(&self, journal_id: &str) -> CryptoResult<()> {
        if journal_id.trim().is_empty() {
            return Err(CryptoError::InvalidKey);
        }
        self.key_store.delete_key(&journal_key_identifier(journal_id))?;
        log::info!("deleted key for journal {}", journal_id);
        Ok(())
    }

    /// Seal under a key derived from `password` with a fresh salt.
    pub fn encrypt_with_password(&self, plaintext: &[u8], password: &str) -> CryptoResult<(SealedArtifact, [u8; SALT_LEN])> {
        let salt = generate_salt();
        let key = derive_password_key(password, &salt, CURRENT_FORMAT_VERSION)?;
        let artifact = self.encrypt(plaintext, &key)?;
        Ok((artifact, salt))
    }

    pub fn decrypt_with_password(&self, artifact: &SealedArtifact, password: &str, salt: &[u8]) -> CryptoResult<Vec<u8>> {
        if artifact.key_identifier() != PASSWORD_KEY_IDENTIFIER {
            return Err(CryptoError::InvalidKey);
        }
        let key = derive_password_key(password, salt, artifact.format_version())?;
        self.decrypt(artifact, &key)
    }

    /// Base64 of the combined `iv || ciphertext || tag` form.
    pub fn encrypt_to_base64(&self, plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<String> {
        Ok(self.encrypt(plaintext, key)?.to_base64())
    }

    pub fn decrypt_from_base64(&self, encoded: &str, key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
        let artifact = SealedArtifact::from_base64(encoded, key.identifier(), CURRENT_FORMAT_VERSION)?;
        self.decrypt(&artifact, key)
    }

    pub fn encode_base64(&self, bytes: &[u8]) -> String {
        encoding::encode_base64(bytes)
    }

    pub fn decode_base64(&self, encoded: &str) -> CryptoResult<Vec<u8>> {
        encoding::decode_base64(encoded)
    }

    /// Stream-seal `input` into a new file at `output`.
    ///
    /// `output` must not exist; sealed artifacts are never edited in place.
    /// Any partially written output is removed on failure.
    pub fn encrypt_file(&self, input: &Path, output: &Path, key: &SymmetricKey) -> CryptoResult<SealedFileInfo> {
        let lock = self.file_locks.handle(&file_lock_name(output));
        let _guard = lock.lock();

        let cipher = cipher_for(key)?;
        let header = StreamHeader::new(CURRENT_FORMAT_VERSION, self.config.chunk_size, key.identifier())?;

        let source = File::open(input).map_err(|e| CryptoError::io(&format!("failed to open {}", input.display()), e))?;
        let target = create_output(output)?;

        let result = (|| {
            let mut reader = BufReader::new(source);
            let mut writer = BufWriter::new(target);
            let summary = encrypt_stream(&cipher, &header, &mut reader, &mut writer)?;
            let file = writer
                .into_inner()
                .map_err(|e| CryptoError::io("failed to flush sealed file", e.into_error()))?;
            file.sync_all().map_err(|e| CryptoError::io("failed to sync sealed file", e))?;
            Ok(summary)
        })();

        match result {
            Ok(summary) => {
                log::debug!(
                    "sealed {} -> {} ({} bytes plaintext)",
                    input.display(),
                    output.display(),
                    summary.plaintext_len
                );
                Ok(SealedFileInfo {
                    path: output.to_path_buf(),
                    key_identifier: key.identifier().to_string(),
                    iv: header.iv,
                    format_version: header.version,
                    plaintext_len: summary.plaintext_len,
                    sealed_len: summary.sealed_len,
                    checksum: summary.checksum,
                })
            }
            Err(e) => {
                discard_partial(output);
                Err(e)
            }
        }
    }

    /// Stream-open a sealed file into a new plaintext file at `output`.
    ///
    /// On any failure the partial plaintext is securely deleted before the
    /// error is returned.
    pub fn decrypt_file(&self, input: &Path, output: &Path, key: &SymmetricKey) -> CryptoResult<OpenedFileInfo> {
        let lock = self.file_locks.handle(&file_lock_name(output));
        let _guard = lock.lock();

        let cipher = cipher_for(key)?;
        let source = File::open(input).map_err(|e| CryptoError::io(&format!("failed to open {}", input.display()), e))?;
        let mut reader = BufReader::new(source);
        let header = StreamHeader::read_from(&mut reader)?;
        if header.key_identifier != key.identifier() {
            return Err(CryptoError::InvalidKey);
        }

        let target = create_output(output)?;
        let result = (|| {
            let mut writer = BufWriter::new(target);
            let summary = decrypt_stream(&cipher, &header, &mut reader, &mut writer)?;
            writer
                .flush()
                .map_err(|e| CryptoError::io("failed to flush plaintext", e))?;
            Ok(summary)
        })();

        match result {
            Ok(summary) => Ok(OpenedFileInfo {
                path: output.to_path_buf(),
                plaintext_len: summary.plaintext_len,
                checksum: summary.checksum,
            }),
            Err(e) => {
                discard_partial(output);
                Err(e)
            }
        }
    }

    /// Read the header of a sealed file without opening any frame.
    pub fn read_file_header(&self, input: &Path) -> CryptoResult<StreamHeader> {
        let source = File::open(input).map_err(|e| CryptoError::io(&format!("failed to open {}", input.display()), e))?;
        StreamHeader::read_from(&mut BufReader::new(source))
    }

    pub fn encrypt_journal_file(&self, input: &Path, output: &Path, journal_id: &str) -> CryptoResult<SealedFileInfo> {
        let key = self.journal_key(journal_id, true)?;
        self.encrypt_file(input, output, &key)
    }

    pub fn decrypt_journal_file(&self, input: &Path, output: &Path, journal_id: &str) -> CryptoResult<OpenedFileInfo> {
        let key = self.journal_key(journal_id, false)?;
        self.decrypt_file(input, output, &key)
    }

    /// Run [`encrypt_file`](Self::encrypt_file) on a worker thread.
    pub fn spawn_encrypt_file(self: &Arc<Self>, input: PathBuf, output: PathBuf, key: SymmetricKey) -> CryptoResult<FileJob<SealedFileInfo>> {
        let engine = Arc::clone(self);
        FileJob::spawn("journal-seal", move || engine.encrypt_file(&input, &output, &key))
    }

    /// Run [`decrypt_file`](Self::decrypt_file) on a worker thread.
    pub fn spawn_decrypt_file(self: &Arc<Self>, input: PathBuf, output: PathBuf, key: SymmetricKey) -> CryptoResult<FileJob<OpenedFileInfo>> {
        let engine = Arc::clone(self);
        FileJob::spawn("journal-open", move || engine.decrypt_file(&input, &output, &key))
    }
}

/// Handle to a streaming operation running on its own thread.
pub struct FileJob<T> {
    receiver: Receiver<CryptoResult<T>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> FileJob<T> {
    fn spawn<F>(name: &str, work: F) -> CryptoResult<Self>
    where
        F: FnOnce() -> CryptoResult<T> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let _ = sender.send(work());
            })
            .map_err(|e| CryptoError::FileOperationFailed(format!("failed to spawn worker: {e}")))?;
        Ok(Self {
            receiver,
            handle: Some(handle),
        })
    }

    /// Block until the operation finishes.
    pub fn wait(mut self) -> CryptoResult<T> {
        let result = self
            .receiver
            .recv()
            .unwrap_or_else(|_| Err(CryptoError::FileOperationFailed("worker exited without a result".into())));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        result
    }
}

fn cipher_for(key: &SymmetricKey) -> CryptoResult<Aes256Gcm> {
    if key.material().len() != KEY_LEN {
        return Err(CryptoError::InvalidKey);
    }
    Aes256Gcm::new_from_slice(key.material()).map_err(|_| CryptoError::InvalidKey)
}

fn create_output(path: &Path) -> CryptoResult<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CryptoError::io("failed to create output directory", e))?;
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
        .open(path)
        .map_err(|e| CryptoError::io(&format!("failed to create {}", path.display()), e))
}

/// Lock table key for `path`: the file name under its canonical directory, so
/// relative and absolute spellings of one file share a lock.
fn file_lock_name(path: &Path) -> String {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let dir = fs::canonicalize(parent)
        .or_else(|_| std::path::absolute(parent))
        .unwrap_or_else(|_| parent.to_path_buf());
    match path.file_name() {
        Some(name) => dir.join(name).to_string_lossy().into_owned(),
        None => dir.to_string_lossy().into_owned(),
    }
}

fn discard_partial(path: &Path) {
    if let Err(e) = secure_delete(path) {
        log::warn!("failed to remove partial output {}: {}", path.display(), e);
    }
}

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::crypto::encoding::hex_encode;
use crate::models::error::StorageError;
use crate::traits::value_store::{AccessibilityPolicy, ValueStore};

/// Value store keeping one file per key under a directory.
///
/// File names are the hex of the key, so any key is a valid name. Writes go
/// to a temporary sibling first and are renamed into place. The
/// accessibility policy is recorded in the log only; filesystem permissions
/// are owner-only on unix.
pub struct DirectoryValueStore {
    root: PathBuf,
}

impl DirectoryValueStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| backend("failed to create value directory", e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.val", hex_encode(key.as_bytes())))
    }
}

fn backend(context: &str, err: io::Error) -> StorageError {
    StorageError::Backend(format!("{context}: {err}"))
}

impl ValueStore for DirectoryValueStore {
    fn save(&self, bytes: &[u8], key: &str, policy: AccessibilityPolicy) -> Result<(), StorageError> {
        let target = self.path_for(key);
        let staging = target.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let written = options.open(&staging).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&staging, &target)) {
            let _ = fs::remove_file(&staging);
            return Err(backend("failed to write value", e));
        }
        log::debug!("saved value {} ({:?})", key, policy);
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(backend("failed to read value", e)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(backend("failed to delete value", e)),
        }
    }

    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.path_for(key).is_file())
    }
}

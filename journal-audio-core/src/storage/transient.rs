use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const WIPE_BLOCK: usize = 64 * 1024;

/// Overwrite a file with zeros, sync, then unlink it.
///
/// Returns `Ok(false)` when there was nothing to delete. A failed overwrite is
/// logged and the unlink still happens.
pub fn secure_delete(path: &Path) -> io::Result<bool> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    if metadata.is_file() && metadata.len() > 0 {
        if let Err(e) = overwrite_with_zeros(path, metadata.len()) {
            log::warn!("failed to wipe {} before removal: {}", path.display(), e);
        }
    }

    fs::remove_file(path)?;
    log::debug!("securely deleted {}", path.display());
    Ok(true)
}

fn overwrite_with_zeros(path: &Path, len: u64) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    let zeros = vec![0u8; WIPE_BLOCK];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(WIPE_BLOCK as u64) as usize;
        file.write_all(&zeros[..n])?;
        remaining -= n as u64;
    }
    file.sync_all()
}

/// Unique path `{dir}/{prefix}-{uuid}.{extension}`.
pub fn unique_path(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}-{}.{}", prefix, uuid::Uuid::new_v4(), extension))
}

/// Owner of a file that must not outlive its holder.
///
/// Dropping the guard securely deletes the file.
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
    armed: bool,
}

impl TransientFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete now, reporting the outcome.
    pub fn delete(mut self) -> io::Result<()> {
        self.armed = false;
        secure_delete(&self.path).map(|_| ())
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = secure_delete(&self.path) {
            log::warn!("failed to delete transient file {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.wav");
        fs::write(&path, vec![0x55u8; 200_000]).unwrap();

        assert!(secure_delete(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn secure_delete_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!secure_delete(&dir.path().join("absent")).unwrap());
    }

    #[test]
    fn guard_deletes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transient.wav");
        fs::write(&path, b"pcm").unwrap();
        {
            let _guard = TransientFile::new(path.clone());
        }
        assert!(!path.exists());
    }

    #[test]
    fn explicit_delete_removes_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transient.wav");
        fs::write(&path, b"pcm").unwrap();

        TransientFile::new(path.clone()).delete().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn unique_paths_differ() {
        let dir = Path::new("/tmp");
        let a = unique_path(dir, "playback", "wav");
        let b = unique_path(dir, "playback", "wav");
        assert_ne!(a, b);
        assert_eq!(a.extension().unwrap(), "wav");
    }
}

use journal_audio_core::JournalAudioServices;

pub fn run(services: &JournalAudioServices, key: &str, value: &str, password: &str) -> Result<(), String> {
    let storage = services.storage();
    storage
        .store(value.as_bytes(), key, false)
        .map_err(|e| e.to_string())?;
    log::info!("stored {} ({} bytes)", key, value.len());

    let package = storage.secure_export(key, password).map_err(|e| e.to_string())?;
    println!("{}", String::from_utf8_lossy(&package));

    storage.delete(key).map_err(|e| e.to_string())?;
    let restored_key = storage
        .secure_import(&package, password, false)
        .map_err(|e| e.to_string())?;
    let restored = storage
        .retrieve(&restored_key, false)
        .map_err(|e| e.to_string())?;
    if restored != value.as_bytes() {
        return Err(format!("value under {restored_key} changed across export"));
    }
    log::info!("imported {} from its export package", restored_key);

    // Sealing keys live only as long as this process; leave nothing behind
    // that a later run could not open.
    storage.delete(&restored_key).map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use journal_audio_core::platform::{DirectoryValueStore, MemoryKeyStore};
    use journal_audio_core::JournalAudioConfig;

    fn services(root: &std::path::Path) -> JournalAudioServices {
        let values = DirectoryValueStore::open(root.join("values")).unwrap();
        JournalAudioServices::new(
            JournalAudioConfig::rooted_at(root),
            Arc::new(MemoryKeyStore::new()),
            Arc::new(values),
        )
        .unwrap()
    }

    #[test]
    fn repeated_runs_share_a_root() {
        let dir = tempfile::tempdir().unwrap();

        let first = services(dir.path());
        run(&first, "demo.token", "first secret", "correct horse").unwrap();
        assert!(!first.storage().exists("demo.token").unwrap());

        // A new process brings a new key store but finds the same directory.
        let second = services(dir.path());
        run(&second, "demo.token", "second secret", "correct horse").unwrap();
        assert!(!second.storage().exists("demo.token").unwrap());
    }
}

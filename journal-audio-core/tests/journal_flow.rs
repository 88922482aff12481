use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use journal_audio_core::platform::{ClockPlayback, DirectoryValueStore, MemoryKeyStore, MemoryValueStore, ToneCapture};
use journal_audio_core::storage::metadata::read_metadata;
use journal_audio_core::{
    ChannelPlaybackDelegate, ChannelRecordingDelegate, JournalAudioConfig, JournalAudioServices, PlaybackError,
    PlaybackState, PlaybackUpdate, PresenceOutcome, RecordingState, RecordingUpdate, StorageError, UserPresence,
    ValueStore,
};

fn services(root: &std::path::Path) -> JournalAudioServices {
    let mut config = JournalAudioConfig::rooted_at(root);
    config.playback.progress_interval_ms = 20;
    config.recording.amplitude_interval_ms = 20;
    JournalAudioServices::in_memory(config).unwrap()
}

fn dir_is_empty(path: &std::path::Path) -> bool {
    fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[test]
fn record_seal_play_cleanup() {
    let root = tempfile::tempdir().unwrap();
    let services = services(root.path());

    let mut recorder = services.recording_controller(ToneCapture::default()).unwrap();
    let (delegate, recording_updates) = ChannelRecordingDelegate::new();
    recorder.set_delegate(Arc::new(delegate));

    recorder.start_recording("morning-entry").unwrap();
    thread::sleep(Duration::from_millis(200));
    let result = recorder.stop_recording().unwrap();
    assert_eq!(recorder.state(), RecordingState::Completed);

    let updates: Vec<_> = recording_updates.try_iter().collect();
    assert!(updates.contains(&RecordingUpdate::State(RecordingState::Completed)));
    assert!(updates.iter().any(|u| matches!(u, RecordingUpdate::Amplitude { level, .. } if *level > 0.0)));
    assert!(updates.contains(&RecordingUpdate::Finished(result.clone())));

    let sealed = fs::read(&result.sealed_path).unwrap();
    assert_eq!(&sealed[..4], b"JAEF");
    assert!(!sealed.windows(4).any(|w| w == b"RIFF"));
    assert_eq!(read_metadata(&result.sealed_path).unwrap(), result.metadata);

    let audio = services.sealed_audio_ref(&result.sealed_path).unwrap();
    let mut player = services.playback_controller(ClockPlayback::new()).unwrap();
    let (delegate, playback_updates) = ChannelPlaybackDelegate::new();
    player.set_delegate(Arc::new(delegate));

    let duration = player.prepare_for_playback(&audio).unwrap();
    assert_eq!(duration, Duration::from_millis(result.metadata.duration_ms));
    let transient = player.transient_path().unwrap();
    assert!(transient.starts_with(&services.config().playback.transient_directory));

    player.start().unwrap();
    let completed = playback_updates
        .iter()
        .take_while(|u| *u != PlaybackUpdate::State(PlaybackState::Completed))
        .count();
    assert!(completed > 0);
    assert!(!transient.exists());

    player.cleanup();
    assert_eq!(player.state(), PlaybackState::Idle);
    assert!(dir_is_empty(&services.config().playback.transient_directory));
}

#[test]
fn cancelled_recording_leaves_nothing_behind() {
    let root = tempfile::tempdir().unwrap();
    let services = services(root.path());
    let mut recorder = services.recording_controller(ToneCapture::default()).unwrap();

    recorder.start_recording("evening-entry").unwrap();
    thread::sleep(Duration::from_millis(80));
    recorder.pause_recording().unwrap();
    recorder.cancel_recording().unwrap();

    assert_eq!(recorder.state(), RecordingState::Cancelled);
    assert!(dir_is_empty(&services.config().recording.output_directory));
}

#[test]
fn deleted_recording_cannot_be_played() {
    let root = tempfile::tempdir().unwrap();
    let services = services(root.path());
    let mut recorder = services.recording_controller(ToneCapture::default()).unwrap();
    recorder.start_recording("old-entry").unwrap();
    thread::sleep(Duration::from_millis(60));
    let result = recorder.stop_recording().unwrap();

    let audio = services.sealed_audio_ref(&result.sealed_path).unwrap();
    let copy = root.path().join("copy.jaef");
    fs::copy(&result.sealed_path, &copy).unwrap();
    services.delete_recording(&result.sealed_path, "old-entry").unwrap();

    let mut player = services.playback_controller(ClockPlayback::new()).unwrap();
    assert!(matches!(
        player.prepare_for_playback(&audio),
        Err(PlaybackError::FileNotFound(_))
    ));

    player.cleanup();
    let mut moved = audio.clone();
    moved.path = copy;
    assert!(matches!(
        player.prepare_for_playback(&moved),
        Err(PlaybackError::PlaybackFailed(_))
    ));
    assert!(dir_is_empty(&services.config().playback.transient_directory));
}

struct Approve;

impl UserPresence for Approve {
    fn confirm(&self, _reason: &str) -> PresenceOutcome {
        PresenceOutcome::Confirmed
    }
}

#[test]
fn storage_export_import_across_devices() {
    let root = tempfile::tempdir().unwrap();
    let phone = JournalAudioServices::new(
        JournalAudioConfig::rooted_at(&root.path().join("phone")),
        Arc::new(MemoryKeyStore::with_presence(Arc::new(Approve))),
        Arc::new(DirectoryValueStore::open(root.path().join("phone-values")).unwrap()),
    )
    .unwrap();
    let tablet = JournalAudioServices::in_memory(JournalAudioConfig::rooted_at(&root.path().join("tablet"))).unwrap();

    phone.storage().store(b"sync-token-123", "sync.token", true).unwrap();
    assert_eq!(phone.storage().retrieve("sync.token", false).unwrap(), b"sync-token-123");

    let package = phone.storage().secure_export("sync.token", "correct horse").unwrap();
    assert!(!String::from_utf8_lossy(&package).contains("sync-token-123"));

    assert!(tablet.storage().secure_import(&package, "wrong horse", false).is_err());
    let key = tablet.storage().secure_import(&package, "correct horse", false).unwrap();
    assert_eq!(key, "sync.token");
    assert_eq!(tablet.storage().retrieve(&key, false).unwrap(), b"sync-token-123");

    assert!(matches!(
        tablet.storage().secure_import(b"not a package", "correct horse", false),
        Err(StorageError::UnrecognizedFormat(_))
    ));
}

#[test]
fn legacy_values_migrate_into_sealed_storage() {
    let root = tempfile::tempdir().unwrap();
    let services = services(root.path());
    let legacy = MemoryValueStore::new();
    legacy
        .save(b"plain", "reminder.time", journal_audio_core::AccessibilityPolicy::WhenUnlocked)
        .unwrap();

    let report = services
        .storage()
        .migrate_from_legacy_storage(&legacy, &["reminder.time", "never.set"])
        .unwrap();
    assert_eq!(report.migrated, vec!["reminder.time".to_string()]);
    assert_eq!(report.missing, vec!["never.set".to_string()]);
    assert!(legacy.is_empty());
    assert_eq!(services.storage().retrieve("reminder.time", false).unwrap(), b"plain");
}

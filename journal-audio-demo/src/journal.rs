use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use journal_audio_core::platform::{ClockPlayback, ToneCapture};
use journal_audio_core::{
    ChannelPlaybackDelegate, ChannelRecordingDelegate, JournalAudioServices, PlaybackState, PlaybackUpdate,
    RecordingUpdate,
};

/// Extra time allowed past the audio duration for playback to report completion.
const PLAYBACK_SLACK: Duration = Duration::from_secs(5);

pub fn run(
    services: &JournalAudioServices,
    journal_id: &str,
    seconds: u64,
    pause_ms: Option<u64>,
    keep: bool,
) -> Result<(), String> {
    let mut recorder = services
        .recording_controller(ToneCapture::default())
        .map_err(|e| e.to_string())?;
    let (delegate, updates) = ChannelRecordingDelegate::new();
    recorder.set_delegate(Arc::new(delegate));

    recorder.start_recording(journal_id).map_err(|e| e.to_string())?;
    match pause_ms {
        Some(ms) => {
            thread::sleep(Duration::from_millis(ms));
            recorder.pause_recording().map_err(|e| e.to_string())?;
            thread::sleep(Duration::from_millis(ms));
            recorder.resume_recording().map_err(|e| e.to_string())?;
            thread::sleep(Duration::from_secs(seconds).saturating_sub(Duration::from_millis(ms)));
        }
        None => thread::sleep(Duration::from_secs(seconds)),
    }
    let result = recorder.stop_recording().map_err(|e| e.to_string())?;

    let mut peak = 0.0f32;
    for update in updates.try_iter() {
        match update {
            RecordingUpdate::State(state) => log::info!("recording: {:?}", state),
            RecordingUpdate::Amplitude { level, .. } => peak = peak.max(level),
            RecordingUpdate::Error(e) => log::warn!("recording error: {}", e),
            RecordingUpdate::Finished(_) => {}
        }
    }
    log::info!("peak input level {:.2}", peak);

    let metadata = serde_json::to_string_pretty(&result.metadata).map_err(|e| e.to_string())?;
    println!("{metadata}");

    let audio = services
        .sealed_audio_ref(&result.sealed_path)
        .map_err(|e| e.to_string())?;
    let mut player = services
        .playback_controller(ClockPlayback::new())
        .map_err(|e| e.to_string())?;
    let (delegate, updates) = ChannelPlaybackDelegate::new();
    player.set_delegate(Arc::new(delegate));

    let duration = player.prepare_for_playback(&audio).map_err(|e| e.to_string())?;
    player.start().map_err(|e| e.to_string())?;
    let deadline = Instant::now() + duration + PLAYBACK_SLACK;
    loop {
        let Ok(update) = updates.recv_timeout(deadline.saturating_duration_since(Instant::now())) else {
            player.cleanup();
            return Err("playback did not reach the end".into());
        };
        match update {
            PlaybackUpdate::Progress { position, duration } => {
                log::debug!("playback {} / {} ms", position.as_millis(), duration.as_millis())
            }
            PlaybackUpdate::State(PlaybackState::Completed) => break,
            PlaybackUpdate::State(state) => log::info!("playback: {:?}", state),
            PlaybackUpdate::Error(e) => {
                player.cleanup();
                return Err(e.to_string());
            }
        }
    }
    player.cleanup();
    log::info!("played {} ms of {}", duration.as_millis(), result.sealed_path.display());

    if !keep {
        services
            .delete_recording(&result.sealed_path, journal_id)
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

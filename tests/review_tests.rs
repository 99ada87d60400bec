// Integration tests for what happens after a recording stops:
// saving the artifact and reviewing it with the player.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use live_recorder::audio::mock::{MockDeviceProvider, MockOutputProvider};
use live_recorder::playback::{PlaybackEvent, PlaybackReview};
use live_recorder::session::{MemorySink, RecordingSession, SessionConfig};
use live_recorder::visualizer::NullCanvas;
use live_recorder::DirectorySink;
use tempfile::TempDir;

async fn finished_session(
    devices: &MockDeviceProvider,
    sink: &MemorySink,
) -> Result<RecordingSession> {
    let mut session = RecordingSession::new(
        SessionConfig::default(),
        Arc::new(devices.clone()),
        Arc::new(MockOutputProvider::new()),
        Arc::new(NullCanvas),
        Arc::new(sink.clone()),
    );

    session.start().await?;
    devices.push_constant(300, 1200);
    session.pump();
    session.stop()?;
    Ok(session)
}

#[tokio::test(start_paused = true)]
async fn test_save_writes_timestamped_wav() -> Result<()> {
    let devices = MockDeviceProvider::granting().with_format(8000, 2);
    let sink = MemorySink::new();
    let session = finished_session(&devices, &sink).await?;
    let dir = TempDir::new()?;

    let path = session.save(&DirectorySink::new(dir.path()))?;

    let name = path.file_name().unwrap().to_str().unwrap();
    assert_eq!(name, session.artifact().unwrap().suggested_filename());
    assert_eq!(name.len(), "YYYY_MM_DD_HH_MM_SS.wav".len());
    assert!(name.ends_with(".wav"));
    assert_eq!(sink.last_status().as_deref(), Some("Recording Saved"));

    let reader = hound::WavReader::open(&path)?;
    assert_eq!(reader.spec().sample_rate, 8000);
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.duration(), 2400);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_save_without_recording_fails() -> Result<()> {
    let session = RecordingSession::new(
        SessionConfig::default(),
        Arc::new(MockDeviceProvider::granting()),
        Arc::new(MockOutputProvider::new()),
        Arc::new(NullCanvas),
        Arc::new(MemorySink::new()),
    );
    let dir = TempDir::new()?;

    assert!(session.save(&DirectorySink::new(dir.path())).is_err());
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_review_plays_recording_and_restarts_from_beginning() -> Result<()> {
    let devices = MockDeviceProvider::granting().with_format(1000, 1);
    let sink = MemorySink::new();
    let session = finished_session(&devices, &sink).await?;

    let outputs = MockOutputProvider::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&events);
    let mut review = PlaybackReview::new(
        session.artifact().unwrap(),
        Arc::new(outputs.clone()),
        Arc::new(move |e: PlaybackEvent| log.lock().unwrap().push(e)),
    )?;
    assert_eq!(review.duration(), Duration::from_millis(300));

    review.toggle()?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    review.toggle()?;
    review.toggle()?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            PlaybackEvent::Playing,
            PlaybackEvent::Paused,
            PlaybackEvent::Playing,
            PlaybackEvent::Ended
        ]
    );
    // The second play started over, so the full recording was written after the partial one
    let written = outputs.written();
    assert!(written.len() > 300);
    assert!(written[written.len() - 300..].iter().all(|&s| s == 1200));
    assert_eq!(outputs.opened(), 2);
    Ok(())
}

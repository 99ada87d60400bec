// Integration tests for the chunked WAV encoder
//
// These tests verify that captured frames are split into timeslice-sized
// chunks while recording and joined into one WAV blob at stop.

use anyhow::Result;
use live_recorder::audio::{AudioFile, AudioFrame, EncoderConfig, EncoderState, WavEncoder};
use std::time::Duration;

fn frame(index: u64, samples_per_frame: usize) -> AudioFrame {
    AudioFrame {
        samples: vec![(index % 100) as i16; samples_per_frame],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: index * 100,
    }
}

#[test]
fn test_recording_splits_into_multiple_chunks() -> Result<()> {
    let mut encoder = WavEncoder::new(EncoderConfig { timeslice_ms: 2000 });
    encoder.start(16000, 1);

    // 50 frames * 100ms = 5 seconds -> [0-2s], [2-4s], [4-5s]
    for i in 0..50 {
        assert!(encoder.append(&frame(i, 1600)));
    }
    encoder.pause();

    let chunks = encoder.chunks();
    assert_eq!(chunks.len(), 3, "Should create 3 chunks for 5s recording with 2s chunks");
    assert_eq!((chunks[0].start_ms, chunks[0].end_ms), (0, 2000));
    assert_eq!((chunks[1].start_ms, chunks[1].end_ms), (2000, 4000));
    assert_eq!((chunks[2].start_ms, chunks[2].end_ms), (4000, 5000));
    assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));

    let recording = encoder.stop()?;
    assert_eq!(recording.chunk_count, 3);
    assert_eq!(recording.duration(), Duration::from_secs(5));

    Ok(())
}

#[test]
fn test_blob_preserves_samples_in_order() -> Result<()> {
    let mut encoder = WavEncoder::new(EncoderConfig { timeslice_ms: 250 });
    encoder.start(16000, 1);

    for i in 0..10 {
        encoder.append(&frame(i, 1600));
    }

    let recording = encoder.stop()?;
    let audio = AudioFile::from_wav_bytes(&recording.data)?;

    assert_eq!(audio.sample_rate, 16000, "Sample rate should be preserved");
    assert_eq!(audio.channels, 1, "Channel count should be preserved");
    assert_eq!(audio.samples.len(), 16000);
    assert_eq!(audio.samples[0], 0);
    assert_eq!(audio.samples[1600], 1);
    assert_eq!(audio.samples[15999], 9);

    Ok(())
}

#[test]
fn test_empty_recording_is_a_valid_wav() -> Result<()> {
    let mut encoder = WavEncoder::default();
    encoder.start(44100, 2);

    let recording = encoder.stop()?;
    let audio = AudioFile::from_wav_bytes(&recording.data)?;

    assert_eq!(recording.chunk_count, 0);
    assert!(audio.samples.is_empty());
    assert_eq!(encoder.state(), EncoderState::Inactive);

    Ok(())
}

#[test]
fn test_restart_discards_previous_chunks() -> Result<()> {
    let mut encoder = WavEncoder::new(EncoderConfig { timeslice_ms: 100 });
    encoder.start(16000, 1);
    encoder.append(&frame(1, 3200));
    encoder.stop()?;

    encoder.start(16000, 1);
    assert_eq!(encoder.chunk_count(), 0);
    assert_eq!(encoder.recorded_duration(), Duration::ZERO);

    Ok(())
}

#[test]
fn test_encoder_config_default() {
    let config = EncoderConfig::default();
    assert_eq!(config.timeslice_ms, 1000, "Default timeslice should be one second");
}

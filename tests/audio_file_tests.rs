// Integration tests for decoding recordings
//
// These tests verify that WAV files and in-memory blobs decode back to the
// samples that were written.

use anyhow::Result;
use live_recorder::audio::AudioFile;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn write_fixture(dir: &Path, sample_rate: u32, channels: u16, samples: &[i16]) -> Result<PathBuf> {
    let path = dir.join("fixture.wav");
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(path)
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let dir = TempDir::new()?;
    let samples: Vec<i16> = (0..16000).map(|i| (i % 200) as i16).collect();
    let path = write_fixture(dir.path(), 16000, 1, &samples)?;

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples, samples);
    assert_eq!(audio.duration(), Duration::from_secs(1));

    Ok(())
}

#[test]
fn test_audio_file_interleaved_channels() -> Result<()> {
    let dir = TempDir::new()?;
    let samples: Vec<i16> = (0..4410).flat_map(|_| [100i16, -100]).collect();
    let path = write_fixture(dir.path(), 44100, 2, &samples)?;

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.frame_count(), 4410);
    assert_eq!(audio.duration(), Duration::from_millis(100));
    assert_eq!(&audio.samples[..4], &[100, -100, 100, -100]);

    Ok(())
}

#[test]
fn test_audio_file_from_bytes() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_fixture(dir.path(), 8000, 1, &[1, 2, 3])?;
    let bytes = std::fs::read(&path)?;

    let audio = AudioFile::from_wav_bytes(&bytes)?;

    assert_eq!(audio.samples, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let path = PathBuf::from("/nonexistent/path/to/audio.wav");
    let result = AudioFile::open(&path);

    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[test]
fn test_audio_file_rejects_float_samples() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("float.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    writer.write_sample(0.5f32)?;
    writer.finalize()?;

    assert!(AudioFile::open(&path).is_err());
    Ok(())
}

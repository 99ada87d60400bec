//! The finished recording and where it goes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::audio::{EncodedRecording, WAV_MIME};

/// Immutable result of one recording, produced once at stop
#[derive(Debug, Clone)]
pub struct RecordingArtifact {
    data: Arc<[u8]>,
    mime: &'static str,
    stopped_at: DateTime<Utc>,
    duration: Duration,
    sample_rate: u32,
    channels: u16,
}

impl RecordingArtifact {
    pub fn new(recording: EncodedRecording, stopped_at: DateTime<Utc>) -> Self {
        Self {
            duration: recording.duration(),
            sample_rate: recording.sample_rate,
            channels: recording.channels,
            data: recording.data.into(),
            mime: WAV_MIME,
            stopped_at,
        }
    }

    /// The encoded blob
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime(&self) -> &str {
        self.mime
    }

    pub fn stopped_at(&self) -> DateTime<Utc> {
        self.stopped_at
    }

    /// Recorded audio length, pauses excluded
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `YYYY_MM_DD_HH_MM_SS.wav`, from the stop time
    pub fn suggested_filename(&self) -> String {
        format!("{}.wav", self.stopped_at.format("%Y_%m_%d_%H_%M_%S"))
    }
}

/// Accepts a finished recording blob
pub trait ArtifactSink {
    /// Store `blob` under `filename`, returning where it went
    fn save(&self, blob: &[u8], filename: &str) -> Result<PathBuf>;
}

/// Writes recordings into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn save(&self, blob: &[u8], filename: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create recordings directory {}", self.dir.display())
        })?;

        let path = self.dir.join(filename);
        fs::write(&path, blob)
            .with_context(|| format!("Failed to write recording {}", path.display()))?;

        info!("Saved {} bytes to {}", blob.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn artifact() -> RecordingArtifact {
        let recording = EncodedRecording {
            data: vec![1, 2, 3],
            sample_rate: 44100,
            channels: 2,
            frame_count: 44100,
            chunk_count: 1,
        };
        let stopped_at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        RecordingArtifact::new(recording, stopped_at)
    }

    #[test]
    fn test_suggested_filename() {
        assert_eq!(artifact().suggested_filename(), "2024_03_07_09_05_02.wav");
    }

    #[test]
    fn test_artifact_metadata() {
        let artifact = artifact();
        assert_eq!(artifact.mime(), "audio/wav");
        assert_eq!(artifact.duration(), Duration::from_secs(1));
        assert_eq!(artifact.len(), 3);
    }

    #[test]
    fn test_directory_sink_writes_file() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let sink = DirectorySink::new(dir.path().join("out"));

        let path = sink.save(&[9, 8, 7], "a.wav")?;

        assert_eq!(fs::read(path)?, vec![9, 8, 7]);
        Ok(())
    }
}

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use hound::WavReader;
use tracing::info;

/// Decoded 16-bit PCM audio, used for reviewing finished recordings
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;
        Self::from_reader(reader)
    }

    /// Decode an in-memory WAV blob
    pub fn from_wav_bytes(data: &[u8]) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(data)).context("Failed to parse WAV data")?;
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        anyhow::ensure!(
            spec.bits_per_sample == 16 && spec.sample_format == hound::SampleFormat::Int,
            "Expected 16-bit PCM, got {}-bit {:?}",
            spec.bits_per_sample,
            spec.sample_format
        );

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let file = Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        };

        info!(
            "Audio loaded: {:.1}s, {}Hz, {} channels, {} samples",
            file.duration().as_secs_f64(),
            file.sample_rate,
            file.channels,
            file.samples.len()
        );

        Ok(file)
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::CaptureConstraints;
use crate::session::SessionConfig;
use crate::visualizer::VisualizerConfig;

/// Prefix of environment overrides, e.g. `LIVE_RECORDER__AUDIO__GAIN=0.5`
pub const ENV_PREFIX: &str = "LIVE_RECORDER";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub encoder: EncoderSection,
    pub visualizer: VisualizerSection,
    pub recordings: RecordingsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Synthetic sine tone
    Tone,
    /// System microphone
    Device,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub source: SourceKind,
    /// Input device name; the default device when unset
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Initial monitor gain
    pub gain: f32,
    /// Play the capture back through the default output
    pub monitor: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncoderSection {
    pub timeslice_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisualizerSection {
    pub width: u32,
    pub height: u32,
    pub refresh_hz: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingsConfig {
    /// Where saved recordings are written
    pub path: PathBuf,
}

impl Config {
    /// Load defaults, then `path` (any format the config crate knows, the
    /// extension may be omitted) if it exists, then `LIVE_RECORDER__*`
    /// environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "live-recorder")?
            .set_default("audio.source", "tone")?
            .set_default("audio.sample_rate", 44100)?
            .set_default("audio.channels", 2)?
            .set_default("audio.echo_cancellation", true)?
            .set_default("audio.noise_suppression", true)?
            .set_default("audio.auto_gain_control", true)?
            .set_default("audio.gain", 1.0)?
            .set_default("audio.monitor", true)?
            .set_default("encoder.timeslice_ms", 1000)?
            .set_default("visualizer.width", 640)?
            .set_default("visualizer.height", 100)?
            .set_default("visualizer.refresh_hz", 60)?
            .set_default("recordings.path", "recordings")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            echo_cancellation: self.audio.echo_cancellation,
            noise_suppression: self.audio.noise_suppression,
            auto_gain_control: self.audio.auto_gain_control,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            constraints: self.constraints(),
            initial_gain: self.audio.gain,
            timeslice_ms: self.encoder.timeslice_ms,
            visualizer: VisualizerConfig {
                refresh_hz: self.visualizer.refresh_hz,
            },
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load("does/not/exist/live-recorder").unwrap();

        assert_eq!(cfg.service.name, "live-recorder");
        assert_eq!(cfg.audio.source, SourceKind::Tone);
        assert_eq!(cfg.constraints(), CaptureConstraints::default());
        assert_eq!(cfg.encoder.timeslice_ms, 1000);
    }

    #[test]
    fn test_file_overrides_defaults() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("recorder.toml");
        fs::write(
            &path,
            "[audio]\ngain = 0.5\nchannels = 1\n\n[encoder]\ntimeslice_ms = 250\n",
        )?;

        let cfg = Config::load(path.to_str().unwrap())?;
        let session = cfg.session_config();

        assert_eq!(session.initial_gain, 0.5);
        assert_eq!(session.constraints.channels, 1);
        assert_eq!(session.constraints.sample_rate, 44100);
        assert_eq!(session.timeslice_ms, 250);
        Ok(())
    }
}

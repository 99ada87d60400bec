use serde::{Deserialize, Serialize};

use crate::audio::encoder::MAX_TIMESLICE_MS;
use crate::audio::{CaptureConstraints, EncoderConfig};
use crate::visualizer::VisualizerConfig;

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-6f1c...")
    pub session_id: String,

    /// What to ask the device provider for.
    /// Default: stereo at 44.1kHz with voice processing on
    pub constraints: CaptureConstraints,

    /// Monitor gain applied to the first graph; later graphs use the last
    /// value set by the operator
    pub initial_gain: f32,

    /// Chunk length of the encoder in milliseconds
    /// Default: 1000
    pub timeslice_ms: u64,

    pub visualizer: VisualizerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            constraints: CaptureConstraints::default(),
            initial_gain: 1.0,
            timeslice_ms: EncoderConfig::default().timeslice_ms,
            visualizer: VisualizerConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            timeslice_ms: self.timeslice_ms.clamp(1, MAX_TIMESLICE_MS),
        }
    }
}

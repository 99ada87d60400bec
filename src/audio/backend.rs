use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::RecorderError;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the device was opened
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Number of sample frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duration covered by this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frame_count() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Constraints passed to the device provider when requesting a microphone.
///
/// Mirrors the fixed request made by the recorder: stereo at 44.1kHz with
/// the host's voice processing switched on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Requested channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// An active microphone stream.
///
/// Owned exclusively by one recording session. Dropping or stopping the
/// device releases every track it holds.
pub trait CaptureDevice: Send {
    /// Take the receiver for captured frames.
    ///
    /// Returns `None` once taken. The channel closes when the device stops
    /// or is lost.
    fn take_frames(&mut self) -> Option<mpsc::Receiver<AudioFrame>>;

    /// Stop all tracks. Idempotent.
    fn stop(&mut self);

    /// Check if the device is still delivering audio
    fn is_live(&self) -> bool;

    /// Actual capture format as (sample rate, channels)
    fn format(&self) -> (u32, u16);

    /// Get device name for logging
    fn name(&self) -> &str;
}

/// Capture device provider
///
/// Implementations:
/// - `CpalDeviceProvider`: the system microphone (feature `cpal`)
/// - `ToneDeviceProvider`: a synthetic real-time signal
/// - `MockDeviceProvider`: scripted devices for tests
#[async_trait::async_trait]
pub trait DeviceProvider: Send + Sync {
    /// Request an input device matching the constraints.
    ///
    /// Suspends until the device is open or the request is refused
    /// (`Permission` or `DeviceUnavailable`).
    async fn request_device(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureDevice>, RecorderError>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints() {
        let constraints = CaptureConstraints::default();
        assert_eq!(constraints.sample_rate, 44100);
        assert_eq!(constraints.channels, 2);
        assert!(constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
        assert!(constraints.auto_gain_control);
    }

    #[test]
    fn test_frame_duration_stereo() {
        // 441 stereo frames at 44.1kHz = 10ms
        let frame = AudioFrame {
            samples: vec![0; 882],
            sample_rate: 44100,
            channels: 2,
            timestamp_ms: 0,
        };
        assert_eq!(frame.frame_count(), 441);
        assert_eq!(frame.duration_ms(), 10);
    }
}

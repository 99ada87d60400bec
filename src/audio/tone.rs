//! Synthetic capture source.
//!
//! Generates a continuous sine tone in real time so the recorder can run on
//! machines without an input device.

use std::f64::consts::PI;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::backend::{AudioFrame, CaptureConstraints, CaptureDevice, DeviceProvider};
use crate::error::RecorderError;

const FRAME_MS: u64 = 20;
const CHANNEL_CAPACITY: usize = 256;

/// Sine generator with a continuous phase across frames
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    frequency: f64,
    amplitude: f64,
    sample_rate: u32,
    channels: u16,
    phase: f64,
}

impl ToneGenerator {
    pub fn new(frequency: f64, amplitude: f64, sample_rate: u32, channels: u16) -> Self {
        Self {
            frequency,
            amplitude: amplitude.clamp(0.0, 1.0),
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            phase: 0.0,
        }
    }

    /// Next `duration_ms` of interleaved samples
    pub fn generate(&mut self, duration_ms: u64) -> Vec<i16> {
        let frames = (self.sample_rate as u64 * duration_ms / 1000) as usize;
        let step = 2.0 * PI * self.frequency / f64::from(self.sample_rate);
        let mut samples = Vec::with_capacity(frames * self.channels as usize);

        for _ in 0..frames {
            let sample = (self.phase.sin() * self.amplitude * 32767.0) as i16;
            for _ in 0..self.channels {
                samples.push(sample);
            }
            self.phase = (self.phase + step) % (2.0 * PI);
        }

        samples
    }
}

/// Device provider handing out [`ToneDevice`]s
#[derive(Debug, Clone)]
pub struct ToneDeviceProvider {
    frequency: f64,
    amplitude: f64,
}

impl ToneDeviceProvider {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
        }
    }
}

impl Default for ToneDeviceProvider {
    fn default() -> Self {
        Self::new(440.0, 0.3)
    }
}

#[async_trait::async_trait]
impl DeviceProvider for ToneDeviceProvider {
    async fn request_device(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureDevice>, RecorderError> {
        let sample_rate = constraints.sample_rate;
        let channels = constraints.channels.max(1);
        let mut generator = ToneGenerator::new(self.frequency, self.amplitude, sample_rate, channels);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_MS));
            let mut timestamp_ms = 0u64;

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let frame = AudioFrame {
                            samples: generator.generate(FRAME_MS),
                            sample_rate,
                            channels,
                            timestamp_ms,
                        };
                        timestamp_ms += FRAME_MS;
                        if tx.send(frame).await.is_err() {
                            debug!("Tone receiver dropped");
                            break;
                        }
                    }
                }
            }
        });

        info!(
            "Tone device started: {:.0}Hz at {}Hz, {} channels",
            self.frequency, sample_rate, channels
        );

        Ok(Box::new(ToneDevice {
            frames: Some(rx),
            cancel,
            sample_rate,
            channels,
        }))
    }

    fn name(&self) -> &str {
        "tone"
    }
}

/// Capture device backed by a generator task
pub struct ToneDevice {
    frames: Option<mpsc::Receiver<AudioFrame>>,
    cancel: CancellationToken,
    sample_rate: u32,
    channels: u16,
}

impl CaptureDevice for ToneDevice {
    fn take_frames(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.frames.take()
    }

    fn stop(&mut self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
            debug!("Tone device stopped");
        }
        self.frames = None;
    }

    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    fn format(&self) -> (u32, u16) {
        (self.sample_rate, self.channels)
    }

    fn name(&self) -> &str {
        "Test Tone"
    }
}

impl Drop for ToneDevice {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_lengths() {
        let mut generator = ToneGenerator::new(440.0, 0.5, 48000, 2);
        let samples = generator.generate(100);
        assert_eq!(samples.len(), 9600);
        assert!(samples.iter().any(|&s| s > 0));
        assert!(samples.iter().any(|&s| s < 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tone_device_produces_frames_until_stopped() {
        let provider = ToneDeviceProvider::default();
        let constraints = CaptureConstraints {
            sample_rate: 8000,
            channels: 1,
            ..CaptureConstraints::default()
        };
        let mut device = provider.request_device(&constraints).await.unwrap();
        let mut frames = device.take_frames().unwrap();

        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.samples.len(), 160);
        assert_eq!(device.format(), (8000, 1));

        device.stop();
        assert!(!device.is_live());
    }
}

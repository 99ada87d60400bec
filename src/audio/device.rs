//! System microphone capture through cpal.
//!
//! cpal streams cannot leave the thread that built them, so each device
//! owns a capture thread holding the stream. The data callback converts
//! whatever the hardware delivers to i16 and forwards it as [`AudioFrame`]s.

use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::backend::{AudioFrame, CaptureConstraints, CaptureDevice, DeviceProvider};
use crate::error::RecorderError;

/// Frames buffered between the capture thread and the session
const DEFAULT_BUFFER: usize = 512;

enum CaptureCommand {
    Stop,
    Lost(String),
}

/// Opens the system microphone
#[derive(Debug, Clone)]
pub struct CpalDeviceProvider {
    device_name: Option<String>,
    buffer: usize,
}

impl CpalDeviceProvider {
    /// Use the default input device
    pub fn new() -> Self {
        Self {
            device_name: None,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Use the input device with this name
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// List input device names on the default host
    pub fn input_devices() -> Result<Vec<String>, RecorderError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

impl Default for CpalDeviceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeviceProvider for CpalDeviceProvider {
    async fn request_device(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureDevice>, RecorderError> {
        if constraints.echo_cancellation || constraints.noise_suppression || constraints.auto_gain_control {
            debug!("Voice processing is left to the host audio stack");
        }

        let (frame_tx, frame_rx) = mpsc::channel(self.buffer);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (command_tx, command_rx) = std_mpsc::channel();

        let device_name = self.device_name.clone();
        let constraints = constraints.clone();
        let lost_tx = command_tx.clone();
        let thread = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                run_capture_thread(device_name, constraints, frame_tx, command_rx, lost_tx, ready_tx)
            })
            .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(opened)) => {
                info!(
                    "Capturing from {} ({}Hz, {} channels)",
                    opened.name, opened.sample_rate, opened.channels
                );
                Ok(Box::new(CpalCaptureDevice {
                    frames: Some(frame_rx),
                    commands: command_tx,
                    thread: Some(thread),
                    name: opened.name,
                    sample_rate: opened.sample_rate,
                    channels: opened.channels,
                    live: true,
                }))
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(RecorderError::DeviceUnavailable(
                "capture thread exited during setup".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

struct OpenedDevice {
    name: String,
    sample_rate: u32,
    channels: u16,
}

/// A live microphone stream
pub struct CpalCaptureDevice {
    frames: Option<mpsc::Receiver<AudioFrame>>,
    commands: std_mpsc::Sender<CaptureCommand>,
    thread: Option<JoinHandle<()>>,
    name: String,
    sample_rate: u32,
    channels: u16,
    live: bool,
}

impl CaptureDevice for CpalCaptureDevice {
    fn take_frames(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.frames.take()
    }

    fn stop(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.frames = None;

        let _ = self.commands.send(CaptureCommand::Stop);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
        info!("Stopped capture from {}", self.name);
    }

    fn is_live(&self) -> bool {
        self.live
            && self
                .thread
                .as_ref()
                .map(|t| !t.is_finished())
                .unwrap_or(false)
    }

    fn format(&self) -> (u32, u16) {
        (self.sample_rate, self.channels)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for CpalCaptureDevice {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture_thread(
    device_name: Option<String>,
    constraints: CaptureConstraints,
    frames: mpsc::Sender<AudioFrame>,
    commands: std_mpsc::Receiver<CaptureCommand>,
    lost: std_mpsc::Sender<CaptureCommand>,
    ready: oneshot::Sender<Result<OpenedDevice, RecorderError>>,
) {
    let (stream, opened) = match build_stream(device_name.as_deref(), &constraints, frames, lost) {
        Ok(built) => built,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(map_play_error(e)));
        return;
    }
    if ready.send(Ok(opened)).is_err() {
        return;
    }

    // Dropping the stream drops the frame sender, which closes the channel
    match commands.recv() {
        Ok(CaptureCommand::Lost(reason)) => error!("Capture device lost: {}", reason),
        Ok(CaptureCommand::Stop) | Err(_) => debug!("Capture thread stopping"),
    }
    drop(stream);
}

fn build_stream(
    device_name: Option<&str>,
    constraints: &CaptureConstraints,
    frames: mpsc::Sender<AudioFrame>,
    lost: std_mpsc::Sender<CaptureCommand>,
) -> Result<(cpal::Stream, OpenedDevice), RecorderError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| {
                RecorderError::DeviceUnavailable(format!("input device '{}' not found", name))
            })?,
        None => host
            .default_input_device()
            .ok_or_else(|| RecorderError::DeviceUnavailable("no default input device".to_string()))?,
    };

    let name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let supported = pick_config(&device, constraints)?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    if config.sample_rate.0 != constraints.sample_rate || config.channels != constraints.channels {
        warn!(
            "{} does not support {}Hz/{}ch, capturing at {}Hz/{}ch",
            name, constraints.sample_rate, constraints.channels, config.sample_rate.0, config.channels
        );
    }

    let opened = OpenedDevice {
        name,
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };

    let stream = match sample_format {
        SampleFormat::I16 => build_typed::<i16>(&device, &config, frames, lost),
        SampleFormat::U16 => build_typed::<u16>(&device, &config, frames, lost),
        SampleFormat::I32 => build_typed::<i32>(&device, &config, frames, lost),
        SampleFormat::F32 => build_typed::<f32>(&device, &config, frames, lost),
        other => Err(RecorderError::DeviceUnavailable(format!(
            "unsupported input sample format {:?}",
            other
        ))),
    }?;

    Ok((stream, opened))
}

fn pick_config(
    device: &cpal::Device,
    constraints: &CaptureConstraints,
) -> Result<cpal::SupportedStreamConfig, RecorderError> {
    let rate = constraints.sample_rate;
    if let Ok(mut ranges) = device.supported_input_configs() {
        let matching = ranges.find(|range| {
            range.channels() == constraints.channels
                && range.min_sample_rate().0 <= rate
                && rate <= range.max_sample_rate().0
        });
        if let Some(range) = matching {
            return Ok(range.with_sample_rate(cpal::SampleRate(rate)));
        }
    }

    device
        .default_input_config()
        .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    frames: mpsc::Sender<AudioFrame>,
    lost: std_mpsc::Sender<CaptureCommand>,
) -> Result<cpal::Stream, RecorderError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let mut captured_frames: u64 = 0;
    let mut dropped: u64 = 0;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<i16> = data.iter().map(|s| s.to_sample::<i16>()).collect();
                let frame = AudioFrame {
                    samples,
                    sample_rate,
                    channels,
                    timestamp_ms: captured_frames * 1000 / sample_rate.max(1) as u64,
                };
                captured_frames += frame.frame_count() as u64;

                if frames.try_send(frame).is_err() {
                    dropped += 1;
                    if dropped % 100 == 1 {
                        warn!("Capture buffer full, dropped {} frames", dropped);
                    }
                }
            },
            move |err| {
                error!("Capture stream error: {}", err);
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    let _ = lost.send(CaptureCommand::Lost(err.to_string()));
                }
            },
            None,
        )
        .map_err(map_build_error)
}

fn map_build_error(err: cpal::BuildStreamError) -> RecorderError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            RecorderError::DeviceUnavailable(err.to_string())
        }
        // Hosts report a refused microphone as a backend failure
        cpal::BuildStreamError::BackendSpecific { .. } => RecorderError::Permission(err.to_string()),
        other => RecorderError::DeviceUnavailable(other.to_string()),
    }
}

fn map_play_error(err: cpal::PlayStreamError) -> RecorderError {
    match err {
        cpal::PlayStreamError::DeviceNotAvailable => {
            RecorderError::DeviceUnavailable(err.to_string())
        }
        cpal::PlayStreamError::BackendSpecific { .. } => RecorderError::Permission(err.to_string()),
    }
}

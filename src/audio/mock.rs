//! Mock capture devices and outputs for testing without hardware.
//!
//! [`MockDeviceProvider`] hands out devices whose frames are pushed by the
//! test, and can be told to refuse access. [`MockOutputProvider`] records
//! everything written to monitor outputs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::backend::{AudioFrame, CaptureConstraints, CaptureDevice, DeviceProvider};
use super::monitor::{MonitorOutput, OutputProvider};
use crate::error::RecorderError;

/// Frames buffered between the test and the session
const FEED_CAPACITY: usize = 4096;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How the mock provider answers device requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Grant,
    DenyPermission,
    NotFound,
}

/// Scripted capture device provider.
///
/// Clones share state, so a test can keep one clone to feed audio while the
/// session owns another.
#[derive(Clone)]
pub struct MockDeviceProvider {
    inner: Arc<Mutex<ProviderState>>,
    live_devices: Arc<AtomicUsize>,
}

struct ProviderState {
    behavior: MockBehavior,
    sample_rate: u32,
    channels: u16,
    requests: usize,
    last_constraints: Option<CaptureConstraints>,
    feed: Option<mpsc::Sender<AudioFrame>>,
    current_live: Option<Arc<AtomicBool>>,
    next_timestamp_ms: u64,
}

impl MockDeviceProvider {
    /// A provider granting 44.1kHz stereo devices
    pub fn granting() -> Self {
        Self::with_behavior(MockBehavior::Grant)
    }

    /// A provider that always refuses permission
    pub fn denying() -> Self {
        Self::with_behavior(MockBehavior::DenyPermission)
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProviderState {
                behavior,
                sample_rate: 44100,
                channels: 2,
                requests: 0,
                last_constraints: None,
                feed: None,
                current_live: None,
                next_timestamp_ms: 0,
            })),
            live_devices: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the format of devices handed out from now on
    pub fn with_format(self, sample_rate: u32, channels: u16) -> Self {
        {
            let mut state = lock(&self.inner);
            state.sample_rate = sample_rate;
            state.channels = channels;
        }
        self
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        lock(&self.inner).behavior = behavior;
    }

    /// Number of device requests received
    pub fn requests(&self) -> usize {
        lock(&self.inner).requests
    }

    /// Devices handed out and not yet stopped
    pub fn live_devices(&self) -> usize {
        self.live_devices.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<CaptureConstraints> {
        lock(&self.inner).last_constraints.clone()
    }

    /// Push interleaved samples to the current device.
    ///
    /// Returns `false` if there is no live device or nobody is listening.
    pub fn push(&self, samples: &[i16]) -> bool {
        let mut state = lock(&self.inner);
        let live = state
            .current_live
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false);
        if !live {
            return false;
        }

        let frame = AudioFrame {
            samples: samples.to_vec(),
            sample_rate: state.sample_rate,
            channels: state.channels,
            timestamp_ms: state.next_timestamp_ms,
        };
        let duration_ms = frame.duration_ms();

        let delivered = state
            .feed
            .as_ref()
            .map(|feed| feed.try_send(frame).is_ok())
            .unwrap_or(false);
        if delivered {
            state.next_timestamp_ms += duration_ms;
        }
        delivered
    }

    /// Push `duration_ms` of audio where every sample equals `value`
    pub fn push_constant(&self, duration_ms: u64, value: i16) -> bool {
        let (sample_rate, channels) = {
            let state = lock(&self.inner);
            (state.sample_rate, state.channels)
        };
        let frames = (sample_rate as u64 * duration_ms / 1000) as usize;
        self.push(&vec![value; frames * channels as usize])
    }

    /// Simulate the device being unplugged: the frame channel closes
    pub fn disconnect(&self) {
        let mut state = lock(&self.inner);
        state.feed = None;
        if let Some(flag) = state.current_live.take() {
            if flag.swap(false, Ordering::SeqCst) {
                self.live_devices.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

#[async_trait::async_trait]
impl DeviceProvider for MockDeviceProvider {
    async fn request_device(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureDevice>, RecorderError> {
        let mut state = lock(&self.inner);
        state.requests += 1;
        state.last_constraints = Some(constraints.clone());

        match state.behavior {
            MockBehavior::DenyPermission => {
                return Err(RecorderError::Permission(
                    "the user denied microphone access".to_string(),
                ))
            }
            MockBehavior::NotFound => {
                return Err(RecorderError::DeviceUnavailable(
                    "no input device matches the constraints".to_string(),
                ))
            }
            MockBehavior::Grant => {}
        }

        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let live = Arc::new(AtomicBool::new(true));
        self.live_devices.fetch_add(1, Ordering::SeqCst);

        state.feed = Some(tx);
        state.current_live = Some(Arc::clone(&live));
        state.next_timestamp_ms = 0;

        Ok(Box::new(MockCaptureDevice {
            frames: Some(rx),
            live,
            live_devices: Some(Arc::clone(&self.live_devices)),
            sample_rate: state.sample_rate,
            channels: state.channels,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Capture device handed out by [`MockDeviceProvider`]
pub struct MockCaptureDevice {
    frames: Option<mpsc::Receiver<AudioFrame>>,
    live: Arc<AtomicBool>,
    live_devices: Option<Arc<AtomicUsize>>,
    sample_rate: u32,
    channels: u16,
}

impl MockCaptureDevice {
    /// A live device that never produces audio, not tied to any provider
    pub fn detached(sample_rate: u32, channels: u16) -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self {
            frames: Some(rx),
            live: Arc::new(AtomicBool::new(true)),
            live_devices: None,
            sample_rate,
            channels,
        }
    }
}

impl CaptureDevice for MockCaptureDevice {
    fn take_frames(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.frames.take()
    }

    fn stop(&mut self) {
        if self.live.swap(false, Ordering::SeqCst) {
            if let Some(counter) = &self.live_devices {
                counter.fetch_sub(1, Ordering::SeqCst);
            }
        }
        self.frames = None;
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn format(&self) -> (u32, u16) {
        (self.sample_rate, self.channels)
    }

    fn name(&self) -> &str {
        "Mock Microphone"
    }
}

impl Drop for MockCaptureDevice {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Output provider recording everything written to its outputs
#[derive(Clone, Default)]
pub struct MockOutputProvider {
    log: Arc<Mutex<OutputLog>>,
    fail_open: bool,
}

#[derive(Default)]
struct OutputLog {
    last_format: Option<(u32, u16)>,
    written: Vec<i16>,
    outputs: Vec<OutputStatus>,
    fail_commands: bool,
}

#[derive(Default, Clone, Copy)]
struct OutputStatus {
    playing: bool,
    closed: bool,
}

impl MockOutputProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose outputs can never be opened
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Make play/pause commands on open outputs fail
    pub fn set_fail_commands(&self, fail: bool) {
        lock(&self.log).fail_commands = fail;
    }

    /// Number of outputs opened so far
    pub fn opened(&self) -> usize {
        lock(&self.log).outputs.len()
    }

    pub fn last_format(&self) -> Option<(u32, u16)> {
        lock(&self.log).last_format
    }

    /// Every sample written to any output, in order
    pub fn written(&self) -> Vec<i16> {
        lock(&self.log).written.clone()
    }

    /// Whether the most recently opened output is playing
    pub fn is_playing(&self) -> bool {
        lock(&self.log)
            .outputs
            .last()
            .map(|o| o.playing && !o.closed)
            .unwrap_or(false)
    }

    pub fn all_closed(&self) -> bool {
        lock(&self.log).outputs.iter().all(|o| o.closed)
    }
}

impl OutputProvider for MockOutputProvider {
    fn open_output(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn MonitorOutput>, RecorderError> {
        if self.fail_open {
            return Err(RecorderError::GraphInit(
                "mock output unavailable".to_string(),
            ));
        }

        let mut log = lock(&self.log);
        log.last_format = Some((sample_rate, channels));
        log.outputs.push(OutputStatus::default());

        Ok(Box::new(MockOutput {
            log: Arc::clone(&self.log),
            index: log.outputs.len() - 1,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockOutput {
    log: Arc<Mutex<OutputLog>>,
    index: usize,
}

impl MockOutput {
    fn set_playing(&mut self, playing: bool) -> Result<(), RecorderError> {
        let mut log = lock(&self.log);
        if log.fail_commands {
            return Err(RecorderError::Monitor("mock output rejected command".to_string()));
        }
        let status = &mut log.outputs[self.index];
        if status.closed {
            return Err(RecorderError::Monitor("output is closed".to_string()));
        }
        status.playing = playing;
        Ok(())
    }
}

impl MonitorOutput for MockOutput {
    fn write(&mut self, samples: &[i16]) {
        let mut log = lock(&self.log);
        let status = log.outputs[self.index];
        if status.playing && !status.closed {
            log.written.extend_from_slice(samples);
        }
    }

    fn play(&mut self) -> Result<(), RecorderError> {
        self.set_playing(true)
    }

    fn pause(&mut self) -> Result<(), RecorderError> {
        self.set_playing(false)
    }

    fn is_playing(&self) -> bool {
        let log = lock(&self.log);
        let status = log.outputs[self.index];
        status.playing && !status.closed
    }

    fn close(&mut self) {
        let mut log = lock(&self.log);
        let status = &mut log.outputs[self.index];
        status.playing = false;
        status.closed = true;
    }

    fn is_closed(&self) -> bool {
        lock(&self.log).outputs[self.index].closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_granting_provider_feeds_device() {
        let provider = MockDeviceProvider::granting().with_format(16000, 1);
        let mut device = provider
            .request_device(&CaptureConstraints::default())
            .await
            .unwrap();
        let mut frames = device.take_frames().unwrap();

        assert!(provider.push_constant(100, 7));
        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.samples.len(), 1600);
        assert_eq!(provider.live_devices(), 1);

        device.stop();
        assert_eq!(provider.live_devices(), 0);
        assert!(!provider.push(&[1, 2, 3]));
    }

    #[tokio::test]
    async fn test_denying_provider() {
        let provider = MockDeviceProvider::denying();
        let result = provider.request_device(&CaptureConstraints::default()).await;

        assert!(matches!(result, Err(RecorderError::Permission(_))));
        assert_eq!(provider.requests(), 1);
        assert_eq!(provider.live_devices(), 0);
    }

    #[test]
    fn test_output_only_records_while_playing() {
        let provider = MockOutputProvider::new();
        let mut output = provider.open_output(44100, 2).unwrap();

        output.write(&[1, 2]);
        output.play().unwrap();
        output.write(&[3, 4]);
        output.close();
        output.write(&[5, 6]);

        assert_eq!(provider.written(), vec![3, 4]);
        assert!(provider.all_closed());
    }
}

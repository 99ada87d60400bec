//! Live audio routing graph.
//!
//! ```text
//! Source ──> Gain ──> MonitorSink
//!    └─────> AnalysisTap
//! ```
//!
//! The graph is fed one captured frame at a time by its owner. Once closed
//! it ignores every call, so a stale handle can never make sound again.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::analysis::{AnalysisHandle, AnalysisTap};
use super::backend::{AudioFrame, CaptureDevice};
use super::monitor::{MonitorOutput, OutputProvider};
use crate::error::RecorderError;

/// Amplitude scaling stage on the monitor path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainNode {
    value: f32,
}

impl GainNode {
    pub fn new(value: f32) -> Self {
        Self {
            value: clamp_gain(value),
        }
    }

    /// Effective multiplier
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set(&mut self, value: f32) {
        self.value = clamp_gain(value);
    }

    /// Scale samples, saturating at the i16 range
    pub fn apply(&self, samples: &[i16]) -> Vec<i16> {
        samples
            .iter()
            .map(|&s| (s as f32 * self.value).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect()
    }
}

/// Gains are non-negative; there is no upper bound.
pub fn clamp_gain(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else if value == f32::INFINITY {
        f32::MAX
    } else {
        0.0
    }
}

/// Description of the capture device wrapped by the graph
#[derive(Debug, Clone)]
pub struct SourceNode {
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// The routing graph built over one capture device.
pub struct AudioGraph {
    /// Distinguishes graphs across restarts in the logs
    id: Uuid,
    /// Format and name of the capture device
    source: SourceNode,
    /// Applied on the monitor path only; the tap sees the raw capture
    gain: GainNode,
    /// Playback side; paused and resumed with the session
    monitor: Box<dyn MonitorOutput>,
    /// Time-domain window read by the visualizer
    tap: AnalysisTap,
    /// Cleared by `close`; every later call is ignored
    connected: bool,
    /// Frames processed since `open`
    frames_routed: u64,
}

impl AudioGraph {
    /// Build Source/Gain/MonitorSink/AnalysisTap over `device` and start
    /// monitor playback.
    ///
    /// Fails with `GraphInit` if the output context cannot be created.
    pub fn open(
        device: &dyn CaptureDevice,
        outputs: &dyn OutputProvider,
        gain: f32,
    ) -> Result<Self, RecorderError> {
        let (sample_rate, channels) = device.format();
        let mut monitor = outputs.open_output(sample_rate, channels)?;
        if let Err(e) = monitor.play() {
            monitor.close();
            return Err(RecorderError::GraphInit(e.to_string()));
        }

        let graph = Self {
            id: Uuid::new_v4(),
            source: SourceNode {
                device_name: device.name().to_string(),
                sample_rate,
                channels,
            },
            gain: GainNode::new(gain),
            monitor,
            tap: AnalysisTap::new(),
            connected: true,
            frames_routed: 0,
        };

        info!(
            "Audio graph {} opened: {} ({}Hz, {} channels) -> {} output, gain {:.2}",
            graph.id,
            graph.source.device_name,
            sample_rate,
            channels,
            outputs.name(),
            graph.gain.value()
        );

        Ok(graph)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &SourceNode {
        &self.source
    }

    /// Effective gain multiplier
    pub fn gain(&self) -> f32 {
        self.gain.value()
    }

    /// Set the gain. Negative values clamp to zero; no effect once closed.
    pub fn set_gain(&mut self, value: f32) {
        if !self.connected {
            debug!("Ignoring gain change on closed graph {}", self.id);
            return;
        }
        self.gain.set(value);
        debug!("Graph {} gain set to {:.2}", self.id, self.gain.value());
    }

    /// Read-only handle to the analysis window
    pub fn tap_for_analysis(&self) -> AnalysisHandle {
        self.tap.handle()
    }

    /// Route one captured frame through the tap and the monitor path
    pub fn process(&mut self, frame: &AudioFrame) {
        if !self.connected {
            return;
        }

        self.tap.push(&frame.samples, frame.channels);
        if self.monitor.is_playing() {
            let scaled = self.gain.apply(&frame.samples);
            self.monitor.write(&scaled);
        }
        self.frames_routed += 1;
    }

    pub fn pause_monitor(&mut self) -> Result<(), RecorderError> {
        if !self.connected {
            return Ok(());
        }
        self.monitor.pause()
    }

    pub fn resume_monitor(&mut self) -> Result<(), RecorderError> {
        if !self.connected {
            return Ok(());
        }
        self.monitor.play()
    }

    pub fn is_monitoring(&self) -> bool {
        self.connected && self.monitor.is_playing()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn frames_routed(&self) -> u64 {
        self.frames_routed
    }

    /// Disconnect every node and release the output. Idempotent.
    pub fn close(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        self.monitor.close();

        info!(
            "Audio graph {} closed after {} frames",
            self.id, self.frames_routed
        );
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        if self.connected {
            warn!("Audio graph {} dropped while connected", self.id);
            self.close();
        }
    }
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::events::{SessionEventSink, STATUS_PAUSED, STATUS_RECORDING, STATUS_SAVED, STATUS_STOPPED};
use super::state::{ControlSet, SessionState};
use super::stats::SessionStats;
use super::timer::ElapsedTimer;
use crate::artifact::{ArtifactSink, RecordingArtifact};
use crate::audio::graph::clamp_gain;
use crate::audio::{AudioFrame, AudioGraph, CaptureDevice, DeviceProvider, OutputProvider, WavEncoder};
use crate::error::RecorderError;
use crate::visualizer::{CanvasTarget, Visualizer};

/// A recording session: owns the capture device, the audio graph, the
/// encoder and the elapsed timer, and moves them through
/// Idle -> Recording <-> Paused -> Stopped.
///
/// Captured frames queue up in a channel until [`pump`](Self::pump) routes
/// them, so the session is the only writer to the graph and the encoder.
pub struct RecordingSession {
    config: SessionConfig,
    /// Where capture devices are requested on each start
    devices: Arc<dyn DeviceProvider>,
    /// Audio context each graph opens its monitor on
    outputs: Arc<dyn OutputProvider>,
    /// Drawing surface of the waveform display
    canvas: Arc<dyn CanvasTarget>,
    /// Receives status, controls and elapsed-time notifications
    sink: Arc<dyn SessionEventSink>,

    state: SessionState,
    /// Held from a successful start until stop
    device: Option<Box<dyn CaptureDevice>>,
    /// Frames captured but not yet routed by `pump`
    frames: Option<mpsc::Receiver<AudioFrame>>,
    /// Live graph; `None` outside Recording and Paused
    graph: Option<AudioGraph>,
    encoder: WavEncoder,
    visualizer: Visualizer,
    /// Recorded time, pauses excluded
    timer: ElapsedTimer,

    /// Operator gain, carried over to every new graph
    gain: f32,
    /// Result of the last stop, kept until the next successful start
    artifact: Option<RecordingArtifact>,
    /// Wall-clock start of the current or last recording
    started_at: Option<DateTime<Utc>>,
    /// Frame count of the last closed graph, reported once it is gone
    frames_routed: u64,
}

impl RecordingSession {
    pub fn new(
        config: SessionConfig,
        devices: Arc<dyn DeviceProvider>,
        outputs: Arc<dyn OutputProvider>,
        canvas: Arc<dyn CanvasTarget>,
        sink: Arc<dyn SessionEventSink>,
    ) -> Self {
        info!(
            "Creating recording session {} (devices: {}, monitor: {})",
            config.session_id,
            devices.name(),
            outputs.name()
        );

        let session = Self {
            encoder: WavEncoder::new(config.encoder_config()),
            visualizer: Visualizer::new(&config.visualizer),
            timer: ElapsedTimer::new(Arc::clone(&sink)),
            gain: clamp_gain(config.initial_gain),
            config,
            devices,
            outputs,
            canvas,
            sink,
            state: SessionState::Idle,
            device: None,
            frames: None,
            graph: None,
            artifact: None,
            started_at: None,
            frames_routed: 0,
        };
        session.sink.on_controls_changed(&session.state.controls());
        session
    }

    /// Acquire a device and start recording.
    ///
    /// Does nothing while a recording is in progress. If the device cannot
    /// be acquired or the graph cannot be built, the error is reported and
    /// the session stays where it was.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        if self.state.is_active() {
            warn!("Recording already in progress ({})", self.state);
            return Ok(());
        }

        info!("Starting recording session: {}", self.config.session_id);

        let mut device = match self.devices.request_device(&self.config.constraints).await {
            Ok(device) => device,
            Err(e) => {
                warn!("Device request failed: {}", e);
                self.report_error(&e);
                return Err(e);
            }
        };

        let Some(frames) = device.take_frames() else {
            device.stop();
            let e = RecorderError::DeviceUnavailable(format!("{} has no audio stream", device.name()));
            self.report_error(&e);
            return Err(e);
        };

        let graph = match AudioGraph::open(device.as_ref(), self.outputs.as_ref(), self.gain) {
            Ok(graph) => graph,
            Err(e) => {
                error!("Failed to open audio graph: {}", e);
                device.stop();
                let e = match e {
                    RecorderError::GraphInit(_) => e,
                    other => RecorderError::GraphInit(other.to_string()),
                };
                self.report_error(&e);
                return Err(e);
            }
        };

        if let Some(previous) = self.artifact.take() {
            debug!("Discarding previous recording ({} bytes)", previous.len());
        }

        let (sample_rate, channels) = device.format();
        self.encoder.start(sample_rate, channels);
        self.visualizer.start(graph.tap_for_analysis(), Arc::clone(&self.canvas));
        self.timer.start();

        self.device = Some(device);
        self.frames = Some(frames);
        self.graph = Some(graph);
        self.started_at = Some(Utc::now());
        self.frames_routed = 0;

        self.transition(SessionState::Recording, STATUS_RECORDING);
        self.sink.on_duration(0);
        Ok(())
    }

    /// Pause the recording. No-op unless recording.
    pub fn pause(&mut self) -> Result<(), RecorderError> {
        if self.state != SessionState::Recording {
            debug!("Ignoring pause while {}", self.state);
            return Ok(());
        }

        self.pump();
        if self.state != SessionState::Recording {
            return Ok(());
        }

        if let Some(graph) = self.graph.as_mut() {
            if let Err(e) = graph.pause_monitor() {
                error!("Failed to pause monitor: {}", e);
                self.report_error(&e);
                return Err(e);
            }
        }

        self.encoder.pause();
        self.timer.pause();

        info!("Recording paused at {:?}", self.timer.elapsed());
        self.transition(SessionState::Paused, STATUS_PAUSED);
        self.sink.on_duration(self.elapsed().as_secs());
        Ok(())
    }

    /// Resume a paused recording. No-op unless paused.
    pub fn resume(&mut self) -> Result<(), RecorderError> {
        if self.state != SessionState::Paused {
            debug!("Ignoring resume while {}", self.state);
            return Ok(());
        }

        // Audio captured during the pause reaches the graph but not the encoder
        self.pump();
        if self.state != SessionState::Paused {
            return Ok(());
        }

        if let Some(graph) = self.graph.as_mut() {
            if let Err(e) = graph.resume_monitor() {
                error!("Failed to resume monitor: {}", e);
                self.report_error(&e);
                return Err(e);
            }
        }

        self.encoder.resume();
        self.timer.resume();
        self.sink.on_duration(self.elapsed().as_secs());

        info!("Recording resumed");
        self.transition(SessionState::Recording, STATUS_RECORDING);
        Ok(())
    }

    /// Finish the recording and produce the artifact. No-op unless
    /// recording or paused.
    pub fn stop(&mut self) -> Result<(), RecorderError> {
        if !self.state.is_active() {
            debug!("Ignoring stop while {}", self.state);
            return Ok(());
        }

        self.route_pending();

        let recording = match self.encoder.stop() {
            Ok(recording) => recording,
            Err(e) => {
                error!("Failed to finalize recording: {}", e);
                self.report_error(&e);
                return Err(e);
            }
        };

        self.release();

        let artifact = RecordingArtifact::new(recording, Utc::now());
        info!(
            "Recording stopped: {:.1}s of audio, {} bytes",
            artifact.duration().as_secs_f64(),
            artifact.len()
        );
        self.artifact = Some(artifact);

        self.sink.on_duration(self.elapsed().as_secs());
        self.transition(SessionState::Stopped, STATUS_STOPPED);
        Ok(())
    }

    /// Route every frame captured so far. Returns the number routed.
    ///
    /// Frames always reach the graph; they reach the encoder only while
    /// recording. If the device has gone away the recording is stopped and
    /// whatever was captured is kept.
    pub fn pump(&mut self) -> usize {
        let (routed, disconnected) = self.route_pending();

        if disconnected && self.state.is_active() {
            warn!("Capture device disconnected while {}", self.state);
            if self.stop().is_ok() {
                self.report_error(&RecorderError::DeviceLost);
            }
        }

        routed
    }

    /// Set the monitor gain. Applies to the live graph immediately and to
    /// every graph opened later. Returns the effective value.
    pub fn set_gain(&mut self, value: f32) -> f32 {
        self.gain = clamp_gain(value);
        if let Some(graph) = self.graph.as_mut() {
            graph.set_gain(self.gain);
        }
        debug!("Gain set to {:.2}", self.gain);
        self.gain
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Hand the finished recording to `sink` under its suggested filename
    pub fn save(&self, sink: &dyn ArtifactSink) -> Result<PathBuf> {
        let Some(artifact) = &self.artifact else {
            anyhow::bail!("No finished recording to save");
        };

        match sink.save(artifact.data(), &artifact.suggested_filename()) {
            Ok(path) => {
                self.sink.on_status(STATUS_SAVED);
                Ok(path)
            }
            Err(e) => {
                self.sink.on_status(&format!("Error: {:#}", e));
                Err(e)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn controls(&self) -> ControlSet {
        self.state.controls()
    }

    /// The finished recording, once stopped
    pub fn artifact(&self) -> Option<&RecordingArtifact> {
        self.artifact.as_ref()
    }

    /// The live graph, while recording or paused
    pub fn graph(&self) -> Option<&AudioGraph> {
        self.graph.as_ref()
    }

    pub fn encoder(&self) -> &WavEncoder {
        &self.encoder
    }

    pub fn is_visualizing(&self) -> bool {
        self.visualizer.is_running()
    }

    /// Time spent recording, pauses excluded
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.config.session_id.clone(),
            state: self.state,
            started_at: self.started_at,
            elapsed_secs: self.elapsed().as_secs_f64(),
            chunks_count: self.encoder.chunk_count(),
            frames_routed: self
                .graph
                .as_ref()
                .map(|g| g.frames_routed())
                .unwrap_or(self.frames_routed),
            gain: self.gain,
            device: self.graph.as_ref().map(|g| g.source().device_name.clone()),
            artifact_bytes: self.artifact.as_ref().map(|a| a.len()),
            stopped_at: self.artifact.as_ref().map(|a| a.stopped_at()),
        }
    }

    fn route_pending(&mut self) -> (usize, bool) {
        let Some(frames) = self.frames.as_mut() else {
            return (0, false);
        };

        let mut routed = 0;
        loop {
            match frames.try_recv() {
                Ok(frame) => {
                    if let Some(graph) = self.graph.as_mut() {
                        graph.process(&frame);
                    }
                    if self.state == SessionState::Recording {
                        self.encoder.append(&frame);
                    }
                    routed += 1;
                }
                Err(TryRecvError::Empty) => return (routed, false),
                Err(TryRecvError::Disconnected) => return (routed, true),
            }
        }
    }

    /// Tear down the live side: timer, redraw loop, graph, then the device
    fn release(&mut self) {
        self.timer.stop();
        self.visualizer.stop();

        if let Some(mut graph) = self.graph.take() {
            self.frames_routed = graph.frames_routed();
            graph.close();
        }
        self.frames = None;

        if let Some(mut device) = self.device.take() {
            device.stop();
        }
    }

    fn transition(&mut self, to: SessionState, status: &str) {
        debug!("Session {}: {} -> {}", self.config.session_id, self.state, to);
        self.state = to;
        self.sink.on_status(status);
        self.sink.on_controls_changed(&self.state.controls());
    }

    fn report_error(&self, err: &RecorderError) {
        self.sink.on_status(&err.status_text());
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.state.is_active() {
            warn!(
                "Session {} dropped while {}; releasing device",
                self.config.session_id, self.state
            );
        }
        self.release();
    }
}

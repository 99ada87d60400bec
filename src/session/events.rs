//! Session notifications.
//!
//! [`RecordingSession`](super::RecordingSession) reports every transition to
//! a [`SessionEventSink`]. The sink is the UI boundary: it shows the status
//! line, the elapsed time, and which buttons are enabled.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::state::ControlSet;

pub const STATUS_RECORDING: &str = "Recording...";
pub const STATUS_PAUSED: &str = "Recording Paused";
pub const STATUS_STOPPED: &str = "Recording Stopped";
pub const STATUS_SAVED: &str = "Recording Saved";
pub const STATUS_PLAYING: &str = "Playing...";
pub const STATUS_PLAYBACK_PAUSED: &str = "Playback Paused";
pub const STATUS_PLAYBACK_ENDED: &str = "Playback Ended";

/// Receiver of session notifications.
///
/// Called synchronously from the session, and from the elapsed-time ticker
/// task for duration updates, so implementations must be quick.
pub trait SessionEventSink: Send + Sync {
    fn on_status(&self, text: &str);

    /// Recorded time in whole seconds
    fn on_duration(&self, seconds: u64);

    fn on_controls_changed(&self, enabled: &ControlSet);
}

/// A notification as a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Status { text: String },
    Duration { seconds: u64 },
    Controls { enabled: ControlSet },
}

/// Logs notifications through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SessionEventSink for TracingSink {
    fn on_status(&self, text: &str) {
        info!(status = text, "Session status");
    }

    fn on_duration(&self, seconds: u64) {
        info!("Elapsed {:02}:{:02}", seconds / 60, seconds % 60);
    }

    fn on_controls_changed(&self, enabled: &ControlSet) {
        info!("Enabled controls: {}", enabled);
    }
}

/// Forwards notifications into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SessionEvent) {
        // Nobody listening is not an error for the session
        let _ = self.tx.send(event);
    }
}

impl SessionEventSink for ChannelSink {
    fn on_status(&self, text: &str) {
        self.send(SessionEvent::Status {
            text: text.to_string(),
        });
    }

    fn on_duration(&self, seconds: u64) {
        self.send(SessionEvent::Duration { seconds });
    }

    fn on_controls_changed(&self, enabled: &ControlSet) {
        self.send(SessionEvent::Controls {
            enabled: enabled.clone(),
        });
    }
}

/// Writes each notification as one JSON object per line
pub struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, event: &SessionEvent) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let result = serde_json::to_string(event)
            .map_err(std::io::Error::from)
            .and_then(|line| {
                writeln!(out, "{}", line)?;
                out.flush()
            });
        if let Err(e) = result {
            warn!("Failed to write session event: {}", e);
        }
    }
}

impl<W: Write + Send> SessionEventSink for JsonLinesSink<W> {
    fn on_status(&self, text: &str) {
        self.write(&SessionEvent::Status {
            text: text.to_string(),
        });
    }

    fn on_duration(&self, seconds: u64) {
        self.write(&SessionEvent::Duration { seconds });
    }

    fn on_controls_changed(&self, enabled: &ControlSet) {
        self.write(&SessionEvent::Controls {
            enabled: enabled.clone(),
        });
    }
}

/// Keeps every notification in memory. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.lock().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Status { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses().pop()
    }

    pub fn durations(&self) -> Vec<u64> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Duration { seconds } => Some(*seconds),
                _ => None,
            })
            .collect()
    }

    pub fn last_controls(&self) -> Option<ControlSet> {
        self.lock().iter().rev().find_map(|e| match e {
            SessionEvent::Controls { enabled } => Some(enabled.clone()),
            _ => None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SessionEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: SessionEvent) {
        self.lock().push(event);
    }
}

impl SessionEventSink for MemorySink {
    fn on_status(&self, text: &str) {
        self.push(SessionEvent::Status {
            text: text.to_string(),
        });
    }

    fn on_duration(&self, seconds: u64) {
        self.push(SessionEvent::Duration { seconds });
    }

    fn on_controls_changed(&self, enabled: &ControlSet) {
        self.push(SessionEvent::Controls {
            enabled: enabled.clone(),
        });
    }
}

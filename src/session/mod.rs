//! Recording session management
//!
//! This module provides the `RecordingSession` state machine and what it
//! reports to the outside world:
//! - Session states and the controls enabled in each
//! - Status, duration and control notifications (`SessionEventSink`)
//! - Elapsed recording time, pauses excluded
//! - Session configuration and statistics

mod config;
mod events;
mod session;
mod state;
mod stats;
mod timer;

pub use config::SessionConfig;
pub use events::{
    ChannelSink, JsonLinesSink, MemorySink, SessionEvent, SessionEventSink, TracingSink,
    STATUS_PAUSED, STATUS_PLAYBACK_ENDED, STATUS_PLAYBACK_PAUSED, STATUS_PLAYING,
    STATUS_RECORDING, STATUS_SAVED, STATUS_STOPPED,
};
pub use session::RecordingSession;
pub use state::{Control, ControlSet, SessionState};
pub use stats::SessionStats;
pub use timer::ElapsedTimer;

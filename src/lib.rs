pub mod artifact;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod session;
pub mod visualizer;

pub use artifact::{ArtifactSink, DirectorySink, RecordingArtifact};
pub use audio::{
    AnalysisHandle, AudioFile, AudioFrame, AudioGraph, CaptureConstraints, CaptureDevice,
    DeviceProvider, MonitorOutput, OutputProvider, WavEncoder,
};
pub use config::Config;
pub use error::RecorderError;
pub use playback::{PlaybackEvent, PlaybackReview};
pub use session::{
    Control, ControlSet, RecordingSession, SessionConfig, SessionEventSink, SessionState,
    SessionStats,
};
pub use visualizer::{CanvasTarget, PathCanvas, Visualizer};

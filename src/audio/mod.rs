pub mod analysis;
pub mod backend;
pub mod encoder;
pub mod file;
pub mod graph;
pub mod mock;
pub mod monitor;
pub mod tone;

#[cfg(feature = "cpal")]
pub mod device;

pub use analysis::{AnalysisHandle, AnalysisTap, WINDOW_SIZE};
pub use backend::{AudioFrame, CaptureConstraints, CaptureDevice, DeviceProvider};
pub use encoder::{EncodedChunk, EncodedRecording, EncoderConfig, EncoderState, WavEncoder, WAV_MIME};
pub use file::AudioFile;
pub use graph::{AudioGraph, GainNode, SourceNode};
pub use monitor::{MonitorOutput, NullOutputProvider, OutputProvider};
pub use tone::ToneDeviceProvider;

#[cfg(feature = "cpal")]
pub use device::CpalDeviceProvider;
#[cfg(feature = "cpal")]
pub use monitor::CpalOutputProvider;

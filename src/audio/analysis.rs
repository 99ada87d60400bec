//! Analysis tap for visualization.
//!
//! The tap keeps the most recent [`WINDOW_SIZE`] samples of the capture,
//! down-mixed to mono and quantized to the 8-bit time domain (silence is
//! 128). Readers get snapshots through a [`watch`] channel, so the tap is
//! never blocked by a slow or absent reader.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::watch;

/// Samples per analysis snapshot
pub const WINDOW_SIZE: usize = 2048;

/// 8-bit value of a silent sample
pub const SILENCE: u8 = 128;

/// Writer side, owned by the audio graph.
pub struct AnalysisTap {
    window: VecDeque<u8>,
    publisher: watch::Sender<Arc<[u8]>>,
}

/// Read-only view of the tap handed to the visualizer.
#[derive(Clone)]
pub struct AnalysisHandle {
    snapshots: watch::Receiver<Arc<[u8]>>,
}

impl AnalysisTap {
    pub fn new() -> Self {
        let window: VecDeque<u8> = std::iter::repeat(SILENCE).take(WINDOW_SIZE).collect();
        let initial: Arc<[u8]> = window.iter().copied().collect();
        let (publisher, _) = watch::channel(initial);

        Self { window, publisher }
    }

    /// Create another read-only handle
    pub fn handle(&self) -> AnalysisHandle {
        AnalysisHandle {
            snapshots: self.publisher.subscribe(),
        }
    }

    /// Feed interleaved samples and publish a fresh snapshot
    pub fn push(&mut self, samples: &[i16], channels: u16) {
        let channels = channels.max(1) as usize;
        if samples.len() < channels {
            return;
        }

        for frame in samples.chunks_exact(channels) {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            let mono = sum / channels as i32;
            if self.window.len() == WINDOW_SIZE {
                self.window.pop_front();
            }
            self.window.push_back(to_byte(mono as i16));
        }

        let snapshot: Arc<[u8]> = self.window.iter().copied().collect();
        self.publisher.send_replace(snapshot);
    }

}

impl Default for AnalysisTap {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisHandle {
    /// Latest time-domain window, always [`WINDOW_SIZE`] samples long
    pub fn snapshot(&self) -> Arc<[u8]> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// True once the tap has been torn down. The last snapshot stays readable.
    pub fn is_closed(&self) -> bool {
        self.snapshots.has_changed().is_err()
    }
}

/// Quantize a PCM sample to the unsigned 8-bit time domain
pub fn to_byte(sample: i16) -> u8 {
    let normalized = sample as f32 / 32768.0;
    (normalized * 128.0 + 128.0).clamp(0.0, 255.0) as u8
}

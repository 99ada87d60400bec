use std::io::Cursor;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::backend::AudioFrame;
use crate::error::RecorderError;

/// MIME tag of the finished recording
pub const WAV_MIME: &str = "audio/wav";

/// Longest accepted chunk (one hour)
pub const MAX_TIMESLICE_MS: u64 = 3_600_000;

/// Encoder configuration
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Length of audio collected into each chunk before it is sealed
    /// (default: 1000 ms)
    pub timeslice_ms: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self { timeslice_ms: 1000 }
    }
}

/// Encoder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Inactive,
    Recording,
    Paused,
}

/// One sealed fragment of the recording
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    /// Chunk number (0-indexed)
    pub index: usize,
    /// 16-bit little-endian PCM, interleaved
    pub data: Vec<u8>,
    /// Start on the recorded timeline in milliseconds (pauses excluded)
    pub start_ms: u64,
    /// End on the recorded timeline in milliseconds
    pub end_ms: u64,
    /// Number of sample frames in this chunk
    pub frame_count: usize,
}

/// Output of [`WavEncoder::stop`]: every chunk joined into one WAV blob
#[derive(Debug, Clone)]
pub struct EncodedRecording {
    pub data: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_count: u64,
    pub chunk_count: usize,
}

impl EncodedRecording {
    pub fn duration(&self) -> Duration {
        frames_to_duration(self.frame_count, self.sample_rate)
    }
}

/// WAV encoder for the capture path.
///
/// Frames are accepted only while recording. They are gathered into
/// timeslice-sized chunks; the chunk sequence is append-only and becomes
/// the final blob at [`stop`](WavEncoder::stop).
pub struct WavEncoder {
    config: EncoderConfig,
    state: EncoderState,
    sample_rate: u32,
    channels: u16,
    pending: Vec<i16>,
    chunks: Vec<EncodedChunk>,
    sealed_frames: u64,
}

impl WavEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            state: EncoderState::Inactive,
            sample_rate: 0,
            channels: 0,
            pending: Vec::new(),
            chunks: Vec::new(),
            sealed_frames: 0,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Begin a new recording, discarding anything left from a previous one
    pub fn start(&mut self, sample_rate: u32, channels: u16) {
        if self.state != EncoderState::Inactive {
            warn!("Encoder restarted while {:?}; dropping unfinished recording", self.state);
        }

        self.sample_rate = sample_rate;
        self.channels = channels.max(1);
        self.pending.clear();
        self.chunks.clear();
        self.sealed_frames = 0;
        self.state = EncoderState::Recording;

        info!(
            "Encoder started: {}Hz, {} channels, {}ms chunks",
            sample_rate, self.channels, self.config.timeslice_ms
        );
    }

    /// Stop accepting frames and seal what has been collected
    pub fn pause(&mut self) {
        if self.state == EncoderState::Recording {
            self.seal_chunk();
            self.state = EncoderState::Paused;
            debug!("Encoder paused at {:?}", self.recorded_duration());
        }
    }

    pub fn resume(&mut self) {
        if self.state == EncoderState::Paused {
            self.state = EncoderState::Recording;
            debug!("Encoder resumed");
        }
    }

    /// Append a captured frame. Returns `false` if the frame was not taken.
    pub fn append(&mut self, frame: &AudioFrame) -> bool {
        if self.state != EncoderState::Recording {
            return false;
        }

        if frame.sample_rate != self.sample_rate || frame.channels != self.channels {
            warn!(
                "Dropping frame in unexpected format {}Hz/{}ch (recording {}Hz/{}ch)",
                frame.sample_rate, frame.channels, self.sample_rate, self.channels
            );
            return false;
        }

        self.pending.extend_from_slice(&frame.samples);
        if self.pending_frames() >= self.timeslice_frames() {
            self.seal_chunk();
        }

        true
    }

    /// Finish the recording and join the chunk sequence into one WAV blob
    pub fn stop(&mut self) -> Result<EncodedRecording, RecorderError> {
        if self.state == EncoderState::Inactive {
            return Err(RecorderError::Encoder("encoder is not running".to_string()));
        }

        self.seal_chunk();

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for chunk in &self.chunks {
                for bytes in chunk.data.chunks_exact(2) {
                    writer.write_sample(i16::from_le_bytes([bytes[0], bytes[1]]))?;
                }
            }
            writer.finalize()?;
        }

        let recording = EncodedRecording {
            data: cursor.into_inner(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_count: self.sealed_frames,
            chunk_count: self.chunks.len(),
        };

        self.chunks.clear();
        self.state = EncoderState::Inactive;

        info!(
            "Encoder stopped: {:.1}s in {} chunks ({} bytes)",
            recording.duration().as_secs_f64(),
            recording.chunk_count,
            recording.data.len()
        );

        Ok(recording)
    }

    /// Sealed chunks so far
    pub fn chunks(&self) -> &[EncodedChunk] {
        &self.chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Audio accepted so far, sealed or not
    pub fn recorded_duration(&self) -> Duration {
        frames_to_duration(
            self.sealed_frames + self.pending_frames() as u64,
            self.sample_rate,
        )
    }

    fn pending_frames(&self) -> usize {
        self.pending.len() / self.channels.max(1) as usize
    }

    fn timeslice_frames(&self) -> usize {
        let frames = (self.sample_rate as u64).saturating_mul(self.config.timeslice_ms) / 1000;
        usize::try_from(frames).unwrap_or(usize::MAX).max(1)
    }

    fn seal_chunk(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let frame_count = self.pending_frames();
        let start_ms = frames_to_duration(self.sealed_frames, self.sample_rate).as_millis() as u64;
        self.sealed_frames += frame_count as u64;
        let end_ms = frames_to_duration(self.sealed_frames, self.sample_rate).as_millis() as u64;

        let data: Vec<u8> = self.pending.drain(..).flat_map(|s| s.to_le_bytes()).collect();
        let chunk = EncodedChunk {
            index: self.chunks.len(),
            data,
            start_ms,
            end_ms,
            frame_count,
        };

        debug!(
            "Chunk {} sealed: {:.1}s - {:.1}s ({} frames)",
            chunk.index,
            chunk.start_ms as f64 / 1000.0,
            chunk.end_ms as f64 / 1000.0,
            chunk.frame_count
        );
        self.chunks.push(chunk);
    }
}

impl Default for WavEncoder {
    fn default() -> Self {
        Self::new(EncoderConfig::default())
    }
}

fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = frames as u128 * 1_000_000_000 / sample_rate as u128;
    Duration::from_nanos(nanos as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(frames: usize, channels: u16) -> AudioFrame {
        AudioFrame {
            samples: vec![1000; frames * channels as usize],
            sample_rate: 1000,
            channels,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_inactive_encoder_rejects_frames() {
        let mut encoder = WavEncoder::default();
        assert!(!encoder.append(&frame(10, 1)));
        assert!(encoder.stop().is_err());
    }

    #[test]
    fn test_chunks_follow_timeslice() {
        let mut encoder = WavEncoder::new(EncoderConfig { timeslice_ms: 100 });
        encoder.start(1000, 1);

        // 100 frames per chunk at 1kHz
        for _ in 0..5 {
            encoder.append(&frame(50, 1));
        }

        assert_eq!(encoder.chunk_count(), 2);
        assert_eq!(encoder.chunks()[0].frame_count, 100);
        assert_eq!(encoder.chunks()[1].start_ms, 100);
        assert_eq!(encoder.recorded_duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_paused_encoder_does_not_grow() {
        let mut encoder = WavEncoder::new(EncoderConfig { timeslice_ms: 1000 });
        encoder.start(1000, 2);
        encoder.append(&frame(200, 2));
        encoder.pause();

        let chunks_before = encoder.chunk_count();
        assert!(!encoder.append(&frame(500, 2)));
        assert_eq!(encoder.chunk_count(), chunks_before);

        encoder.resume();
        assert!(encoder.append(&frame(300, 2)));

        let recording = encoder.stop().unwrap();
        assert_eq!(recording.frame_count, 500);
        assert_eq!(recording.duration(), Duration::from_millis(500));
        assert_eq!(encoder.state(), EncoderState::Inactive);
    }

    #[test]
    fn test_huge_timeslice_keeps_one_open_chunk() {
        let mut encoder = WavEncoder::new(EncoderConfig {
            timeslice_ms: u64::MAX / 1000,
        });
        encoder.start(44100, 1);

        assert!(encoder.append(&AudioFrame {
            samples: vec![0; 10],
            sample_rate: 44100,
            channels: 1,
            timestamp_ms: 0,
        }));
        assert_eq!(encoder.chunk_count(), 0);
        assert_eq!(encoder.stop().unwrap().frame_count, 10);
    }

    #[test]
    fn test_format_mismatch_is_dropped() {
        let mut encoder = WavEncoder::default();
        encoder.start(1000, 2);
        assert!(!encoder.append(&frame(10, 1)));
    }

    #[test]
    fn test_stop_produces_readable_wav() {
        let mut encoder = WavEncoder::default();
        encoder.start(1000, 1);
        encoder.append(&AudioFrame {
            samples: vec![1, -2, 3],
            sample_rate: 1000,
            channels: 1,
            timestamp_ms: 0,
        });

        let recording = encoder.stop().unwrap();
        let reader = hound::WavReader::new(Cursor::new(recording.data)).unwrap();
        assert_eq!(reader.spec().sample_rate, 1000);
        assert_eq!(reader.spec().channels, 1);

        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, -2, 3]);
    }
}

//! Review of a finished recording.
//!
//! Independent of the live session: it only reads the artifact. Play always
//! starts from the beginning; the output is paced in real time and an
//! `Ended` event fires when the audio runs out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::artifact::RecordingArtifact;
use crate::audio::{AudioFile, MonitorOutput, OutputProvider};
use crate::error::RecorderError;
use crate::session::{STATUS_PLAYBACK_ENDED, STATUS_PLAYBACK_PAUSED, STATUS_PLAYING};

const BLOCK_MS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Playing,
    Paused,
    Ended,
}

impl PlaybackEvent {
    pub fn status(self) -> &'static str {
        match self {
            PlaybackEvent::Playing => STATUS_PLAYING,
            PlaybackEvent::Paused => STATUS_PLAYBACK_PAUSED,
            PlaybackEvent::Ended => STATUS_PLAYBACK_ENDED,
        }
    }
}

pub type PlaybackCallback = Arc<dyn Fn(PlaybackEvent) + Send + Sync>;

pub struct PlaybackReview {
    audio: Arc<AudioFile>,
    outputs: Arc<dyn OutputProvider>,
    on_event: PlaybackCallback,
    playing: Arc<AtomicBool>,
    running: Option<Running>,
}

struct Running {
    cancel: CancellationToken,
    emit: Arc<Mutex<()>>,
    task: JoinHandle<()>,
}

impl PlaybackReview {
    pub fn new(
        artifact: &RecordingArtifact,
        outputs: Arc<dyn OutputProvider>,
        on_event: PlaybackCallback,
    ) -> Result<Self, RecorderError> {
        let audio = AudioFile::from_wav_bytes(artifact.data())
            .map_err(|e| RecorderError::Playback(format!("{:#}", e)))?;

        Ok(Self {
            audio: Arc::new(audio),
            outputs,
            on_event,
            playing: Arc::new(AtomicBool::new(false)),
            running: None,
        })
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn duration(&self) -> Duration {
        self.audio.duration()
    }

    /// Play from the start if stopped, pause if playing
    pub fn toggle(&mut self) -> Result<PlaybackEvent, RecorderError> {
        if self.is_playing() {
            self.pause();
            Ok(PlaybackEvent::Paused)
        } else {
            self.play()?;
            Ok(PlaybackEvent::Playing)
        }
    }

    pub fn play(&mut self) -> Result<(), RecorderError> {
        self.halt();

        let mut output = self
            .outputs
            .open_output(self.audio.sample_rate, self.audio.channels)
            .map_err(|e| RecorderError::Playback(e.to_string()))?;
        output
            .play()
            .map_err(|e| RecorderError::Playback(e.to_string()))?;

        let cancel = CancellationToken::new();
        let emit = Arc::new(Mutex::new(()));
        let token = cancel.clone();
        let lock = Arc::clone(&emit);
        let audio = Arc::clone(&self.audio);
        let playing = Arc::clone(&self.playing);
        let on_event = Arc::clone(&self.on_event);

        self.playing.store(true, Ordering::SeqCst);
        (self.on_event)(PlaybackEvent::Playing);
        info!("Playback started ({:.1}s)", audio.duration().as_secs_f64());

        let task = tokio::spawn(async move {
            let finished = feed_output(&audio, output.as_mut(), &token).await;
            output.close();

            if finished {
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                if !token.is_cancelled() {
                    playing.store(false, Ordering::SeqCst);
                    on_event(PlaybackEvent::Ended);
                    info!("Playback ended");
                }
            }
        });

        self.running = Some(Running { cancel, emit, task });
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.halt() {
            (self.on_event)(PlaybackEvent::Paused);
            info!("Playback paused");
        }
    }

    /// Cancel the running playback. Returns whether it was still playing.
    fn halt(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            return false;
        };

        let guard = running.emit.lock().unwrap_or_else(PoisonError::into_inner);
        running.cancel.cancel();
        let was_playing = self.playing.swap(false, Ordering::SeqCst);
        drop(guard);
        drop(running.task);
        debug!("Playback halted (was playing: {})", was_playing);
        was_playing
    }
}

impl Drop for PlaybackReview {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Write the audio in real-time blocks. Returns false if cancelled first.
async fn feed_output(
    audio: &AudioFile,
    output: &mut dyn MonitorOutput,
    token: &CancellationToken,
) -> bool {
    let channels = audio.channels.max(1) as usize;
    let block = ((audio.sample_rate as u64 * BLOCK_MS / 1000) as usize).max(1) * channels;
    let mut ticker = tokio::time::interval(Duration::from_millis(BLOCK_MS));

    for samples in audio.samples.chunks(block) {
        tokio::select! {
            biased;
            _ = token.cancelled() => return false,
            _ = ticker.tick() => output.write(samples),
        }
    }

    // Let the last block play out
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = ticker.tick() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockOutputProvider;
    use crate::audio::EncodedRecording;

    fn artifact(frames: usize) -> RecordingArtifact {
        let mut encoder = crate::audio::WavEncoder::default();
        encoder.start(1000, 1);
        encoder.append(&crate::audio::AudioFrame {
            samples: (0..frames as i16).collect(),
            sample_rate: 1000,
            channels: 1,
            timestamp_ms: 0,
        });
        let recording: EncodedRecording = encoder.stop().unwrap();
        RecordingArtifact::new(recording, chrono::Utc::now())
    }

    fn recorder() -> (PlaybackCallback, Arc<Mutex<Vec<PlaybackEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&events);
        let callback: PlaybackCallback = Arc::new(move |e: PlaybackEvent| log.lock().unwrap().push(e));
        (callback, events)
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_to_end() {
        let outputs = MockOutputProvider::new();
        let (callback, events) = recorder();
        let mut review = PlaybackReview::new(&artifact(100), Arc::new(outputs.clone()), callback).unwrap();

        assert_eq!(review.toggle().unwrap(), PlaybackEvent::Playing);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(!review.is_playing());
        assert_eq!(outputs.written(), (0..100).collect::<Vec<i16>>());
        assert!(outputs.all_closed());
        assert_eq!(
            *events.lock().unwrap(),
            vec![PlaybackEvent::Playing, PlaybackEvent::Ended]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_pauses_without_ended() {
        let outputs = MockOutputProvider::new();
        let (callback, events) = recorder();
        let mut review = PlaybackReview::new(&artifact(1000), Arc::new(outputs), callback).unwrap();

        review.toggle().unwrap();
        tokio::time::sleep(Duration::from_millis(105)).await;
        assert_eq!(review.toggle().unwrap(), PlaybackEvent::Paused);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(
            *events.lock().unwrap(),
            vec![PlaybackEvent::Playing, PlaybackEvent::Paused]
        );
    }

    #[test]
    fn test_rejects_garbage() {
        let recording = EncodedRecording {
            data: vec![0, 1, 2, 3],
            sample_rate: 1000,
            channels: 1,
            frame_count: 0,
            chunk_count: 0,
        };
        let artifact = RecordingArtifact::new(recording, chrono::Utc::now());
        let (callback, _) = recorder();

        let result = PlaybackReview::new(&artifact, Arc::new(MockOutputProvider::new()), callback);
        assert!(matches!(result, Err(RecorderError::Playback(_))));
    }
}

//! Monitor playback outputs.
//!
//! The monitor path lets the operator hear the gain-adjusted capture live.
//! An [`OutputProvider`] plays the role of the audio processing context: if
//! it cannot open an output, the audio graph cannot be built.

use tracing::debug;

use crate::error::RecorderError;

/// A live playback stream fed with interleaved i16 samples.
pub trait MonitorOutput: Send {
    /// Queue samples for playback. Ignored while paused or closed.
    fn write(&mut self, samples: &[i16]);

    /// Start or resume playback
    fn play(&mut self) -> Result<(), RecorderError>;

    /// Pause playback and drop anything queued
    fn pause(&mut self) -> Result<(), RecorderError>;

    fn is_playing(&self) -> bool;

    /// Stop playback and release the stream. Idempotent.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Opens playback outputs for a given source format.
pub trait OutputProvider: Send + Sync {
    /// Open an output for `channels`-channel audio at `sample_rate`.
    ///
    /// The returned output is not playing yet.
    fn open_output(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn MonitorOutput>, RecorderError>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Output provider that discards everything it is given.
///
/// Used when no playback hardware is available or wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutputProvider;

impl OutputProvider for NullOutputProvider {
    fn open_output(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn MonitorOutput>, RecorderError> {
        debug!("Null output opened ({}Hz, {} channels)", sample_rate, channels);
        Ok(Box::new(NullOutput::default()))
    }

    fn name(&self) -> &str {
        "null"
    }
}

#[derive(Debug, Default)]
struct NullOutput {
    playing: bool,
    closed: bool,
}

impl MonitorOutput for NullOutput {
    fn write(&mut self, _samples: &[i16]) {}

    fn play(&mut self) -> Result<(), RecorderError> {
        if self.closed {
            return Err(RecorderError::Monitor("output is closed".to_string()));
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), RecorderError> {
        if self.closed {
            return Err(RecorderError::Monitor("output is closed".to_string()));
        }
        self.playing = false;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn close(&mut self) {
        self.playing = false;
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(feature = "cpal")]
pub use cpal_output::CpalOutputProvider;

#[cfg(feature = "cpal")]
mod cpal_output {
    use std::collections::VecDeque;
    use std::sync::mpsc as std_mpsc;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::thread::{self, JoinHandle};

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{FromSample, SampleFormat, SizedSample};
    use tracing::{error, info, warn};

    use super::{MonitorOutput, OutputProvider};
    use crate::error::RecorderError;

    /// Widest source layout mapped onto the output device
    const MAX_CHANNELS: usize = 8;

    type SharedQueue = Arc<Mutex<VecDeque<i16>>>;

    enum OutputCommand {
        Play,
        Pause,
        Close,
    }

    /// Plays monitor audio on a system output device.
    ///
    /// The cpal stream lives on its own thread; commands are sent over a
    /// channel and samples are handed over through a bounded queue.
    #[derive(Debug, Default, Clone)]
    pub struct CpalOutputProvider {
        device_name: Option<String>,
    }

    impl CpalOutputProvider {
        /// Use the default output device
        pub fn new() -> Self {
            Self::default()
        }

        /// Use the output device with this name
        pub fn with_device(mut self, name: impl Into<String>) -> Self {
            self.device_name = Some(name.into());
            self
        }
    }

    impl OutputProvider for CpalOutputProvider {
        fn open_output(
            &self,
            sample_rate: u32,
            channels: u16,
        ) -> Result<Box<dyn MonitorOutput>, RecorderError> {
            let queue: SharedQueue = Arc::new(Mutex::new(VecDeque::new()));
            let (command_tx, command_rx) = std_mpsc::channel();
            let (ready_tx, ready_rx) = std_mpsc::channel();

            let device_name = self.device_name.clone();
            let thread_queue = Arc::clone(&queue);
            let thread = thread::Builder::new()
                .name("monitor-output".to_string())
                .spawn(move || {
                    run_output_thread(
                        device_name,
                        sample_rate,
                        channels,
                        thread_queue,
                        command_rx,
                        ready_tx,
                    )
                })
                .map_err(|e| RecorderError::GraphInit(e.to_string()))?;

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Box::new(CpalOutput {
                    queue,
                    commands: command_tx,
                    thread: Some(thread),
                    // A quarter second of backlog at most
                    max_queued: (sample_rate as usize / 4) * channels.max(1) as usize,
                    playing: false,
                    closed: false,
                })),
                Ok(Err(e)) => {
                    let _ = thread.join();
                    Err(e)
                }
                Err(_) => Err(RecorderError::GraphInit(
                    "monitor output thread exited during setup".to_string(),
                )),
            }
        }

        fn name(&self) -> &str {
            "cpal"
        }
    }

    struct CpalOutput {
        queue: SharedQueue,
        commands: std_mpsc::Sender<OutputCommand>,
        thread: Option<JoinHandle<()>>,
        max_queued: usize,
        playing: bool,
        closed: bool,
    }

    impl CpalOutput {
        fn send(&self, command: OutputCommand) -> Result<(), RecorderError> {
            self.commands
                .send(command)
                .map_err(|_| RecorderError::Monitor("output thread has stopped".to_string()))
        }

        fn clear(&self) {
            self.queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }

    impl MonitorOutput for CpalOutput {
        fn write(&mut self, samples: &[i16]) {
            if !self.playing || self.closed {
                return;
            }

            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.extend(samples.iter().copied());

            // Drop the oldest audio rather than let monitor latency grow
            let overflow = queue.len().saturating_sub(self.max_queued);
            if overflow > 0 {
                queue.drain(..overflow);
            }
        }

        fn play(&mut self) -> Result<(), RecorderError> {
            if self.closed {
                return Err(RecorderError::Monitor("output is closed".to_string()));
            }
            self.send(OutputCommand::Play)?;
            self.playing = true;
            Ok(())
        }

        fn pause(&mut self) -> Result<(), RecorderError> {
            if self.closed {
                return Err(RecorderError::Monitor("output is closed".to_string()));
            }
            self.send(OutputCommand::Pause)?;
            self.playing = false;
            self.clear();
            Ok(())
        }

        fn is_playing(&self) -> bool {
            self.playing
        }

        fn close(&mut self) {
            if self.closed {
                return;
            }
            self.closed = true;
            self.playing = false;

            let _ = self.send(OutputCommand::Close);
            if let Some(thread) = self.thread.take() {
                if thread.join().is_err() {
                    warn!("Monitor output thread panicked");
                }
            }
            self.clear();
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    impl Drop for CpalOutput {
        fn drop(&mut self) {
            self.close();
        }
    }

    fn run_output_thread(
        device_name: Option<String>,
        sample_rate: u32,
        channels: u16,
        queue: SharedQueue,
        commands: std_mpsc::Receiver<OutputCommand>,
        ready: std_mpsc::Sender<Result<(), RecorderError>>,
    ) {
        let stream = match build_stream(device_name.as_deref(), sample_rate, channels, queue) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let _ = ready.send(Ok(()));

        while let Ok(command) = commands.recv() {
            match command {
                OutputCommand::Play => {
                    if let Err(e) = stream.play() {
                        error!("Failed to start monitor output: {}", e);
                    }
                }
                OutputCommand::Pause => {
                    if let Err(e) = stream.pause() {
                        error!("Failed to pause monitor output: {}", e);
                    }
                }
                OutputCommand::Close => break,
            }
        }

        info!("Monitor output closed");
    }

    fn build_stream(
        device_name: Option<&str>,
        sample_rate: u32,
        channels: u16,
        queue: SharedQueue,
    ) -> Result<cpal::Stream, RecorderError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| RecorderError::GraphInit(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| {
                    RecorderError::GraphInit(format!("output device '{}' not found", name))
                })?,
            None => host
                .default_output_device()
                .ok_or_else(|| RecorderError::GraphInit("no default output device".to_string()))?,
        };

        let supported = pick_config(&device, sample_rate, channels)?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        if config.sample_rate.0 != sample_rate {
            warn!(
                "Monitor output runs at {}Hz, source is {}Hz",
                config.sample_rate.0, sample_rate
            );
        }

        info!(
            "Monitor output: {} ({}Hz, {} channels, {:?})",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            config.sample_rate.0,
            config.channels,
            sample_format
        );

        let source_channels = channels.max(1) as usize;
        match sample_format {
            SampleFormat::I16 => build_typed::<i16>(&device, &config, queue, source_channels),
            SampleFormat::U16 => build_typed::<u16>(&device, &config, queue, source_channels),
            SampleFormat::F32 => build_typed::<f32>(&device, &config, queue, source_channels),
            other => Err(RecorderError::GraphInit(format!(
                "unsupported output sample format {:?}",
                other
            ))),
        }
    }

    fn pick_config(
        device: &cpal::Device,
        sample_rate: u32,
        channels: u16,
    ) -> Result<cpal::SupportedStreamConfig, RecorderError> {
        if let Ok(mut ranges) = device.supported_output_configs() {
            let matching = ranges.find(|range| {
                range.channels() == channels
                    && range.min_sample_rate().0 <= sample_rate
                    && sample_rate <= range.max_sample_rate().0
            });
            if let Some(range) = matching {
                return Ok(range.with_sample_rate(cpal::SampleRate(sample_rate)));
            }
        }

        device
            .default_output_config()
            .map_err(|e| RecorderError::GraphInit(e.to_string()))
    }

    fn build_typed<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        queue: SharedQueue,
        source_channels: usize,
    ) -> Result<cpal::Stream, RecorderError>
    where
        T: SizedSample + FromSample<i16>,
    {
        let output_channels = config.channels.max(1) as usize;
        let mapped = source_channels.min(MAX_CHANNELS);

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
                    for frame in data.chunks_mut(output_channels) {
                        let mut source = [0i16; MAX_CHANNELS];
                        for slot in source.iter_mut().take(mapped) {
                            *slot = queue.pop_front().unwrap_or(0);
                        }
                        for _ in mapped..source_channels {
                            queue.pop_front();
                        }
                        for (channel, out) in frame.iter_mut().enumerate() {
                            *out = T::from_sample(source[channel.min(mapped - 1)]);
                        }
                    }
                },
                |err| error!("Monitor output stream error: {}", err),
                None,
            )
            .map_err(|e| RecorderError::GraphInit(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_output_lifecycle() {
        let mut output = NullOutputProvider.open_output(44100, 2).unwrap();
        assert!(!output.is_playing());

        output.play().unwrap();
        assert!(output.is_playing());

        output.pause().unwrap();
        assert!(!output.is_playing());

        output.close();
        output.close();
        assert!(output.is_closed());
        assert!(output.play().is_err());
    }
}

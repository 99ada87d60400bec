use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use live_recorder::artifact::DirectorySink;
use live_recorder::audio::{DeviceProvider, NullOutputProvider, OutputProvider, ToneDeviceProvider};
use live_recorder::config::{Config, SourceKind};
use live_recorder::playback::{PlaybackCallback, PlaybackEvent, PlaybackReview};
use live_recorder::session::{JsonLinesSink, RecordingSession, SessionEventSink, SessionState, TracingSink};
use live_recorder::visualizer::PathCanvas;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};

/// Record audio from the terminal.
///
/// Commands are read from stdin, one per line: record, pause, resume,
/// stop, play, save, gain <value>, status, quit.
#[derive(Debug, Parser)]
#[command(name = "live-recorder", version)]
struct Args {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/live-recorder")]
    config: String,

    /// Capture source, overriding the configuration
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Directory for saved recordings, overriding the configuration
    #[arg(long)]
    output: Option<PathBuf>,

    /// Emit session events on stdout as JSON lines
    #[arg(long)]
    json: bool,

    /// Print the input devices of the default host and exit
    #[arg(long)]
    list_devices: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .init();

    if args.list_devices {
        return list_devices();
    }

    let cfg = Config::load(&args.config)?;
    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let source = args.source.unwrap_or(cfg.audio.source);
    let devices = device_provider(source, &cfg)?;
    let outputs = output_provider(&cfg);
    let sink: Arc<dyn SessionEventSink> = if args.json {
        Arc::new(JsonLinesSink::new(std::io::stdout()))
    } else {
        Arc::new(TracingSink)
    };
    let canvas = Arc::new(PathCanvas::new(
        cfg.visualizer.width as f32,
        cfg.visualizer.height as f32,
    ));
    let recordings = DirectorySink::new(args.output.clone().unwrap_or_else(|| cfg.recordings.path.clone()));

    let mut session = RecordingSession::new(
        cfg.session_config(),
        devices,
        Arc::clone(&outputs),
        canvas.clone(),
        Arc::clone(&sink),
    );
    info!("Session {}", session.session_id());
    let mut review: Option<PlaybackReview> = None;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pump = tokio::time::interval(Duration::from_millis(10));

    info!("Ready. Type 'record' to begin, 'quit' to exit");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let mut parts = line.split_whitespace();
                let Some(command) = parts.next() else {
                    continue;
                };

                match command {
                    "record" => {
                        review = None;
                        if let Err(e) = session.start().await {
                            warn!("Could not start recording: {}", e);
                        }
                    }
                    "pause" => {
                        let _ = session.pause();
                    }
                    "resume" => {
                        let _ = session.resume();
                    }
                    "stop" => {
                        let _ = session.stop();
                    }
                    "play" => match session.artifact() {
                        Some(artifact) if session.state() == SessionState::Stopped => {
                            if review.is_none() {
                                let callback = playback_callback(Arc::clone(&sink));
                                match PlaybackReview::new(artifact, Arc::clone(&outputs), callback) {
                                    Ok(player) => review = Some(player),
                                    Err(e) => sink.on_status(&e.status_text()),
                                }
                            }
                            if let Some(player) = review.as_mut() {
                                if let Err(e) = player.toggle() {
                                    sink.on_status(&e.status_text());
                                }
                            }
                        }
                        _ => warn!("Nothing to play yet"),
                    },
                    "save" => match session.save(&recordings) {
                        Ok(path) => info!("Recording written to {}", path.display()),
                        Err(e) => warn!("Save failed: {:#}", e),
                    },
                    "gain" => match parts.next().map(str::parse::<f32>) {
                        Some(Ok(value)) => {
                            let gain = session.set_gain(value);
                            info!("Gain {:.2}", gain);
                        }
                        _ => warn!("Usage: gain <value>"),
                    },
                    "status" => println!("{}", session.stats().to_json_line()?),
                    "quit" | "exit" => break,
                    other => warn!("Unknown command '{}'", other),
                }
            }
            _ = pump.tick() => {
                session.pump();
            }
        }
    }

    if session.state().is_active() {
        let _ = session.stop();
    }
    info!("Frames drawn: {}", canvas.frames());

    Ok(())
}

fn device_provider(source: SourceKind, cfg: &Config) -> Result<Arc<dyn DeviceProvider>> {
    match source {
        SourceKind::Tone => Ok(Arc::new(ToneDeviceProvider::default())),
        #[cfg(feature = "cpal")]
        SourceKind::Device => {
            let mut provider = live_recorder::audio::CpalDeviceProvider::new();
            if let Some(name) = &cfg.audio.device {
                provider = provider.with_device(name.clone());
            }
            Ok(Arc::new(provider))
        }
        #[cfg(not(feature = "cpal"))]
        SourceKind::Device => {
            let _ = cfg;
            anyhow::bail!("Microphone capture needs the `cpal` feature; use --source tone")
        }
    }
}

#[cfg(feature = "cpal")]
fn list_devices() -> Result<()> {
    for name in live_recorder::audio::CpalDeviceProvider::input_devices()? {
        println!("{}", name);
    }
    Ok(())
}

#[cfg(not(feature = "cpal"))]
fn list_devices() -> Result<()> {
    anyhow::bail!("Listing input devices needs the `cpal` feature")
}

fn output_provider(cfg: &Config) -> Arc<dyn OutputProvider> {
    #[cfg(feature = "cpal")]
    if cfg.audio.monitor {
        return Arc::new(live_recorder::audio::CpalOutputProvider::new());
    }

    #[cfg(not(feature = "cpal"))]
    if cfg.audio.monitor {
        info!("Monitor playback needs the `cpal` feature; monitoring silently");
    }
    Arc::new(NullOutputProvider)
}

fn playback_callback(sink: Arc<dyn SessionEventSink>) -> PlaybackCallback {
    Arc::new(move |event: PlaybackEvent| sink.on_status(event.status()))
}

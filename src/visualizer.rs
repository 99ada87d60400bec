//! Waveform visualizer.
//!
//! Repaints the latest analysis snapshot onto a [`CanvasTarget`] at a fixed
//! refresh cadence. Each frame fills the background and strokes one line
//! through the samples, so nothing from earlier frames remains.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::audio::AnalysisHandle;

/// Colour in 8-bit RGB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const BACKGROUND: Rgb = Rgb(200, 200, 200);
pub const TRACE: Rgb = Rgb(0, 0, 0);
pub const TRACE_WIDTH: f32 = 2.0;
/// Fastest redraw rate; higher settings are capped here
pub const MAX_REFRESH_HZ: u32 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgb,
    pub width: f32,
}

/// Drawing surface the visualizer paints on
pub trait CanvasTarget: Send + Sync {
    /// (width, height) in pixels
    fn size(&self) -> (f32, f32);

    fn fill_background(&self, color: Rgb);

    fn stroke_path(&self, points: &[Point], stroke: Stroke);
}

/// Map a snapshot of 8-bit samples onto a polyline spanning the canvas.
///
/// Sample `i` sits at `x = i * width / len` and `y = height/2 + (s/128 - 1) * height/2`.
/// The line is closed off at the vertical midpoint of the right edge.
pub fn trace_path(samples: &[u8], width: f32, height: f32) -> Vec<Point> {
    let mid = height / 2.0;
    let mut points = Vec::with_capacity(samples.len() + 1);

    if !samples.is_empty() {
        let slice_width = width / samples.len() as f32;
        for (i, &s) in samples.iter().enumerate() {
            let v = s as f32 / 128.0;
            points.push(Point {
                x: i as f32 * slice_width,
                y: mid + (v - 1.0) * mid,
            });
        }
    }

    points.push(Point { x: width, y: mid });
    points
}

/// Paint one frame
pub fn render_frame(samples: &[u8], canvas: &dyn CanvasTarget) {
    let (width, height) = canvas.size();
    canvas.fill_background(BACKGROUND);
    canvas.stroke_path(
        &trace_path(samples, width, height),
        Stroke {
            color: TRACE,
            width: TRACE_WIDTH,
        },
    );
}

/// In-memory canvas keeping the most recent frame.
///
/// Clones share the same surface.
#[derive(Clone)]
pub struct PathCanvas {
    width: f32,
    height: f32,
    state: Arc<Mutex<CanvasState>>,
}

#[derive(Default)]
struct CanvasState {
    background: Option<Rgb>,
    path: Vec<Point>,
    stroke: Option<Stroke>,
    frames: u64,
}

impl PathCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            state: Arc::new(Mutex::new(CanvasState::default())),
        }
    }

    /// Path of the last frame drawn
    pub fn last_path(&self) -> Vec<Point> {
        self.lock().path.clone()
    }

    pub fn background(&self) -> Option<Rgb> {
        self.lock().background
    }

    pub fn stroke(&self) -> Option<Stroke> {
        self.lock().stroke
    }

    /// Frames painted so far
    pub fn frames(&self) -> u64 {
        self.lock().frames
    }

    fn lock(&self) -> MutexGuard<'_, CanvasState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CanvasTarget for PathCanvas {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn fill_background(&self, color: Rgb) {
        let mut state = self.lock();
        state.background = Some(color);
        state.path.clear();
    }

    fn stroke_path(&self, points: &[Point], stroke: Stroke) {
        let mut state = self.lock();
        state.path = points.to_vec();
        state.stroke = Some(stroke);
        state.frames += 1;
    }
}

/// Canvas that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCanvas;

impl CanvasTarget for NullCanvas {
    fn size(&self) -> (f32, f32) {
        (0.0, 0.0)
    }

    fn fill_background(&self, _color: Rgb) {}

    fn stroke_path(&self, _points: &[Point], _stroke: Stroke) {}
}

/// Visualizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizerConfig {
    /// Redraws per second (default: 60, at most `MAX_REFRESH_HZ`)
    pub refresh_hz: u32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self { refresh_hz: 60 }
    }
}

impl VisualizerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.refresh_hz.clamp(1, MAX_REFRESH_HZ) as u64)
    }
}

/// Cancellable redraw loop
pub struct Visualizer {
    frame_interval: Duration,
    running: Option<Running>,
}

struct Running {
    cancel: CancellationToken,
    // Held while a frame is painted so stop() never races a redraw
    paint: Arc<Mutex<()>>,
    task: JoinHandle<()>,
}

impl Visualizer {
    pub fn new(config: &VisualizerConfig) -> Self {
        Self {
            frame_interval: config.frame_interval(),
            running: None,
        }
    }

    /// Start redrawing `handle` onto `canvas` until [`stop`](Self::stop).
    ///
    /// A visualizer that is already running is stopped first.
    pub fn start(&mut self, handle: AnalysisHandle, canvas: Arc<dyn CanvasTarget>) {
        self.stop();

        let cancel = CancellationToken::new();
        let paint = Arc::new(Mutex::new(()));
        let token = cancel.clone();
        let lock = Arc::clone(&paint);
        let frame_interval = self.frame_interval;

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(frame_interval) => {}
                }

                if !paint_unless_cancelled(&lock, &token, &handle, canvas.as_ref()) {
                    break;
                }
            }
            debug!("Visualizer loop exited");
        });

        info!("Visualizer started ({:?} per frame)", frame_interval);
        self.running = Some(Running { cancel, paint, task });
    }

    /// Cancel the pending redraw. The last frame stays on the canvas.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _guard = running.paint.lock().unwrap_or_else(PoisonError::into_inner);
            running.cancel.cancel();
            drop(_guard);
            drop(running.task);
            info!("Visualizer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|r| !r.cancel.is_cancelled() && !r.task.is_finished())
            .unwrap_or(false)
    }
}

fn paint_unless_cancelled(
    lock: &Mutex<()>,
    token: &CancellationToken,
    handle: &AnalysisHandle,
    canvas: &dyn CanvasTarget,
) -> bool {
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    if token.is_cancelled() {
        return false;
    }
    render_frame(&handle.snapshot(), canvas);
    true
}

impl Drop for Visualizer {
    fn drop(&mut self) {
        self.stop();
    }
}

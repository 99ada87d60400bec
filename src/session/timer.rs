use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::events::SessionEventSink;

const TICK: Duration = Duration::from_secs(1);

/// Tracks time spent recording, excluding pauses.
///
/// While running, a ticker task reports the elapsed whole seconds to the
/// sink once per second. Every span is measured from its own start mark,
/// so ticks do not drift across pause/resume.
pub struct ElapsedTimer {
    sink: Arc<dyn SessionEventSink>,
    accumulated: Duration,
    mark: Option<Instant>,
    ticker: Option<Ticker>,
}

struct Ticker {
    cancel: CancellationToken,
    emit: Arc<Mutex<()>>,
    task: JoinHandle<()>,
}

impl ElapsedTimer {
    pub fn new(sink: Arc<dyn SessionEventSink>) -> Self {
        Self {
            sink,
            accumulated: Duration::ZERO,
            mark: None,
            ticker: None,
        }
    }

    /// Reset to zero and start counting
    pub fn start(&mut self) {
        self.halt();
        self.accumulated = Duration::ZERO;
        self.run();
    }

    /// Stop counting, keeping the total
    pub fn pause(&mut self) {
        self.halt();
    }

    /// Continue counting from a fresh mark
    pub fn resume(&mut self) {
        if self.mark.is_none() {
            self.run();
        }
    }

    /// Stop counting. No tick is delivered after this returns.
    pub fn stop(&mut self) {
        self.halt();
    }

    pub fn is_running(&self) -> bool {
        self.mark.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        match self.mark {
            Some(mark) => self.accumulated + mark.elapsed(),
            None => self.accumulated,
        }
    }

    fn run(&mut self) {
        let mark = Instant::now();
        self.mark = Some(mark);

        let base = self.accumulated;
        let sink = Arc::clone(&self.sink);
        let cancel = CancellationToken::new();
        let emit = Arc::new(Mutex::new(()));
        let token = cancel.clone();
        let lock = Arc::clone(&emit);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(mark + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let seconds = (base + mark.elapsed()).as_secs();
                if !emit_unless_cancelled(&lock, &token, sink.as_ref(), seconds) {
                    break;
                }
            }
        });

        self.ticker = Some(Ticker { cancel, emit, task });
    }

    fn halt(&mut self) {
        if let Some(mark) = self.mark.take() {
            self.accumulated += mark.elapsed();
        }
        if let Some(ticker) = self.ticker.take() {
            let guard = ticker.emit.lock().unwrap_or_else(PoisonError::into_inner);
            ticker.cancel.cancel();
            drop(guard);
            drop(ticker.task);
            debug!("Elapsed timer halted at {:?}", self.accumulated);
        }
    }
}

fn emit_unless_cancelled(
    lock: &Mutex<()>,
    token: &CancellationToken,
    sink: &dyn SessionEventSink,
    seconds: u64,
) -> bool {
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    if token.is_cancelled() {
        return false;
    }
    sink.on_duration(seconds);
    true
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::events::MemorySink;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_second() {
        let sink = MemorySink::new();
        let mut timer = ElapsedTimer::new(Arc::new(sink.clone()));

        timer.start();
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(sink.durations(), vec![1, 2, 3]);
        assert_eq!(timer.elapsed(), Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_excludes_time() {
        let sink = MemorySink::new();
        let mut timer = ElapsedTimer::new(Arc::new(sink.clone()));

        timer.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        timer.pause();
        tokio::time::sleep(Duration::from_secs(10)).await;
        timer.resume();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(timer.elapsed(), Duration::from_millis(2600));
        // First tick of the new span reports 1.5s + 1s
        assert_eq!(sink.durations(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_stop() {
        let sink = MemorySink::new();
        let mut timer = ElapsedTimer::new(Arc::new(sink.clone()));

        timer.start();
        tokio::time::sleep(Duration::from_millis(1200)).await;
        timer.stop();
        let ticks = sink.durations().len();

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(sink.durations().len(), ticks);
        assert!(!timer.is_running());
    }
}

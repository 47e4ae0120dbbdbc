//! Background capture loop.

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TryRecvError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::CaptureStats;
use crate::source::ImageSource;
use crate::store::FrameStore;

/// Lifecycle of a capture scheduler. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Never started (simulated sessions).
    #[default]
    Idle,
    /// Capturing on every tick.
    Running,
    /// Cancelled; no further frames will be written.
    Stopped,
}

impl SchedulerState {
    /// Lowercase name, as used in logs and health reports.
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopped => "stopped",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => SchedulerState::Idle,
            1 => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }
}

/// Periodically pulls images from a source into a frame store.
///
/// The loop runs on its own thread and waits on either the next tick or
/// cancellation. Failures inside a tick, panics included, are logged and
/// counted; they never stop the loop.
pub struct CaptureScheduler {
    state: Arc<AtomicU8>,
    cancel: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<CaptureStats>,
}

impl CaptureScheduler {
    /// A scheduler that never captures.
    pub fn idle() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(SchedulerState::Idle as u8)),
            cancel: Mutex::new(None),
            worker: Mutex::new(None),
            stats: Arc::new(CaptureStats::default()),
        }
    }

    /// Starts capturing every `interval` on a background thread.
    pub fn spawn(
        store: FrameStore,
        source: Arc<dyn ImageSource>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let state = Arc::new(AtomicU8::new(SchedulerState::Running as u8));
        let stats = Arc::new(CaptureStats::default());

        let worker = {
            let state = Arc::clone(&state);
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name("timelapse-capture".into())
                .spawn(move || {
                    run_loop(&store, source.as_ref(), interval, &cancel_rx, &stats);
                    state.store(SchedulerState::Stopped as u8, Ordering::SeqCst);
                })?
        };

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            "Capture scheduler started"
        );

        Ok(Self {
            state,
            cancel: Mutex::new(Some(cancel_tx)),
            worker: Mutex::new(Some(worker)),
            stats,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Capture counters.
    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    /// Signals the loop to stop. Idempotent; does not wait.
    pub fn cancel(&self) {
        let sender = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Dropping the only sender disconnects the channel, which the loop
        // observes on its next wait.
        drop(sender);
        if self.state() == SchedulerState::Idle {
            self.state
                .store(SchedulerState::Stopped as u8, Ordering::SeqCst);
        }
    }

    /// Cancels and waits for an in-flight tick to finish.
    pub fn stop(&self) {
        self.cancel();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::error!("Capture thread terminated abnormally");
            }
            self.state
                .store(SchedulerState::Stopped as u8, Ordering::SeqCst);
        }
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    store: &FrameStore,
    source: &dyn ImageSource,
    interval: Duration,
    cancel: &Receiver<()>,
    stats: &CaptureStats,
) {
    let ticker = tick(interval);
    loop {
        let ticked = select! {
            recv(cancel) -> _ => false,
            recv(ticker) -> _ => true,
        };
        // Both may be ready at once; cancellation wins.
        if !ticked || !matches!(cancel.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            capture_tick(store, source, stats)
        }));
        if let Err(payload) = outcome {
            stats.record_panic();
            tracing::error!(
                panic = panic_message(payload.as_ref()),
                "Capture tick panicked"
            );
        }
    }
    tracing::info!(dir = %store.dir().display(), "Capture scheduler shut down");
}

fn capture_tick(store: &FrameStore, source: &dyn ImageSource, stats: &CaptureStats) {
    stats.record_tick();
    tracing::debug!(source = source.name(), "Capturing images");

    let capture = match source.images() {
        Ok(capture) => capture,
        Err(e) => {
            stats.record_upstream_failure();
            tracing::error!(source = source.name(), error = %e, "Cannot read images");
            return;
        }
    };

    for named in &capture.images {
        let bytes = match store.encode(&named.image) {
            Ok(bytes) => bytes,
            Err(e) => {
                stats.record_encode_failure();
                tracing::error!(imager = %named.source_name, error = %e, "Cannot encode image");
                continue;
            }
        };
        match store.append_encoded(&bytes, capture.captured_at) {
            Ok(id) => {
                stats.record_frame();
                tracing::debug!(imager = %named.source_name, frame = %id, "Stored frame");
            }
            Err(e) => {
                stats.record_write_failure();
                tracing::error!(imager = %named.source_name, error = %e, "Cannot write image");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

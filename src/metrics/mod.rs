//! Prometheus metrics exporter for timelapse monitoring.
//!
//! # Metrics Exposed
//!
//! ## Capture
//! - `timelapse_capture_running` - Scheduler status (1=running)
//! - `timelapse_capture_ticks_total` - Capture ticks handled
//! - `timelapse_frames_written_total` - Frames appended to the store
//! - `timelapse_capture_failures_total` - Ticks skipped after a source failure
//! - `timelapse_encode_failures_total` - Images dropped by the encoder
//! - `timelapse_write_failures_total` - Images dropped by the filesystem
//! - `timelapse_capture_panics_total` - Ticks aborted by a panic
//!
//! ## Store
//! - `timelapse_stored_frames` - Frames currently in the session directory
//!
//! ## Playback
//! - `timelapse_playback_frames_total` - Frames served
//! - `timelapse_playback_errors_total` - Failed playback reads
//!
//! With the `metrics` feature, `MetricsServer` serves these at `/metrics`
//! and reports capture health at `/health`: 200 while the scheduler is idle
//! or running, 503 once it has stopped or before the first report.
//!
//! # Example
//!
//! ```no_run
//! use timelapse_cam::metrics::{MetricsRegistry, MetricsSnapshot};
//! use timelapse_cam::SchedulerState;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! registry.update(&MetricsSnapshot {
//!     capture_state: SchedulerState::Running,
//!     frames_written: 12,
//!     stored_frames: Some(12),
//!     ..Default::default()
//! });
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};

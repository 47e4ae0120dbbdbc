//! Interval capture into the frame store.
//!
//! The scheduler is the only writer of a session's frame store. It has
//! no caller waiting on it, so every capture-side failure ends in a log
//! line and a counter rather than an error value.

mod scheduler;
mod stats;

pub use scheduler::{CaptureScheduler, SchedulerState};
pub use stats::CaptureStats;

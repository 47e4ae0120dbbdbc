//! Timelapse Camera Library
//!
//! Turns a slow, interval-based still-image source into a camera that
//! streams: captures are written to a session directory as timestamped
//! frames, and a playback stream loops over that directory at its own
//! frame rate.
//!
//! # Architecture
//!
//! ```text
//! source → capture scheduler → frame store (directory) → playback stream → consumer
//! ```
//!
//! The scheduler and any playback streams never talk to each other. The
//! directory is the only shared state: the scheduler is its single
//! writer, streams re-list it on every read.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use timelapse_cam::{FixtureSource, Timelapse, TimelapseConfig};
//!
//! let mut config = TimelapseConfig::new("garden-cam");
//! config.capture_interval_seconds = 5.0;
//! config.playback_fps = 10.0;
//!
//! let source = Arc::new(FixtureSource::gradients("garden-cam", 4));
//! let timelapse = Timelapse::new(config, source).unwrap();
//!
//! let stream = timelapse.stream();
//! match stream.next() {
//!     Ok(frame) => println!("frame {}x{}", frame.width(), frame.height()),
//!     Err(failure) => eprintln!("no frame yet: {}", failure.error),
//! }
//!
//! timelapse.close();
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod metrics;
pub mod playback;
pub mod source;
pub mod store;
mod timelapse;

// Re-export commonly used types at crate root
pub use capture::{CaptureScheduler, CaptureStats, SchedulerState};
pub use config::{ConfigError, FileConfig, TimelapseConfig};
pub use playback::{PlaybackStream, StreamError, StreamFailure, StreamHandle};
pub use source::{Capture, CommandSource, FixtureSource, ImageSource, NamedImage, SourceError};
pub use store::{FrameFormat, FrameId, FrameStore, StoreError};
pub use timelapse::{Properties, Timelapse, TimelapseError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Looping playback over a frame store.
//!
//! A stream re-lists the store on every read, so frames captured while it
//! is open show up without restarting it. `next()` is its own pacing
//! primitive: callers faster than the configured rate are made to wait.
//!
//! All playback failures are returned to the caller together with a blank
//! placeholder frame.

mod cursor;
mod stream;

pub use stream::{PlaybackStream, StreamHandle};

use image::DynamicImage;
use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Side length of the blank placeholder frame.
pub const PLACEHOLDER_SIZE: u32 = 100;

/// Errors that can occur while producing a playback frame.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("cannot list timelapse frames: {0}")]
    List(#[source] StoreError),
    #[error("no frames in {0} yet")]
    EmptyStore(PathBuf),
    #[error("cannot load timelapse frame: {0}")]
    Decode(#[source] StoreError),
    #[error("stream is closed")]
    Closed,
}

/// A failed `next()` call: the cause plus a frame callers may show anyway.
#[derive(Debug, Error)]
#[error("playback frame unavailable")]
pub struct StreamFailure {
    /// Why no frame was served.
    #[source]
    pub error: StreamError,
    /// Blank frame to display in its place.
    pub placeholder: DynamicImage,
}

impl StreamFailure {
    pub(crate) fn new(error: StreamError) -> Self {
        Self {
            error,
            placeholder: placeholder(),
        }
    }

    /// Falls back to the placeholder, discarding the error.
    pub fn into_placeholder(self) -> DynamicImage {
        self.placeholder
    }
}

/// Blank frame returned alongside playback errors.
pub fn placeholder() -> DynamicImage {
    DynamicImage::new_rgba8(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)
}

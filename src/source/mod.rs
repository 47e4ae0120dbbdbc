//! Upstream image sources.
//!
//! This module provides a trait-based abstraction over whatever produces
//! still images, allowing for both real capture programs and in-memory
//! fixtures for simulated sessions and tests.

mod command;
mod fixture;

pub use command::CommandSource;
pub use fixture::FixtureSource;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use thiserror::Error;

/// Errors that can occur while requesting images.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to capture images: {0}")]
    CaptureFailed(String),
    #[error("capture command failed: {0}")]
    CommandFailed(String),
    #[error("capture command timed out after {0:?}")]
    TimedOut(std::time::Duration),
    #[error("failed to decode captured image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image source has no more images")]
    Exhausted,
}

/// An image tagged with the name of the imager that produced it.
#[derive(Debug, Clone)]
pub struct NamedImage {
    /// Imager that produced the image.
    pub source_name: String,
    /// Decoded pixels.
    pub image: DynamicImage,
}

impl NamedImage {
    /// Tags `image` with `source_name`.
    pub fn new(source_name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            source_name: source_name.into(),
            image,
        }
    }
}

/// Images returned by one request, with their capture time.
#[derive(Debug, Clone)]
pub struct Capture {
    pub images: Vec<NamedImage>,
    pub captured_at: DateTime<Utc>,
}

impl Capture {
    /// Creates a capture stamped with the current time.
    pub fn now(images: Vec<NamedImage>) -> Self {
        Self {
            images,
            captured_at: Utc::now(),
        }
    }
}

/// Trait for upstream image sources.
///
/// Implementations are shared between the capture thread and callers of
/// passthrough requests, so they take `&self` and must be thread-safe.
pub trait ImageSource: Send + Sync {
    /// Identifier of the source, used in logs.
    fn name(&self) -> &str;

    /// Requests zero or more simultaneous images.
    fn images(&self) -> Result<Capture, SourceError>;
}

//! In-memory image source.

use image::{DynamicImage, Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Capture, ImageSource, NamedImage, SourceError};

/// Image source that cycles through a fixed set of images.
///
/// Every request returns one image, stamped with the current time.
#[derive(Debug)]
pub struct FixtureSource {
    name: String,
    images: Vec<DynamicImage>,
    next: AtomicUsize,
}

impl FixtureSource {
    /// Creates a source cycling through `images`.
    pub fn new(name: impl Into<String>, images: Vec<DynamicImage>) -> Self {
        Self {
            name: name.into(),
            images,
            next: AtomicUsize::new(0),
        }
    }

    /// Source that always returns a 100x100 blank image.
    pub fn blank(name: impl Into<String>) -> Self {
        Self::new(name, vec![DynamicImage::new_rgba8(100, 100)])
    }

    /// Source cycling through `count` distinguishable gradient frames.
    pub fn gradients(name: impl Into<String>, count: usize) -> Self {
        let count = count.max(1);
        let images = (0..count)
            .map(|i| {
                let shift = (i * 255 / count) as u32;
                DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, |x, y| {
                    Rgb([
                        ((x * 4 + shift) % 256) as u8,
                        ((y * 5 + shift) % 256) as u8,
                        shift as u8,
                    ])
                }))
            })
            .collect();
        Self::new(name, images)
    }

    /// Images this source cycles through.
    pub fn images_ref(&self) -> &[DynamicImage] {
        &self.images
    }
}

impl ImageSource for FixtureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn images(&self) -> Result<Capture, SourceError> {
        if self.images.is_empty() {
            return Err(SourceError::Exhausted);
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.images.len();
        Ok(Capture::now(vec![NamedImage::new(
            self.name.clone(),
            self.images[i].clone(),
        )]))
    }
}

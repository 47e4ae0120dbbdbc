//! Shared helpers for integration tests.

#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use timelapse_cam::{
    Capture, FrameFormat, ImageSource, NamedImage, SourceError, TimelapseConfig,
};

/// Source that replays a fixed script of outcomes, then reports exhaustion.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<DynamicImage, String>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<DynamicImage, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn images(&self) -> Result<Capture, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(image)) => Ok(Capture::now(vec![NamedImage::new("scripted", image)])),
            Some(Err(message)) => Err(SourceError::CaptureFailed(message)),
            None => Err(SourceError::Exhausted),
        }
    }
}

/// A 4x4 frame filled with one gray level.
pub fn gray(value: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([value, value, value])))
}

/// Gray level of the top-left pixel.
pub fn level(image: &DynamicImage) -> u8 {
    image.to_rgb8().get_pixel(0, 0)[0]
}

/// Lossless config rooted in `dir`.
pub fn config(dir: &TempDir, capture_interval_seconds: f64, playback_fps: f64) -> TimelapseConfig {
    TimelapseConfig {
        capture_source: "scripted".to_string(),
        capture_interval_seconds,
        playback_fps,
        timelapse_name: "garden".to_string(),
        frame_format: FrameFormat::Png,
        data_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    }
}

/// Polls `check` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    check()
}

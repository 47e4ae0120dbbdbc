//! The timelapse camera component.
//!
//! Wires a frame store, a capture scheduler and a lazily created playback
//! stream together, and owns their shutdown.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::capture::{CaptureScheduler, CaptureStats, SchedulerState};
use crate::config::{ConfigError, TimelapseConfig, SIMULATED_TIMELAPSE_NAME};
use crate::playback::{PlaybackStream, StreamHandle};
use crate::source::{Capture, FixtureSource, ImageSource, SourceError};
use crate::store::{FrameFormat, FrameStore, StoreError};

/// Number of frames seeded into a simulated session.
const SIMULATED_FRAMES: usize = 2;

/// Errors that prevent a component from starting.
#[derive(Debug, Error)]
pub enum TimelapseError {
    #[error("invalid timelapse config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to start capture thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Static description of what the component serves.
#[derive(Debug, Clone, PartialEq)]
pub struct Properties {
    /// Format frames are stored in.
    pub frame_format: FrameFormat,
    /// Served MIME types, stored format first.
    pub mime_types: Vec<&'static str>,
    /// Playback rate in frames per second.
    pub playback_fps: f64,
    /// True for sessions backed by fixture frames.
    pub simulated: bool,
}

/// A camera that records interval captures and replays them as a loop.
pub struct Timelapse {
    config: TimelapseConfig,
    store: FrameStore,
    source: Arc<dyn ImageSource>,
    scheduler: CaptureScheduler,
    stream: OnceLock<StreamHandle>,
    simulated: bool,
    closed: AtomicBool,
}

impl Timelapse {
    /// Validates `config`, creates the session directory and starts capturing.
    pub fn new(
        mut config: TimelapseConfig,
        source: Arc<dyn ImageSource>,
    ) -> Result<Self, TimelapseError> {
        config.validate()?;
        let store = open_store(&config)?;
        let scheduler =
            CaptureScheduler::spawn(store.clone(), Arc::clone(&source), config.capture_interval())
                .map_err(TimelapseError::Spawn)?;

        tracing::info!(
            session = %config.timelapse_name,
            source = source.name(),
            dir = %store.dir().display(),
            capture_interval_s = config.capture_interval_seconds,
            playback_fps = config.playback_fps,
            "Timelapse started"
        );

        Ok(Self {
            config,
            store,
            source,
            scheduler,
            stream: OnceLock::new(),
            simulated: false,
            closed: AtomicBool::new(false),
        })
    }

    /// Builds a session that plays generated fixture frames and never captures.
    ///
    /// The session name is forced to `fake`. Passthrough image requests
    /// return a blank frame.
    pub fn simulated(mut config: TimelapseConfig) -> Result<Self, TimelapseError> {
        if config.capture_source.trim().is_empty() {
            config.capture_source = "simulated".to_string();
        }
        config.timelapse_name = SIMULATED_TIMELAPSE_NAME.to_string();
        config.validate()?;

        let store = open_store(&config)?;
        seed_fixture_frames(&store)?;

        tracing::info!(dir = %store.dir().display(), "Simulated timelapse ready");

        Ok(Self {
            source: Arc::new(FixtureSource::blank(config.capture_source.clone())),
            config,
            store,
            scheduler: CaptureScheduler::idle(),
            stream: OnceLock::new(),
            simulated: true,
            closed: AtomicBool::new(false),
        })
    }

    /// Session name.
    pub fn name(&self) -> &str {
        &self.config.timelapse_name
    }

    /// Validated configuration.
    pub fn config(&self) -> &TimelapseConfig {
        &self.config
    }

    /// The session's frame store.
    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Requests images straight from the upstream source.
    pub fn images(&self) -> Result<Capture, SourceError> {
        self.source.images()
    }

    /// Returns the component's playback stream, creating it on first use.
    ///
    /// Every call returns a handle to the same stream.
    pub fn stream(&self) -> StreamHandle {
        self.stream
            .get_or_init(|| {
                tracing::debug!(session = %self.config.timelapse_name, "Opening playback stream");
                StreamHandle::new(PlaybackStream::new(
                    self.store.clone(),
                    self.config.playback_interval(),
                ))
            })
            .clone()
    }

    /// The playback stream, if one was opened.
    pub fn open_stream(&self) -> Option<&StreamHandle> {
        self.stream.get()
    }

    /// Capture scheduler state.
    pub fn capture_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Capture counters.
    pub fn capture_stats(&self) -> Arc<CaptureStats> {
        self.scheduler.stats()
    }

    /// Describes the frames this component serves.
    pub fn properties(&self) -> Properties {
        let mut mime_types = vec![self.config.frame_format.mime_type()];
        for format in [FrameFormat::Jpeg, FrameFormat::Png] {
            if !mime_types.contains(&format.mime_type()) {
                mime_types.push(format.mime_type());
            }
        }
        Properties {
            frame_format: self.config.frame_format,
            mime_types,
            playback_fps: self.config.playback_fps,
            simulated: self.simulated,
        }
    }

    /// Stops capture. Idempotent.
    ///
    /// Waits for an in-flight tick to finish. Open playback streams keep
    /// working against the frames already stored.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.scheduler.stop();
        tracing::info!(session = %self.config.timelapse_name, "Timelapse closed");
    }
}

impl Drop for Timelapse {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_store(config: &TimelapseConfig) -> Result<FrameStore, StoreError> {
    Ok(FrameStore::create(config.session_dir(), config.frame_format)?
        .with_jpeg_quality(config.jpeg_quality))
}

fn seed_fixture_frames(store: &FrameStore) -> Result<(), StoreError> {
    if !store.is_empty()? {
        return Ok(());
    }
    let fixtures = FixtureSource::gradients("fixture", SIMULATED_FRAMES);
    let start = Utc::now();
    for (i, image) in fixtures.images_ref().iter().enumerate() {
        store.append(image, start + ChronoDuration::seconds(i as i64))?;
    }
    Ok(())
}

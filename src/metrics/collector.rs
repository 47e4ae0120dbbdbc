//! Metrics collection and registry.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

use crate::capture::{CaptureStats, SchedulerState};
use crate::playback::StreamHandle;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of component state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Lifecycle state of the capture scheduler.
    pub capture_state: SchedulerState,
    /// Capture ticks handled.
    pub capture_ticks: u64,
    /// Frames appended to the store.
    pub frames_written: u64,
    /// Ticks skipped after an upstream failure.
    pub capture_failures: u64,
    /// Images dropped by the encoder.
    pub encode_failures: u64,
    /// Images dropped by the filesystem.
    pub write_failures: u64,
    /// Ticks aborted by a panic.
    pub capture_panics: u64,
    /// Frames currently in the store, if listing succeeded.
    pub stored_frames: Option<usize>,
    /// Frames served by the playback stream.
    pub playback_frames: u64,
    /// Failed playback reads.
    pub playback_errors: u64,
}

/// Prometheus metrics registry for a timelapse component.
pub struct MetricsRegistry {
    registry: Registry,

    // Capture metrics
    capture_running: IntGauge,
    capture_ticks: IntCounter,
    frames_written: IntCounter,
    capture_failures: IntCounter,
    encode_failures: IntCounter,
    write_failures: IntCounter,
    capture_panics: IntCounter,

    // Store metrics
    stored_frames: IntGauge,

    // Playback metrics
    playback_frames: IntCounter,
    playback_errors: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all timelapse metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let capture_running = IntGauge::new(
            "timelapse_capture_running",
            "Capture scheduler status (1=running, 0=idle or stopped)",
        )?;
        let capture_ticks = IntCounter::new(
            "timelapse_capture_ticks_total",
            "Total number of capture ticks handled",
        )?;
        let frames_written = IntCounter::new(
            "timelapse_frames_written_total",
            "Total number of frames written to the store",
        )?;
        let capture_failures = IntCounter::new(
            "timelapse_capture_failures_total",
            "Capture ticks skipped because the image source failed",
        )?;
        let encode_failures = IntCounter::new(
            "timelapse_encode_failures_total",
            "Captured images dropped because encoding failed",
        )?;
        let write_failures = IntCounter::new(
            "timelapse_write_failures_total",
            "Captured images dropped because writing failed",
        )?;
        let capture_panics = IntCounter::new(
            "timelapse_capture_panics_total",
            "Capture ticks aborted by a panic",
        )?;

        let stored_frames = IntGauge::new(
            "timelapse_stored_frames",
            "Number of frames currently in the store",
        )?;

        let playback_frames = IntCounter::new(
            "timelapse_playback_frames_total",
            "Total number of frames served by the playback stream",
        )?;
        let playback_errors = IntCounter::new(
            "timelapse_playback_errors_total",
            "Total number of failed playback reads",
        )?;

        registry.register(Box::new(capture_running.clone()))?;
        registry.register(Box::new(capture_ticks.clone()))?;
        registry.register(Box::new(frames_written.clone()))?;
        registry.register(Box::new(capture_failures.clone()))?;
        registry.register(Box::new(encode_failures.clone()))?;
        registry.register(Box::new(write_failures.clone()))?;
        registry.register(Box::new(capture_panics.clone()))?;
        registry.register(Box::new(stored_frames.clone()))?;
        registry.register(Box::new(playback_frames.clone()))?;
        registry.register(Box::new(playback_errors.clone()))?;

        Ok(Self {
            registry,
            capture_running,
            capture_ticks,
            frames_written,
            capture_failures,
            encode_failures,
            write_failures,
            capture_panics,
            stored_frames,
            playback_frames,
            playback_errors,
        })
    }

    /// Updates all metrics from a snapshot of component state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.capture_running
            .set(i64::from(snapshot.capture_state == SchedulerState::Running));

        // Counters only move forward, so apply the difference.
        advance(&self.capture_ticks, snapshot.capture_ticks);
        advance(&self.frames_written, snapshot.frames_written);
        advance(&self.capture_failures, snapshot.capture_failures);
        advance(&self.encode_failures, snapshot.encode_failures);
        advance(&self.write_failures, snapshot.write_failures);
        advance(&self.capture_panics, snapshot.capture_panics);

        if let Some(frames) = snapshot.stored_frames {
            self.stored_frames.set(frames as i64);
        }

        advance(&self.playback_frames, snapshot.playback_frames);
        advance(&self.playback_errors, snapshot.playback_errors);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from the current state of timelapse components.
    pub fn from_components(
        state: SchedulerState,
        capture: &CaptureStats,
        stream: Option<&StreamHandle>,
        stored_frames: Option<usize>,
    ) -> Self {
        Self {
            capture_state: state,
            capture_ticks: capture.ticks(),
            frames_written: capture.frames_written(),
            capture_failures: capture.upstream_failures(),
            encode_failures: capture.encode_failures(),
            write_failures: capture.write_failures(),
            capture_panics: capture.panics(),
            stored_frames,
            playback_frames: stream.map_or(0, StreamHandle::frames_served),
            playback_errors: stream.map_or(0, StreamHandle::errors),
        }
    }

    /// Snapshot of a whole component.
    pub fn from_timelapse(timelapse: &crate::Timelapse) -> Self {
        Self::from_components(
            timelapse.capture_state(),
            &timelapse.capture_stats(),
            timelapse.open_stream(),
            timelapse.store().len().ok(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            capture_state: SchedulerState::Running,
            capture_ticks: 10,
            frames_written: 9,
            capture_failures: 1,
            stored_frames: Some(9),
            playback_frames: 42,
            ..Default::default()
        };

        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("timelapse_capture_running 1"));
        assert!(output.contains("timelapse_frames_written_total 9"));
        assert!(output.contains("timelapse_stored_frames 9"));
        assert!(output.contains("timelapse_playback_frames_total 42"));
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();
        registry.update(&MetricsSnapshot {
            capture_ticks: 5,
            ..Default::default()
        });
        registry.update(&MetricsSnapshot {
            capture_ticks: 3,
            ..Default::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("timelapse_capture_ticks_total 5"));
    }

    #[test]
    fn test_snapshot_from_components() {
        let stats = CaptureStats::default();
        stats.record_tick();
        stats.record_frame();
        stats.record_upstream_failure();

        let snapshot =
            MetricsSnapshot::from_components(SchedulerState::Stopped, &stats, None, Some(1));
        assert_eq!(snapshot.capture_state, SchedulerState::Stopped);
        assert_eq!(snapshot.capture_ticks, 1);
        assert_eq!(snapshot.frames_written, 1);
        assert_eq!(snapshot.capture_failures, 1);
        assert_eq!(snapshot.playback_frames, 0);
    }
}

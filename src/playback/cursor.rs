//! Pacing and position bookkeeping for a playback stream.

use std::time::{Duration, Instant};

/// Position of a stream within the last listing, and when it last moved.
#[derive(Debug, Clone)]
pub(crate) struct Cursor {
    index: usize,
    interval: Duration,
    last_advance: Option<Instant>,
    retry_pending: bool,
    retrying: bool,
}

impl Cursor {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            index: 0,
            interval,
            last_advance: None,
            retry_pending: false,
            retrying: false,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// How long a caller arriving at `now` must wait before the next frame.
    ///
    /// Zero for the first frame and when retrying a failed decode.
    pub(crate) fn wait_time(&self, now: Instant) -> Duration {
        if self.retry_pending {
            return Duration::ZERO;
        }
        match self.last_advance {
            None => Duration::ZERO,
            // A reading earlier than the last advance needs no wait.
            Some(last) => now
                .checked_duration_since(last)
                .map_or(Duration::ZERO, |elapsed| self.interval.saturating_sub(elapsed)),
        }
    }

    /// Moves to the frame to show at `now` given a listing of `len` frames.
    ///
    /// Advances by one when an interval has passed since the last advance,
    /// then wraps to the start if the index fell off the end. Returns the
    /// index to display; with `len == 0` this is 0 and there is nothing to
    /// display.
    pub(crate) fn step(&mut self, now: Instant, len: usize) -> usize {
        if self.retry_pending {
            self.retry_pending = false;
            self.retrying = true;
        } else {
            self.retrying = false;
            match self.last_advance {
                None => self.last_advance = Some(now),
                Some(last) if now.saturating_duration_since(last) >= self.interval => {
                    self.index += 1;
                    self.last_advance = Some(now);
                }
                Some(_) => {}
            }
        }
        if self.index >= len {
            self.index = 0;
        }
        self.index
    }

    /// Marks the current frame for an immediate retry on the next step.
    ///
    /// Only one retry per failure is immediate: a frame that fails again
    /// on its retry is left to normal pacing, which moves past it once the
    /// interval is up.
    pub(crate) fn retry_current(&mut self) {
        if !self.retrying {
            self.retry_pending = true;
        }
    }
}

//! Playback stream and its shareable handle.

use image::DynamicImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::cursor::Cursor;
use super::{StreamError, StreamFailure};
use crate::store::FrameStore;

/// Cursor over a frame store that advances at a fixed playback rate.
pub struct PlaybackStream {
    store: FrameStore,
    cursor: Cursor,
    closed: Arc<AtomicBool>,
}

impl PlaybackStream {
    /// Creates a stream showing each frame for `interval`.
    pub fn new(store: FrameStore, interval: Duration) -> Self {
        Self {
            store,
            cursor: Cursor::new(interval),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Index of the current frame within the most recent listing.
    pub fn position(&self) -> usize {
        self.cursor.index()
    }

    /// Time each frame is shown.
    pub fn interval(&self) -> Duration {
        self.cursor.interval()
    }

    /// Returns the frame due now, blocking until the next one is due.
    ///
    /// A decode failure leaves the cursor in place; the following call
    /// retries the same frame immediately. A frame that fails its retry too
    /// is skipped at the normal rate.
    pub fn next(&mut self) -> Result<DynamicImage, StreamFailure> {
        self.ensure_open()?;

        let wait = self.cursor.wait_time(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        self.ensure_open()?;

        let ids = self
            .store
            .list()
            .map_err(|e| StreamFailure::new(StreamError::List(e)))?;
        let index = self.cursor.step(Instant::now(), ids.len());
        let id = ids.get(index).ok_or_else(|| {
            StreamFailure::new(StreamError::EmptyStore(self.store.dir().to_path_buf()))
        })?;

        match self.store.read(id) {
            Ok(image) => {
                tracing::trace!(frame = %id, index, total = ids.len(), "Serving frame");
                Ok(image)
            }
            Err(e) => {
                self.cursor.retry_current();
                Err(StreamFailure::new(StreamError::Decode(e)))
            }
        }
    }

    /// Marks the stream unusable. Idempotent and non-blocking.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`PlaybackStream::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StreamFailure> {
        if self.is_closed() {
            return Err(StreamFailure::new(StreamError::Closed));
        }
        Ok(())
    }
}

/// Cloneable handle to one playback stream.
///
/// Clones share the cursor. `close` never waits for a pending `next`.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    stream: Mutex<PlaybackStream>,
    closed: Arc<AtomicBool>,
    frames_served: AtomicU64,
    errors: AtomicU64,
}

impl StreamHandle {
    /// Wraps a stream so it can be shared between callers.
    pub fn new(stream: PlaybackStream) -> Self {
        let closed = Arc::clone(&stream.closed);
        Self {
            inner: Arc::new(HandleInner {
                stream: Mutex::new(stream),
                closed,
                frames_served: AtomicU64::new(0),
                errors: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the next frame, see [`PlaybackStream::next`].
    pub fn next(&self) -> Result<DynamicImage, StreamFailure> {
        if self.is_closed() {
            return Err(StreamFailure::new(StreamError::Closed));
        }
        let result = self
            .inner
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next();
        match &result {
            Ok(_) => self.inner.frames_served.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.inner.errors.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    /// Marks the stream unusable. Idempotent and non-blocking.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Playback stream closed");
        }
    }

    /// Returns true once any clone has called [`StreamHandle::close`].
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Frames delivered so far.
    pub fn frames_served(&self) -> u64 {
        self.inner.frames_served.load(Ordering::Relaxed)
    }

    /// Failed `next` calls so far.
    pub fn errors(&self) -> u64 {
        self.inner.errors.load(Ordering::Relaxed)
    }

    /// Returns true if both handles refer to the same stream.
    pub fn same_stream(&self, other: &StreamHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("closed", &self.is_closed())
            .field("frames_served", &self.frames_served())
            .field("errors", &self.errors())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FrameFormat;
    use chrono::{Duration as ChronoDuration, Utc};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    const INTERVAL: Duration = Duration::from_millis(40);

    fn frame(value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([value, value, value])))
    }

    fn store_with(count: u8) -> (FrameStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = FrameStore::create(temp.path(), FrameFormat::Png).unwrap();
        let t0 = Utc::now();
        for i in 0..count {
            store
                .append(&frame(i * 10), t0 + ChronoDuration::seconds(i as i64))
                .unwrap();
        }
        (store, temp)
    }

    fn value_of(img: &DynamicImage) -> u8 {
        img.to_rgb8().get_pixel(0, 0)[0]
    }

    #[test]
    fn test_plays_in_order_and_wraps() {
        let (store, _temp) = store_with(3);
        let mut stream = PlaybackStream::new(store, INTERVAL);

        let values: Vec<u8> = (0..4)
            .map(|_| value_of(&stream.next().unwrap()))
            .collect();
        assert_eq!(values, vec![0, 10, 20, 0]);
    }

    #[test]
    fn test_next_is_paced() {
        let (store, _temp) = store_with(2);
        let mut stream = PlaybackStream::new(store, INTERVAL);

        stream.next().unwrap();
        let started = Instant::now();
        stream.next().unwrap();
        assert!(started.elapsed() >= INTERVAL - Duration::from_millis(2));
    }

    #[test]
    fn test_empty_store_errors() {
        let (store, _temp) = store_with(0);
        let mut stream = PlaybackStream::new(store, INTERVAL);

        let failure = stream.next().unwrap_err();
        assert!(matches!(failure.error, StreamError::EmptyStore(_)));
        assert_eq!(failure.placeholder.width(), crate::playback::PLACEHOLDER_SIZE);
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_missing_dir_is_list_error() {
        let temp = TempDir::new().unwrap();
        let store = FrameStore::open(temp.path().join("absent"), FrameFormat::Png);
        let mut stream = PlaybackStream::new(store, INTERVAL);

        assert!(matches!(
            stream.next().unwrap_err().error,
            StreamError::List(_)
        ));
    }

    #[test]
    fn test_decode_failure_retries_same_frame() {
        let (store, _temp) = store_with(1);
        let bad = store.append_encoded(b"broken", Utc::now() + ChronoDuration::hours(1)).unwrap();
        let mut stream = PlaybackStream::new(store.clone(), INTERVAL);

        assert_eq!(value_of(&stream.next().unwrap()), 0);
        let failure = stream.next().unwrap_err();
        assert!(matches!(failure.error, StreamError::Decode(_)));
        assert_eq!(stream.position(), 1);

        // Repair the frame; the retry reads it without waiting or advancing.
        let fixed = FrameFormat::Png.encode(&frame(99), 75).unwrap();
        std::fs::write(store.dir().join(bad.as_str()), fixed).unwrap();
        let started = Instant::now();
        assert_eq!(value_of(&stream.next().unwrap()), 99);
        assert!(started.elapsed() < INTERVAL);
        assert_eq!(stream.position(), 1);
    }

    #[test]
    fn test_corrupt_frame_is_skipped_at_playback_rate() {
        let temp = TempDir::new().unwrap();
        let store = FrameStore::create(temp.path(), FrameFormat::Png).unwrap();
        let t0 = Utc::now();
        store.append(&frame(10), t0).unwrap();
        store
            .append_encoded(b"broken", t0 + ChronoDuration::seconds(1))
            .unwrap();
        store
            .append(&frame(30), t0 + ChronoDuration::seconds(2))
            .unwrap();
        let mut stream = PlaybackStream::new(store, INTERVAL);

        let started = Instant::now();
        let mut served = Vec::new();
        let mut failures = 0;
        while served.len() < 3 {
            match stream.next() {
                Ok(image) => served.push(value_of(&image)),
                Err(failure) => {
                    assert!(matches!(failure.error, StreamError::Decode(_)));
                    failures += 1;
                    assert!(failures < 10, "stuck on corrupt frame");
                }
            }
        }

        assert_eq!(served, vec![10, 30, 10]);
        assert_eq!(failures, 2);
        // Three paced advances past the first frame.
        assert!(started.elapsed() >= INTERVAL * 3 - Duration::from_millis(5));
    }

    #[test]
    fn test_new_frames_become_visible() {
        let (store, _temp) = store_with(1);
        let mut stream = PlaybackStream::new(store.clone(), INTERVAL);
        assert_eq!(value_of(&stream.next().unwrap()), 0);

        store
            .append(&frame(50), Utc::now() + ChronoDuration::hours(1))
            .unwrap();
        assert_eq!(value_of(&stream.next().unwrap()), 50);
    }

    #[test]
    fn test_handle_close() {
        let (store, _temp) = store_with(2);
        let handle = StreamHandle::new(PlaybackStream::new(store, INTERVAL));
        let other = handle.clone();

        handle.next().unwrap();
        other.close();
        other.close();
        assert!(handle.is_closed());
        assert!(matches!(
            handle.next().unwrap_err().error,
            StreamError::Closed
        ));
        assert_eq!(handle.frames_served(), 1);
        assert_eq!(handle.errors(), 1);
        assert!(handle.same_stream(&other));
    }

    #[test]
    fn test_close_does_not_wait_for_pacing() {
        let (store, _temp) = store_with(2);
        let handle = StreamHandle::new(PlaybackStream::new(store, Duration::from_millis(300)));
        handle.next().unwrap();

        let reader = {
            let handle = handle.clone();
            thread::spawn(move || handle.next())
        };
        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        handle.close();
        assert!(started.elapsed() < Duration::from_millis(100));

        let result = reader.join().unwrap();
        assert!(matches!(result.unwrap_err().error, StreamError::Closed));
    }
}

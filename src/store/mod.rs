//! Directory-backed frame store.
//!
//! A session directory holds one file per captured frame. File names
//! encode the capture time in a fixed-width layout, so sorting names
//! sorts frames by capture time. The store is append-only: nothing here
//! deletes frames.
//!
//! Writers publish frames by renaming a fully written hidden temporary
//! file, so readers never observe a partially written frame.

mod format;
mod frame;

pub use format::FrameFormat;
pub use frame::FrameId;

use chrono::{DateTime, Duration, Utc};
use image::DynamicImage;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Errors that can occur during frame store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create frame directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to encode frame: {0}")]
    Encode(#[source] image::ImageError),
    #[error("failed to write frame {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to list frames in {path}: {source}")]
    List { path: PathBuf, source: io::Error },
    #[error("frame {0} not found")]
    NotFound(FrameId),
    #[error("failed to read frame {id}: {source}")]
    Read { id: FrameId, source: io::Error },
    #[error("failed to decode frame {id}: {source}")]
    Decode {
        id: FrameId,
        source: image::ImageError,
    },
}

/// Append-only collection of frames in one session directory.
///
/// Cloning is cheap; clones share the id sequence so appends through any
/// clone stay strictly ordered.
#[derive(Debug, Clone)]
pub struct FrameStore {
    dir: PathBuf,
    format: FrameFormat,
    jpeg_quality: u8,
    last_stamp: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl FrameStore {
    /// Creates the session directory (if needed) and opens the store.
    pub fn create(dir: impl Into<PathBuf>, format: FrameFormat) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        tracing::debug!(dir = %dir.display(), "Frame store ready");
        Ok(Self::open(dir, format))
    }

    /// Opens a store without touching the filesystem.
    ///
    /// Listing fails later if the directory does not exist.
    pub fn open(dir: impl Into<PathBuf>, format: FrameFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            jpeg_quality: 75,
            last_stamp: Arc::new(Mutex::new(None)),
        }
    }

    /// Sets the JPEG quality used by [`FrameStore::encode`].
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Session directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frame file format.
    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Encodes an image in the store's format.
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, StoreError> {
        self.format
            .encode(image, self.jpeg_quality)
            .map_err(StoreError::Encode)
    }

    /// Encodes and appends an image captured at `captured_at`.
    pub fn append(
        &self,
        image: &DynamicImage,
        captured_at: DateTime<Utc>,
    ) -> Result<FrameId, StoreError> {
        let bytes = self.encode(image)?;
        self.append_encoded(&bytes, captured_at)
    }

    /// Appends already encoded frame bytes.
    ///
    /// The id is derived from `captured_at`, bumped by one nanosecond past
    /// the previous append when needed so ids stay strictly increasing.
    pub fn append_encoded(
        &self,
        bytes: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<FrameId, StoreError> {
        let id = FrameId::from_timestamp(self.next_stamp(captured_at), self.format);
        let path = self.dir.join(id.as_str());
        let tmp = self.dir.join(format!(".{}.tmp", id));

        let written = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, &path));
        if let Err(source) = written {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Write { path, source });
        }

        tracing::trace!(frame = %id, bytes = bytes.len(), "Appended frame");
        Ok(id)
    }

    fn next_stamp(&self, captured_at: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self
            .last_stamp
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let stamp = match *last {
            Some(prev) if captured_at <= prev => prev + Duration::nanoseconds(1),
            _ => captured_at,
        };
        *last = Some(stamp);
        stamp
    }

    /// Lists frame ids in capture order.
    ///
    /// Hidden files and files with a foreign extension are skipped.
    pub fn list(&self) -> Result<Vec<FrameId>, StoreError> {
        let list_err = |source| StoreError::List {
            path: self.dir.clone(),
            source,
        };
        let extension = self.format.extension();

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let matches_ext = Path::new(&name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if matches_ext {
                ids.push(FrameId::from_file_name(name));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Number of frames currently stored.
    pub fn len(&self) -> Result<usize, StoreError> {
        self.list().map(|ids| ids.len())
    }

    /// Returns true if no frames are stored.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }

    /// Reads and decodes a frame.
    pub fn read(&self, id: &FrameId) -> Result<DynamicImage, StoreError> {
        let bytes = fs::read(self.dir.join(id.as_str())).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(id.clone())
            } else {
                StoreError::Read {
                    id: id.clone(),
                    source,
                }
            }
        })?;
        self.format
            .decode(&bytes)
            .map_err(|source| StoreError::Decode {
                id: id.clone(),
                source,
            })
    }
}

//! Frame identifiers derived from capture timestamps.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;

use super::FrameFormat;

/// Fixed-width UTC timestamp layout. Lexicographic order equals time order.
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.9fZ";

/// Identity of a stored frame: its file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(String);

impl FrameId {
    /// Builds the id for a frame captured at `captured_at`.
    pub fn from_timestamp(captured_at: DateTime<Utc>, format: FrameFormat) -> Self {
        Self(format!(
            "{}.{}",
            captured_at.format(STAMP_FORMAT),
            format.extension()
        ))
    }

    /// Wraps an existing file name without checking it.
    pub fn from_file_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// File name within the session directory.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the capture time back out of the file name.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        let stem = self.0.rsplit_once('.').map(|(stem, _)| stem)?;
        NaiveDateTime::parse_from_str(stem, STAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FrameId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_id_is_fixed_width() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 4, 5, 6).unwrap();
        let id = FrameId::from_timestamp(t, FrameFormat::Jpeg);
        assert_eq!(id.as_str(), "20240309T040506.000000000Z.jpg");
    }

    #[test]
    fn test_captured_at_round_trips() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 4, 5, 6).unwrap() + Duration::nanoseconds(42);
        let id = FrameId::from_timestamp(t, FrameFormat::Png);
        assert_eq!(id.captured_at(), Some(t));
    }

    #[test]
    fn test_foreign_name_has_no_timestamp() {
        assert_eq!(FrameId::from_file_name("holiday.jpg").captured_at(), None);
    }

    #[test]
    fn test_order_follows_time() {
        let t = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let earlier = FrameId::from_timestamp(t + Duration::nanoseconds(999_999_999), FrameFormat::Jpeg);
        let later = FrameId::from_timestamp(t + Duration::seconds(1), FrameFormat::Jpeg);
        assert!(earlier < later);
    }
}

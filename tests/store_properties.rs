mod common;

use chrono::{Duration, TimeZone, Utc};
use common::gray;
use proptest::prelude::*;
use tempfile::TempDir;
use timelapse_cam::{FrameFormat, FrameStore};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn appends_list_in_capture_order(offsets in prop::collection::vec(0i64..1_000_000_000, 1..12)) {
        let temp = TempDir::new().unwrap();
        let store = FrameStore::create(temp.path(), FrameFormat::Png).unwrap();
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let mut ids = Vec::new();
        let mut at = base;
        for (i, offset) in offsets.iter().enumerate() {
            at += Duration::nanoseconds(*offset);
            ids.push(store.append(&gray(i as u8), at).unwrap());
        }

        let listed = store.list().unwrap();
        prop_assert_eq!(listed.len(), offsets.len());
        prop_assert!(listed.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(&listed, &ids);
        for (i, id) in listed.iter().enumerate() {
            let image = store.read(id).unwrap();
            prop_assert_eq!(image.to_rgb8(), gray(i as u8).to_rgb8());
        }
    }

    #[test]
    fn ids_round_trip_their_timestamp(nanos in 0i64..4_000_000_000_000_000_000) {
        let at = Utc.timestamp_nanos(nanos);
        let id = timelapse_cam::FrameId::from_timestamp(at, FrameFormat::Jpeg);
        prop_assert_eq!(id.captured_at(), Some(at));
    }
}

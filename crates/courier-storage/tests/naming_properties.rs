//! Property-based tests for the file name codec.

use chrono::DateTime;
use courier_storage::naming::{decode, encode, truncate, MAX_MILLIS, NAME_LEN};
use proptest::prelude::*;

proptest! {
    #[test]
    fn decode_inverts_encode_at_millisecond_precision(millis in 0i64..=MAX_MILLIS, micros in 0i64..1_000) {
        let at = DateTime::from_timestamp_millis(millis).unwrap()
            + chrono::Duration::microseconds(micros);
        let name = encode(at);
        prop_assert_eq!(name.len(), NAME_LEN);
        prop_assert_eq!(decode(&name), Some(truncate(at)));
    }

    #[test]
    fn name_order_matches_time_order(a in 0i64..=MAX_MILLIS, b in 0i64..=MAX_MILLIS) {
        let ta = DateTime::from_timestamp_millis(a).unwrap();
        let tb = DateTime::from_timestamp_millis(b).unwrap();
        prop_assert_eq!(encode(ta).cmp(&encode(tb)), ta.cmp(&tb));
    }

    #[test]
    fn arbitrary_names_never_panic(name in "\\PC{0,20}") {
        if let Some(at) = decode(&name) {
            prop_assert_eq!(encode(at), name);
        }
    }
}

//! Mapping between file creation instants and file names.
//!
//! A batch file's name is its creation instant in whole milliseconds since
//! the Unix epoch, zero-padded to 13 decimal digits. This is the only place
//! the creation instant is persisted, so sub-millisecond precision is lost.
//!
//! Fixed width makes lexical order of names equal chronological order of
//! instants. The supported range is the 13-digit range:
//! 1970-01-01T00:00:00.000Z through 2286-11-20T17:46:39.999Z. Instants
//! outside it are clamped to the nearest bound when encoded.

use chrono::{DateTime, Utc};

/// Length of every name produced by [`encode`].
pub const NAME_LEN: usize = 13;

/// Largest millisecond value that fits in [`NAME_LEN`] digits.
pub const MAX_MILLIS: i64 = 9_999_999_999_999;

/// Encode a creation instant as a file name.
pub fn encode(at: DateTime<Utc>) -> String {
    format!(
        "{:0width$}",
        at.timestamp_millis().clamp(0, MAX_MILLIS),
        width = NAME_LEN
    )
}

/// Decode a file name back into its creation instant.
///
/// Returns `None` for any name [`encode`] cannot produce; such files are
/// not part of the queue.
pub fn decode(name: &str) -> Option<DateTime<Utc>> {
    if name.len() != NAME_LEN || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis: i64 = name.parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

/// Drop sub-millisecond precision so an instant equals its decoded name.
pub fn truncate(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis().clamp(0, MAX_MILLIS)).unwrap_or(at)
}

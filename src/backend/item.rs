//! The unit of data exchanged with a backend.

use bytes::Bytes;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Expiry times above this many seconds are absolute Unix timestamps
/// rather than offsets from now (30 days, as in memcached).
pub const MAX_RELATIVE_EXPTIME: i64 = 60 * 60 * 24 * 30;

/// An item handed to a backend by a storage command.
///
/// The connection handler builds it from the parsed command line plus the
/// data block and moves it into [`Setter::set`](super::Setter::set); it keeps
/// no reference afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    /// Opaque client tag
    pub flags: u32,
    /// When this item expires (None = never expires)
    pub expires: Option<SystemTime>,
    pub value: Bytes,
}

impl Item {
    /// Creates an item that never expires.
    pub fn new(key: impl Into<String>, flags: u32, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            flags,
            expires: None,
            value: value.into(),
        }
    }

    /// Sets the expiry from a protocol `exptime`, relative to the current time.
    pub fn set_expires(&mut self, exptime: i64) {
        self.expires = expiry_from(exptime, SystemTime::now());
    }

    /// Checks if this item has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    /// Checks if this item has expired as of `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|exp| now >= exp)
    }
}

/// Converts a protocol `exptime` into an absolute expiry time.
///
/// - `0` never expires
/// - negative values are already expired
/// - up to [`MAX_RELATIVE_EXPTIME`] seconds counts from `now`
/// - anything larger is seconds since the Unix epoch
pub fn expiry_from(exptime: i64, now: SystemTime) -> Option<SystemTime> {
    match exptime {
        0 => None,
        t if t < 0 => Some(now),
        t if t <= MAX_RELATIVE_EXPTIME => Some(now + Duration::from_secs(t as u64)),
        t => Some(UNIX_EPOCH + Duration::from_secs(t as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_never_expires() {
        let now = SystemTime::now();
        assert_eq!(expiry_from(0, now), None);

        let item = Item::new("k", 0, "v");
        assert!(!item.is_expired());
    }

    #[test]
    fn test_negative_is_expired() {
        let mut item = Item::new("k", 0, "v");
        item.set_expires(-1);
        assert!(item.is_expired());
    }

    #[test]
    fn test_relative_exptime() {
        let now = SystemTime::now();
        let exp = expiry_from(60, now).unwrap();
        assert_eq!(exp.duration_since(now).unwrap(), Duration::from_secs(60));

        let mut item = Item::new("k", 0, "v");
        item.expires = Some(exp);
        assert!(!item.is_expired_at(now));
        assert!(item.is_expired_at(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_relative_boundary() {
        let now = SystemTime::now();
        let exp = expiry_from(MAX_RELATIVE_EXPTIME, now).unwrap();
        assert!(exp > now);
        assert_eq!(
            exp.duration_since(now).unwrap(),
            Duration::from_secs(MAX_RELATIVE_EXPTIME as u64)
        );
    }

    #[test]
    fn test_absolute_exptime() {
        let now = SystemTime::now();
        let past = expiry_from(MAX_RELATIVE_EXPTIME + 1, now).unwrap();
        assert_eq!(
            past,
            UNIX_EPOCH + Duration::from_secs(MAX_RELATIVE_EXPTIME as u64 + 1)
        );

        let mut item = Item::new("k", 0, "v");
        item.expires = Some(past);
        // A 1970 timestamp is long gone
        assert!(item.is_expired_at(now));
    }
}

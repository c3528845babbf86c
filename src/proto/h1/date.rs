//! A once-per-second cached `Date` header value.
//!
//! Formatting an HTTP date on every response is wasted work when a server
//! is handling more than one request per second; grounded on hyper's
//! `proto/h1/date.rs` thread-local cache, reimplemented against
//! [`httpdate`] instead of the `time` crate this crate doesn't otherwise
//! depend on.

use std::cell::RefCell;
use std::time::{Duration, SystemTime};

const DATE_VALUE_LENGTH: usize = 29;

struct CachedDate {
    buf: [u8; DATE_VALUE_LENGTH],
    next_update: SystemTime,
}

impl CachedDate {
    fn new() -> Self {
        let mut date = CachedDate {
            buf: [0; DATE_VALUE_LENGTH],
            next_update: SystemTime::UNIX_EPOCH,
        };
        date.update(SystemTime::now());
        date
    }

    fn update(&mut self, now: SystemTime) {
        let rendered = httpdate::fmt_http_date(now);
        let bytes = rendered.as_bytes();
        let len = bytes.len().min(DATE_VALUE_LENGTH);
        self.buf[..len].copy_from_slice(&bytes[..len]);
        self.next_update = now + Duration::from_secs(1);
    }

    fn check(&mut self, now: SystemTime) {
        if now >= self.next_update {
            self.update(now);
        }
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf).unwrap_or("Thu, 01 Jan 1970 00:00:00 GMT")
    }
}

thread_local!(static CACHED: RefCell<CachedDate> = RefCell::new(CachedDate::new()));

/// Append `Date: <rfc7231 date>\r\n` to `dst` using the calling thread's
/// cached value, refreshing it if more than a second has passed.
pub(crate) fn extend_with_date(dst: &mut Vec<u8>) {
    CACHED.with(|cache| {
        let mut cache = cache.borrow_mut();
        cache.check(SystemTime::now());
        dst.extend_from_slice(b"date: ");
        dst.extend_from_slice(cache.as_str().as_bytes());
        dst.extend_from_slice(b"\r\n");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_well_formed_header_line() {
        let mut buf = Vec::new();
        extend_with_date(&mut buf);
        let line = String::from_utf8(buf).unwrap();
        assert!(line.starts_with("date: "));
        assert!(line.ends_with("GMT\r\n"));
    }
}

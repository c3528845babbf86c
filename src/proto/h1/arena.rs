//! Bounded, reusable scratch buffers for the parser.
//!
//! The parser copies request-line and header bytes into these as it scans
//! the connection's read buffer byte by byte. An arena starts at a default
//! capacity, grows on demand up to a hard maximum, and is reset (not
//! freed) between requests so a kept-alive connection doesn't reallocate
//! per request (`§5`).

use crate::error::Error;

/// A `Vec<u8>` that refuses to grow past `max`.
#[derive(Debug)]
pub(crate) struct Arena {
    buf: Vec<u8>,
    max: usize,
}

impl Arena {
    pub(crate) fn new(default_capacity: usize, max: usize) -> Self {
        Arena {
            buf: Vec::with_capacity(default_capacity.min(max)),
            max,
        }
    }

    /// Append a single byte, failing with `on_overflow` if this would push
    /// the arena past its configured maximum.
    pub(crate) fn push(&mut self, byte: u8, on_overflow: impl FnOnce() -> Error) -> Result<(), Error> {
        if self.buf.len() >= self.max {
            return Err(on_overflow());
        }
        self.buf.push(byte);
        Ok(())
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }

    /// Copy out the current contents as an owned `String`, lossily.
    pub(crate) fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_growth_past_max() {
        let mut arena = Arena::new(2, 3);
        arena.push(b'a', Error::path_buffer_overflow).unwrap();
        arena.push(b'b', Error::path_buffer_overflow).unwrap();
        arena.push(b'c', Error::path_buffer_overflow).unwrap();
        let err = arena.push(b'd', Error::path_buffer_overflow).unwrap_err();
        assert_eq!(err.status_code(), crate::error::Error::path_buffer_overflow().status_code());
    }

    #[test]
    fn clear_allows_reuse() {
        let mut arena = Arena::new(4, 4);
        arena.push(b'x', Error::path_buffer_overflow).unwrap();
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.to_string_lossy(), "");
    }
}

//! HTTP protocol version.

use std::fmt;

use crate::error::Error;

/// The HTTP version carried on the request/status line.
///
/// Defaults to [`Proto::Http11`] on a freshly accepted connection, so that
/// an error response can still be rendered even if the very first byte of
/// the request turns out to be invalid (`§3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Proto {
    /// HTTP/0.9 (no headers, body runs to EOF).
    Http09,
    /// HTTP/1.0
    Http10,
    /// HTTP/1.1
    #[default]
    Http11,
}

impl Proto {
    pub(crate) fn parse(token: &[u8]) -> Result<Proto, Error> {
        match token {
            b"HTTP/0.9" => Ok(Proto::Http09),
            b"HTTP/1.0" => Ok(Proto::Http10),
            b"HTTP/1.1" => Ok(Proto::Http11),
            _ => Err(Error::protocol_not_supported()),
        }
    }

    /// The wire representation, e.g. `"HTTP/1.1"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Proto::Http09 => "HTTP/0.9",
            Proto::Http10 => "HTTP/1.0",
            Proto::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! The request body.
//!
//! `§4.D`/`§4.H`: the connection driver fully drains a request's body
//! before handing the request to the router, respecting `Content-Length`,
//! `Transfer-Encoding: chunked`, and [`crate::config::BodyConfig::max_length`]
//! while doing so. [`Body`] therefore wraps an already-decoded, in-memory
//! [`Bytes`] buffer rather than a live connection to the socket; [`Body::stream`]
//! replays that buffer in fixed-size frames for handlers written against a
//! streaming-shaped API, but no further I/O happens while a handler iterates
//! it. This trades true backpressure for a request type with no borrowed
//! connection state, which keeps [`crate::request::Request`] plain data.

pub(crate) mod decode;

pub use decode::{ContentDecoder, DecoderRegistry};

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// An eagerly buffered request body.
#[derive(Debug, Clone, Default)]
pub struct Body {
    data: Bytes,
    content_type: Option<String>,
}

impl Body {
    pub(crate) fn new(data: Bytes, content_type: Option<String>) -> Self {
        Body { data, content_type }
    }

    pub(crate) fn empty() -> Self {
        Body { data: Bytes::new(), content_type: None }
    }

    /// The number of bytes in the body.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole body as a single contiguous buffer.
    pub fn full(&self) -> &Bytes {
        &self.data
    }

    /// Consume the body, returning the underlying buffer.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Iterate the body in frames of at most `frame_size` bytes.
    ///
    /// The whole body is already in memory, so this never performs I/O or
    /// yields a pending state; it exists so handlers can be written against
    /// a frame-at-a-time shape regardless of how the body arrived on the
    /// wire.
    pub fn stream(&self, frame_size: usize) -> Frames<'_> {
        Frames {
            data: &self.data,
            frame_size: frame_size.max(1),
        }
    }

    /// The request's `Content-Type` header value, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Decode the body as JSON.
    ///
    /// Returns [`Error::unsupported_media_type`] if `Content-Type` was
    /// present and its media type (ignoring any `;`-separated parameters)
    /// isn't `application/json`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if let Some(content_type) = &self.content_type {
            let media_type = content_type.split(';').next().unwrap_or("").trim();
            if !media_type.eq_ignore_ascii_case("application/json") {
                return Err(Error::unsupported_media_type());
            }
        }
        serde_json::from_slice(&self.data).map_err(Error::user)
    }

    pub(crate) fn reset(&mut self, data: Bytes) {
        self.data = data;
    }
}

/// An iterator over a [`Body`] yielding fixed-size byte frames.
#[derive(Debug)]
pub struct Frames<'a> {
    data: &'a [u8],
    frame_size: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }
        let n = self.frame_size.min(self.data.len());
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Some(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_splits_on_boundaries() {
        let body = Body::new(Bytes::from_static(b"abcdefghij"), None);
        let frames: Vec<&[u8]> = body.stream(4).collect();
        assert_eq!(frames, vec![b"abcd".as_slice(), b"efgh", b"ij"]);
    }

    #[test]
    fn empty_body_yields_no_frames() {
        let body = Body::empty();
        assert_eq!(body.stream(4).count(), 0);
    }

    #[derive(serde::Deserialize, PartialEq, Debug)]
    struct Payload {
        ok: bool,
    }

    #[test]
    fn json_decodes_with_no_content_type() {
        let body = Body::new(Bytes::from_static(br#"{"ok":true}"#), None);
        assert_eq!(body.json::<Payload>().unwrap(), Payload { ok: true });
    }

    #[test]
    fn json_decodes_with_matching_content_type_and_parameters() {
        let body = Body::new(
            Bytes::from_static(br#"{"ok":true}"#),
            Some("application/json; charset=utf-8".to_string()),
        );
        assert_eq!(body.json::<Payload>().unwrap(), Payload { ok: true });
    }

    #[test]
    fn json_rejects_mismatched_content_type() {
        let body = Body::new(
            Bytes::from_static(br#"{"ok":true}"#),
            Some("text/plain".to_string()),
        );
        let err = body.json::<Payload>().unwrap_err();
        assert_eq!(err.status_code().unwrap().0, 415);
    }
}

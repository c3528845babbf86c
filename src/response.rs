//! The fluent response builder handed back by a handler or middleware.
//!
//! Grounded in the Go `Response` builder surface referenced from
//! `router/inbuilt/defaulterrhandlers.go` (`request.Respond.WithError(err)`)
//! and the renderer's two body shapes in `internal/render/engine.go`
//! (`renderHeaders`/`renderFile`): a response carries either an in-memory
//! body or a file path to stream, never both.

use std::path::PathBuf;

use bytes::Bytes;

use crate::error::Error;
use crate::headers::Headers;
use crate::status::StatusCode;

#[derive(Debug)]
pub(crate) enum Payload {
    Empty,
    Bytes(Bytes),
    File(PathBuf),
}

/// A response under construction.
///
/// Built fluently: `Response::new().status(StatusCode::OK).header("x-a",
/// "1").string("hi")`. Setting a body via [`Response::string`] or
/// [`Response::bytes`] after [`Response::file`] (or vice versa) discards
/// the previous body, since the renderer only knows how to send one kind
/// at a time (`§4.F`).
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    payload: Payload,
}

impl Default for Response {
    fn default() -> Self {
        Response {
            status: StatusCode::OK,
            headers: Headers::new(),
            payload: Payload::Empty,
        }
    }
}

impl Response {
    /// A `200 OK` response with no headers and an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status code from a raw number.
    pub fn code(mut self, code: u16) -> Self {
        self.status = StatusCode(code);
        self
    }

    /// Set the status code.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Append a header field.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    /// Set the body to a UTF-8 string.
    pub fn string(mut self, body: impl Into<String>) -> Self {
        self.payload = Payload::Bytes(Bytes::from(body.into().into_bytes()));
        self
    }

    /// Set the body to raw bytes.
    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.payload = Payload::Bytes(body.into());
        self
    }

    /// Serialize `value` as JSON and set it as the body, plus a
    /// `Content-Type: application/json` header if one isn't already set.
    pub fn json<S: serde::Serialize>(mut self, value: &S) -> Result<Self, Error> {
        let body = serde_json::to_vec(value).map_err(Error::user)?;
        if !self.headers.contains("content-type") {
            self.headers.append("content-type", "application/json");
        }
        self.payload = Payload::Bytes(Bytes::from(body));
        Ok(self)
    }

    /// Stream a file from disk as the body (`§4.F`, file-serving fast
    /// path).
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.payload = Payload::File(path.into());
        self
    }

    /// Fill in status and body from an [`Error`], the way a default error
    /// handler does.
    pub fn with_error(mut self, err: &Error) -> Self {
        self.status = err.status_code().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.payload = Payload::Bytes(Bytes::from(err.text().as_bytes().to_vec()));
        self
    }

    /// Reset to a pristine `200 OK` / empty-body state, so the allocation
    /// backing `headers` can be reused for the next request on a
    /// kept-alive connection.
    pub(crate) fn clear(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.payload = Payload::Empty;
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        self.status
    }

    pub(crate) fn headers(&self) -> &Headers {
        &self.headers
    }

    pub(crate) fn payload(&self) -> &Payload {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_file_after_string_discards_string() {
        let resp = Response::new().string("hello").file("/tmp/x");
        assert!(matches!(resp.payload(), Payload::File(_)));
    }

    #[test]
    fn with_error_uses_mapped_status() {
        let resp = Response::new().with_error(&Error::not_found());
        assert_eq!(resp.status_code().0, 404);
    }
}

//! Error and Result types.
//!
//! Mirrors the error taxonomy a connection driver needs: every variant here
//! either maps to a fixed HTTP status via [`Error::status_code`], or is one
//! of the three "just close the connection" kinds that never reach a wire
//! status at all.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use crate::status::StatusCode;

/// A specialized `Result` for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An opaque error produced by the parser, body reader, renderer, or router.
///
/// The concrete failure is hidden behind [`Kind`]; callers that need to
/// branch on it use [`Error::status_code`] or [`Error::is_fatal`] rather
/// than matching on crate-private internals.
pub struct Error {
    kind: Kind,
    cause: Option<Box<dyn StdError + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Kind {
    InvalidMethod,
    InvalidPath,
    InvalidHeader,
    InvalidContentLength,
    RequestSyntaxError,
    BufferOverflowHeaders,
    BufferOverflowPath,
    BadChunk,
    BodyTooBig,
    UnsupportedMediaType,
    UnsupportedEncoding,
    ProtocolNotSupported,
    MethodNotAllowed,
    NotFound,
    NotImplemented,
    ConnectionTimeout,
    CloseConnection,
    ConnWrite,
    ParserIsDead,
    /// Wraps an `io::Error` encountered talking to the socket or a file.
    Io,
    /// A handler- or decoder-supplied error that doesn't fit the table above.
    User,
}

impl Error {
    fn new(kind: Kind) -> Self {
        Error { kind, cause: None }
    }

    fn with_cause(kind: Kind, cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Error {
            kind,
            cause: Some(cause.into()),
        }
    }

    pub(crate) fn invalid_method() -> Self {
        Self::new(Kind::InvalidMethod)
    }

    pub(crate) fn invalid_path() -> Self {
        Self::new(Kind::InvalidPath)
    }

    pub(crate) fn invalid_header() -> Self {
        Self::new(Kind::InvalidHeader)
    }

    pub(crate) fn invalid_content_length() -> Self {
        Self::new(Kind::InvalidContentLength)
    }

    pub(crate) fn syntax() -> Self {
        Self::new(Kind::RequestSyntaxError)
    }

    pub(crate) fn header_buffer_overflow() -> Self {
        Self::new(Kind::BufferOverflowHeaders)
    }

    pub(crate) fn path_buffer_overflow() -> Self {
        Self::new(Kind::BufferOverflowPath)
    }

    pub(crate) fn bad_chunk() -> Self {
        Self::new(Kind::BadChunk)
    }

    pub(crate) fn body_too_big() -> Self {
        Self::new(Kind::BodyTooBig)
    }

    /// Content-Type was present but not one the decoder recognizes.
    pub fn unsupported_media_type() -> Self {
        Self::new(Kind::UnsupportedMediaType)
    }

    pub(crate) fn unsupported_encoding() -> Self {
        Self::new(Kind::UnsupportedEncoding)
    }

    pub(crate) fn protocol_not_supported() -> Self {
        Self::new(Kind::ProtocolNotSupported)
    }

    pub(crate) fn method_not_allowed() -> Self {
        Self::new(Kind::MethodNotAllowed)
    }

    /// No route matched the request's path.
    pub fn not_found() -> Self {
        Self::new(Kind::NotFound)
    }

    pub(crate) fn not_implemented() -> Self {
        Self::new(Kind::NotImplemented)
    }

    pub(crate) fn connection_timeout() -> Self {
        Self::new(Kind::ConnectionTimeout)
    }

    pub(crate) fn close_connection() -> Self {
        Self::new(Kind::CloseConnection)
    }

    pub(crate) fn conn_write() -> Self {
        Self::new(Kind::ConnWrite)
    }

    pub(crate) fn parser_is_dead() -> Self {
        Self::new(Kind::ParserIsDead)
    }

    pub(crate) fn io(err: io::Error) -> Self {
        Self::with_cause(Kind::Io, err)
    }

    /// Wrap an arbitrary error surfaced by a handler or a pluggable decoder
    /// (e.g. a JSON deserialization failure from [`crate::body::Body::json`]).
    pub fn user(cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::with_cause(Kind::User, cause)
    }

    pub(crate) fn kind(&self) -> Kind {
        self.kind
    }

    /// The HTTP status this error maps to, per the fixed table.
    ///
    /// Returns `None` for the three kinds that only mean "close the
    /// connection" and never produce a rendered response body.
    pub fn status_code(&self) -> Option<StatusCode> {
        use Kind::*;
        let code = match self.kind {
            InvalidMethod | InvalidPath | InvalidHeader | InvalidContentLength
            | RequestSyntaxError => StatusCode::BAD_REQUEST,
            BufferOverflowHeaders => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            BufferOverflowPath => StatusCode::URI_TOO_LONG,
            BadChunk => StatusCode::BAD_REQUEST,
            BodyTooBig => StatusCode::PAYLOAD_TOO_LARGE,
            UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            UnsupportedEncoding => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ProtocolNotSupported => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            NotFound => StatusCode::NOT_FOUND,
            NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ConnectionTimeout => StatusCode::REQUEST_TIMEOUT,
            User => StatusCode::INTERNAL_SERVER_ERROR,
            CloseConnection | ConnWrite | ParserIsDead | Io => return None,
        };
        Some(code)
    }

    /// A short, fixed message suitable as an error response body.
    pub fn text(&self) -> &'static str {
        use Kind::*;
        match self.kind {
            InvalidMethod => "invalid method",
            InvalidPath => "invalid path",
            InvalidHeader => "invalid header",
            InvalidContentLength => "invalid content-length",
            RequestSyntaxError => "malformed request line",
            BufferOverflowHeaders => "header fields too large",
            BufferOverflowPath => "uri too long",
            BadChunk => "malformed chunked encoding",
            BodyTooBig => "request body too large",
            UnsupportedMediaType | UnsupportedEncoding => "unsupported media type",
            ProtocolNotSupported => "http version not supported",
            MethodNotAllowed => "method not allowed",
            NotFound => "not found",
            NotImplemented => "not implemented",
            ConnectionTimeout => "request timed out",
            CloseConnection | ConnWrite | ParserIsDead | Io | User => "internal server error",
        }
    }

    /// Whether this error means the connection must be closed rather than
    /// kept alive after a response (or without any response at all).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            Kind::CloseConnection | Kind::ConnWrite | Kind::ParserIsDead | Kind::Io
        )
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Error");
        s.field("kind", &self.kind);
        if let Some(cause) = &self.cause {
            s.field("cause", cause);
        }
        s.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.text(), cause),
            None => f.write_str(self.text()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn StdError + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err)
    }
}

//! The incremental request-line/header parser.
//!
//! A byte-at-a-time Mealy machine, one state transition per input byte,
//! so it can resume cleanly across arbitrary chunk boundaries: the
//! connection driver feeds it whatever the last `read()` returned, however
//! that happened to split a request. Grounded directly on the Go
//! `httpparser.go` state machine (`eMethod`, `ePath`, `eProtocol`,
//! `eHeaderKey`, ... `eDead`), translated state-for-state into Rust.
//!
//! A parser that hits a fatal error moves to [`State::Dead`] and stays
//! there; [`Parser::parse`] on a dead parser always fails immediately
//! (`§4.A`: "once dead, a parser never resumes").

use crate::error::Error;
use crate::headers::Headers;
use crate::method::Method;
use crate::proto::h1::arena::Arena;
use crate::query::{self};
use crate::version::Proto;

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const SP: u8 = b' ';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    MessageBegin,
    Method,
    Path,
    Query,
    Http09Lf,
    Proto,
    ProtoCr,
    ProtoLf,
    HeaderKey,
    HeaderOws,
    HeaderValue,
    HeaderValueCr,
    HeaderValueLf,
    HeadersDoneCr,
    Dead,
}

/// The request line and headers, once fully parsed.
#[derive(Debug)]
pub(crate) struct ParsedHead {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) raw_query: String,
    pub(crate) proto: Proto,
    pub(crate) headers: Headers,
    pub(crate) content_length: Option<u64>,
    pub(crate) chunked: bool,
    pub(crate) content_type: Option<String>,
    pub(crate) upgrade: Option<String>,
}

/// Limits the parser enforces while accumulating request-line and header
/// bytes. Copied out of [`crate::config::Config`] at construction so the
/// parser itself doesn't need to borrow it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParserLimits {
    pub(crate) path_default: usize,
    pub(crate) path_max: usize,
    pub(crate) key_max: usize,
    pub(crate) value_default: usize,
    pub(crate) value_max: usize,
    pub(crate) headers_max: usize,
}

/// An in-progress parse of one request's head.
pub(crate) struct Parser {
    state: State,
    limits: ParserLimits,
    method_buf: Arena,
    path_buf: Arena,
    query_buf: Arena,
    proto_buf: Arena,
    key_buf: Arena,
    value_buf: Arena,
    headers: Headers,
    header_count: usize,
    method: Option<Method>,
}

impl Parser {
    pub(crate) fn new(limits: ParserLimits) -> Self {
        Parser {
            state: State::MessageBegin,
            method_buf: Arena::new(8, 16),
            path_buf: Arena::new(limits.path_default, limits.path_max),
            query_buf: Arena::new(limits.path_default, limits.path_max),
            proto_buf: Arena::new(8, 16),
            key_buf: Arena::new(32, limits.key_max),
            value_buf: Arena::new(limits.value_default, limits.value_max),
            headers: Headers::with_capacity(limits.headers_max.min(32)),
            header_count: 0,
            method: None,
            limits,
        }
    }

    /// Reset all arenas and state so this parser can be reused for the
    /// next request on the same connection.
    pub(crate) fn reset(&mut self) {
        self.state = State::MessageBegin;
        self.method_buf.clear();
        self.path_buf.clear();
        self.query_buf.clear();
        self.proto_buf.clear();
        self.key_buf.clear();
        self.value_buf.clear();
        self.headers.clear();
        self.header_count = 0;
        self.method = None;
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.state == State::Dead
    }

    fn die<E>(&mut self, err: E) -> Error
    where
        E: Into<Error>,
    {
        self.state = State::Dead;
        err.into()
    }

    /// Feed `input` into the machine. Returns the number of bytes
    /// consumed and, once the head is complete, the parsed result. Any
    /// bytes in `input` after the consumed prefix belong to the body (or
    /// the next pipelined request line, though this driver never attempts
    /// pipelined concurrency) and must be re-fed by the caller.
    pub(crate) fn parse(&mut self, input: &[u8]) -> Result<(usize, Option<ParsedHead>), Error> {
        if self.state == State::Dead {
            return Err(Error::parser_is_dead());
        }

        let mut i = 0;
        while i < input.len() {
            let b = input[i];
            match self.state {
                State::MessageBegin => {
                    if b == CR || b == LF {
                        // tolerate a stray leading CRLF between pipelined
                        // requests, matching common server behavior.
                        i += 1;
                        continue;
                    }
                    self.state = State::Method;
                    continue;
                }
                State::Method => {
                    if b == SP {
                        let method = Method::parse(self.method_buf.as_slice())
                            .map_err(|e| self.die(e))?;
                        self.method = Some(method);
                        self.state = State::Path;
                    } else {
                        self.method_buf
                            .push(b, || Error::invalid_method())
                            .map_err(|e| self.die(e))?;
                    }
                }
                State::Path => match b {
                    SP => self.state = State::Proto,
                    b'?' => self.state = State::Query,
                    CR => {
                        // HTTP/0.9 simple-request: no version, no headers.
                        self.state = State::Http09Lf;
                    }
                    _ => {
                        self.path_buf
                            .push(b, Error::path_buffer_overflow)
                            .map_err(|e| self.die(e))?;
                    }
                },
                State::Query => match b {
                    SP => self.state = State::Proto,
                    CR => self.state = State::Http09Lf,
                    _ => {
                        self.query_buf
                            .push(b, Error::path_buffer_overflow)
                            .map_err(|e| self.die(e))?;
                    }
                },
                State::Http09Lf => {
                    if b != LF {
                        return Err(self.die(Error::syntax()));
                    }
                    let head = self.finish(Proto::Http09)?;
                    return Ok((i + 1, Some(head)));
                }
                State::Proto => {
                    if b == CR {
                        self.state = State::ProtoCr;
                    } else {
                        self.proto_buf
                            .push(b, Error::path_buffer_overflow)
                            .map_err(|e| self.die(e))?;
                    }
                }
                State::ProtoCr => {
                    if b != LF {
                        return Err(self.die(Error::syntax()));
                    }
                    self.state = State::ProtoLf;
                }
                State::ProtoLf => {
                    if b == CR {
                        self.state = State::HeadersDoneCr;
                    } else {
                        self.state = State::HeaderKey;
                        continue;
                    }
                }
                State::HeaderKey => match b {
                    b':' => self.state = State::HeaderOws,
                    CR => {
                        // a header line with no colon at all
                        return Err(self.die(Error::invalid_header()));
                    }
                    _ => {
                        self.header_count_guard()?;
                        self.key_buf
                            .push(b.to_ascii_lowercase(), Error::header_buffer_overflow)
                            .map_err(|e| self.die(e))?;
                    }
                },
                State::HeaderOws => match b {
                    SP | b'\t' => {}
                    CR => {
                        self.state = State::HeaderValueCr;
                    }
                    _ => {
                        self.state = State::HeaderValue;
                        continue;
                    }
                },
                State::HeaderValue => match b {
                    CR => self.state = State::HeaderValueCr,
                    _ => {
                        self.value_buf
                            .push(b, Error::header_buffer_overflow)
                            .map_err(|e| self.die(e))?;
                    }
                },
                State::HeaderValueCr => {
                    if b != LF {
                        return Err(self.die(Error::syntax()));
                    }
                    self.commit_header();
                    self.state = State::HeaderValueLf;
                }
                State::HeaderValueLf => {
                    if b == CR {
                        self.state = State::HeadersDoneCr;
                    } else {
                        self.state = State::HeaderKey;
                        continue;
                    }
                }
                State::HeadersDoneCr => {
                    if b != LF {
                        return Err(self.die(Error::syntax()));
                    }
                    let head = self.finish(Proto::Http11)?;
                    return Ok((i + 1, Some(head)));
                }
                State::Dead => {
                    tracing::error!("BUG: parser fed another byte while already dead");
                    unreachable!("BUG: checked above")
                }
            }
            i += 1;
        }
        Ok((i, None))
    }

    fn header_count_guard(&mut self) -> Result<(), Error> {
        if self.key_buf.is_empty() {
            self.header_count += 1;
            if self.header_count > self.limits.headers_max {
                return Err(self.die(Error::header_buffer_overflow()));
            }
        }
        Ok(())
    }

    fn commit_header(&mut self) {
        let key = self.key_buf.to_string_lossy();
        let value = self.value_buf.to_string_lossy();
        self.headers.append(key, value.trim().to_string());
        self.key_buf.clear();
        self.value_buf.clear();
    }

    fn finish(&mut self, mut proto: Proto) -> Result<ParsedHead, Error> {
        if proto != Proto::Http09 {
            proto = Proto::parse(self.proto_buf.as_slice()).map_err(|e| self.die(e))?;
        }
        let method = self.method.ok_or_else(|| self.die(Error::syntax()))?;
        let path = query::decode_path(&self.path_buf.to_string_lossy());
        let raw_query = self.query_buf.to_string_lossy();
        let headers = std::mem::replace(&mut self.headers, Headers::new());

        let content_length = match headers.get("content-length") {
            Some(v) => Some(
                v.trim()
                    .parse::<u64>()
                    .map_err(|_| self.die(Error::invalid_content_length()))?,
            ),
            None => None,
        };
        let chunked = match headers.get("transfer-encoding") {
            Some(v) => {
                if !v.split(',').all(|tok| tok.trim().eq_ignore_ascii_case("chunked")) {
                    return Err(self.die(Error::unsupported_encoding()));
                }
                true
            }
            None => false,
        };

        if chunked && content_length.is_some() {
            return Err(self.die(Error::invalid_content_length()));
        }

        let content_type = headers.get("content-type").map(|s| s.to_string());
        let upgrade = headers.get("upgrade").map(|s| s.to_string());

        Ok(ParsedHead {
            method,
            path,
            raw_query,
            proto,
            headers,
            content_length,
            chunked,
            content_type,
            upgrade,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ParserLimits {
        ParserLimits {
            path_default: 64,
            path_max: 1024,
            key_max: 64,
            value_default: 64,
            value_max: 1024,
            headers_max: 32,
        }
    }

    #[test]
    fn parses_simple_get() {
        let mut p = Parser::new(limits());
        let input = b"GET /hello?x=1 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (consumed, head) = p.parse(input).unwrap();
        assert_eq!(consumed, input.len());
        let head = head.unwrap();
        assert_eq!(head.method, Method::Get);
        assert_eq!(head.path, "/hello");
        assert_eq!(head.raw_query, "x=1");
        assert_eq!(head.proto, Proto::Http11);
        assert_eq!(head.headers.get("host"), Some("example.com"));
    }

    #[test]
    fn resumes_across_arbitrary_splits() {
        let mut p = Parser::new(limits());
        let input = b"POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\n";
        let mut head = None;
        for chunk in input.chunks(1) {
            let (consumed, h) = p.parse(chunk).unwrap();
            assert_eq!(consumed, chunk.len());
            if h.is_some() {
                head = h;
            }
        }
        let head = head.unwrap();
        assert_eq!(head.method, Method::Post);
        assert_eq!(head.content_length, Some(3));
    }

    #[test]
    fn rejects_conflicting_framing_headers() {
        let mut p = Parser::new(limits());
        let input =
            b"POST /a HTTP/1.1\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\n";
        let err = p.parse(input).unwrap_err();
        assert_eq!(err.status_code(), Error::invalid_content_length().status_code());
        assert!(p.is_dead());
    }

    #[test]
    fn dead_parser_never_resumes() {
        let mut p = Parser::new(limits());
        let _ = p.parse(b"BOGUS /a HTTP/1.1\r\n\r\n");
        assert!(p.is_dead());
        let err = p.parse(b"GET / HTTP/1.1\r\n\r\n").unwrap_err();
        assert_eq!(err.status_code(), Error::parser_is_dead().status_code());
    }

    #[test]
    fn http09_request_has_no_headers() {
        let mut p = Parser::new(limits());
        let (consumed, head) = p.parse(b"GET /old\r\n").unwrap();
        assert_eq!(consumed, 10);
        let head = head.unwrap();
        assert_eq!(head.proto, Proto::Http09);
        assert!(head.headers.is_empty());
    }
}

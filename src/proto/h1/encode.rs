//! Status-line and header rendering.
//!
//! Grounded in `internal/render/engine.go`: `renderHeaders`'s
//! erase-matching-default-then-append-remaining-defaults merge, and the
//! prebaked status line fast path mirrored here via
//! [`crate::status::StatusCode::prebaked_line`].

use crate::headers::Headers;
use crate::proto::h1::date;
use crate::status::StatusCode;
use crate::version::Proto;

/// Render a status line plus headers into a fresh buffer. The caller
/// appends the body (or streams a file) after this.
///
/// `content_length` is the number of body bytes that will follow on the
/// wire; it is still sent for a `HEAD` response even though the body
/// itself is omitted, per `§4.F`.
pub(crate) fn render_head(
    status: StatusCode,
    headers: &Headers,
    default_headers: &Headers,
    content_length: u64,
    keep_alive: bool,
    proto: Proto,
    buf_capacity: usize,
) -> Vec<u8> {
    let mut dst = Vec::with_capacity(buf_capacity);

    write_status_line(&mut dst, status, proto);
    date::extend_with_date(&mut dst);

    for (key, value) in headers.iter() {
        write_header(&mut dst, key, value);
    }
    for (key, value) in default_headers.iter() {
        if !headers.contains(key) {
            write_header(&mut dst, key, value);
        }
    }

    if !headers.contains("content-length") && !default_headers.contains("content-length") {
        write_header(&mut dst, "content-length", itoa::Buffer::new().format(content_length));
    }

    if !headers.contains("connection") && !default_headers.contains("connection") {
        write_header(
            &mut dst,
            "connection",
            if keep_alive { "keep-alive" } else { "close" },
        );
    }

    dst.extend_from_slice(b"\r\n");
    dst
}

fn write_status_line(dst: &mut Vec<u8>, status: StatusCode, proto: Proto) {
    dst.extend_from_slice(proto.as_str().as_bytes());
    dst.push(b' ');
    match status.prebaked_line() {
        Some(line) => dst.extend_from_slice(line.as_bytes()),
        None => {
            let mut code_buf = itoa::Buffer::new();
            dst.extend_from_slice(code_buf.format(status.0).as_bytes());
            dst.push(b' ');
            dst.extend_from_slice(status.reason().as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
    }
}

fn write_header(dst: &mut Vec<u8>, key: &str, value: &str) {
    dst.extend_from_slice(key.as_bytes());
    dst.extend_from_slice(b": ");
    dst.extend_from_slice(value.as_bytes());
    dst.extend_from_slice(b"\r\n");
}

/// Whether a connection should be kept alive after this exchange, given
/// the request's protocol version and `Connection` header
/// (`isKeepAlive` in `engine.go`): HTTP/1.1 defaults to keep-alive unless
/// `Connection: close` is present; HTTP/1.0 and HTTP/0.9 default to close
/// unless `Connection: keep-alive` is present.
pub(crate) fn is_keep_alive(proto: Proto, headers: &Headers) -> bool {
    match proto {
        Proto::Http11 => !headers.connection_is_close(),
        Proto::Http10 => headers.connection_is_keep_alive(),
        Proto::Http09 => false,
    }
}

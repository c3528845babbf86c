//! The per-connection driver loop.
//!
//! One task per connection, fully sequential: a request is read, fully
//! dispatched, and its response fully written before the next request on
//! the same connection is read (`§1`: no pipelining concurrency).
//! Grounded directly in `internal/server/http/http.go`'s
//! `Server.Run`/`HandleRequest`: read → parse → (upgrade pre-write) →
//! dispatch → hijack check → render → loop-or-close.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::body::decode::Decoder;
use crate::body::Body;
use crate::config::Config;
use crate::error::Error;
use crate::headers::Headers;
use crate::method::Method;
use crate::proto::h1::encode;
use crate::proto::h1::parse::{ParsedHead, Parser, ParserLimits};
use crate::query::Query;
use crate::request::Request;
use crate::response::{Payload, Response};
use crate::router::Router;
use crate::status::StatusCode;
use crate::version::Proto;
use tracing::{debug, trace, warn, Instrument};

fn parser_limits(config: &Config) -> ParserLimits {
    ParserLimits {
        path_default: config.url.buffer_size_default,
        path_max: config.url.buffer_size_max,
        key_max: config.headers.max_key_length,
        value_default: config.headers.value_space_default,
        value_max: config.headers.value_space_max,
        headers_max: config.headers.number_max,
    }
}

/// Drive one accepted connection to completion.
///
/// Returns once the connection is closed, either because the peer closed
/// it, a protocol error forced a close, or a handler took ownership of
/// the socket via [`Request::hijack`].
pub async fn serve_connection<T>(
    io: T,
    router: Arc<Router<T>>,
    config: Config,
    default_headers: Headers,
    remote: SocketAddr,
) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
    let span = tracing::info_span!("connection", remote = %remote);
    run(io, router, config, default_headers, remote).instrument(span).await
}

async fn run<T>(
    io: T,
    router: Arc<Router<T>>,
    config: Config,
    default_headers: Headers,
    remote: SocketAddr,
) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
    let mut io = Some(io);
    let mut pending: Vec<u8> = Vec::new();
    let mut tmp = vec![0u8; config.tcp.read_buffer_size];
    let mut parser = Parser::new(parser_limits(&config));
    let keep_params = config.url.disable_params_map_clear;
    // Allocated once at accept time and reused for every request on this
    // connection (`§3`); `None` only before the first request is parsed.
    let mut req: Option<Request<T>> = None;

    loop {
        let head = match read_head(&mut io, &mut pending, &mut tmp, &mut parser, &config).await {
            Ok(Some(head)) => head,
            Ok(None) => {
                trace!("connection closed at a request boundary");
                return Ok(());
            }
            Err(err) => {
                if err.is_fatal() {
                    return Err(err);
                }
                // No request line has parsed yet, so there is no real protocol
                // version to answer with; `§3` mandates defaulting to 1.1 so
                // this response is still renderable. `OnError` still runs
                // against the router so a registered error handler (or
                // `AllErrors`) sees timeouts and malformed requests, not just
                // the driver's own error synthesis (`§4.H` step 1).
                debug!(reason = err.text(), "closing connection after a protocol violation");
                route_driver_error(
                    &mut io,
                    &router,
                    &config,
                    &default_headers,
                    Proto::Http11,
                    remote,
                    Method::Get,
                    String::new(),
                    Headers::new(),
                    err,
                )
                .await?;
                return Ok(());
            }
        };
        trace!(method = %head.method.as_str(), path = %head.path, "parsed request head");

        let proto = head.proto;
        let keep_alive = encode::is_keep_alive(proto, &head.headers) && proto != Proto::Http09;

        if let Some(token) = head.upgrade.as_deref().filter(|_| head.headers.connection_has_upgrade()) {
            let pre_response = Response::new()
                .status(StatusCode::SWITCHING_PROTOCOLS)
                .header("connection", "upgrade")
                .header("upgrade", token.to_string());
            write_response(&mut io, &config, &default_headers, proto, false, keep_alive, pre_response).await?;
        }

        let body_result = read_body(&mut io, &mut pending, &mut tmp, &config, &head).await;
        let body_bytes = match body_result {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.is_fatal() {
                    return Err(err);
                }
                debug!(reason = err.text(), "closing connection after a protocol violation");
                route_driver_error(
                    &mut io,
                    &router,
                    &config,
                    &default_headers,
                    proto,
                    remote,
                    head.method,
                    head.path.clone(),
                    head.headers.clone(),
                    err,
                )
                .await?;
                return Ok(());
            }
        };

        let taken_io = io.take().expect("connection io present before dispatch");
        match req {
            Some(ref mut r) => r.reset_for(
                head.method,
                head.path,
                Query::new(head.raw_query),
                head.proto,
                head.headers,
                head.content_length,
                head.chunked,
                head.content_type,
                head.upgrade,
                keep_params,
                taken_io,
            ),
            None => {
                req = Some(Request::new(
                    head.method,
                    head.path,
                    Query::new(head.raw_query),
                    head.proto,
                    head.headers,
                    head.content_length,
                    head.chunked,
                    head.content_type,
                    head.upgrade,
                    remote,
                    taken_io,
                ));
            }
        }
        let req_mut = req.as_mut().expect("request initialized above");
        let content_type = req_mut.content_type().map(|s| s.to_string());
        *req_mut.body_mut() = Body::new(Bytes::from(body_bytes), content_type);

        let response = router.dispatch(req_mut).await;

        if req_mut.is_hijacked() {
            return Ok(());
        }
        io = Some(req_mut.hijack().expect("io present on a non-hijacked request"));

        let is_head = req_mut.method() == Method::Head;
        write_response(&mut io, &config, &default_headers, proto, is_head, keep_alive, response).await?;

        if !keep_alive {
            return Ok(());
        }

        parser.reset();
    }
}

async fn read_more<T>(
    io: &mut Option<T>,
    pending: &mut Vec<u8>,
    tmp: &mut [u8],
    timeout: Duration,
) -> Result<usize, Error>
where
    T: AsyncRead + Unpin,
{
    let io = io.as_mut().expect("connection io present while reading");
    let n = match tokio::time::timeout(timeout, io.read(tmp)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(Error::io(e)),
        Err(_) => return Err(Error::connection_timeout()),
    };
    pending.extend_from_slice(&tmp[..n]);
    Ok(n)
}

async fn read_head<T>(
    io: &mut Option<T>,
    pending: &mut Vec<u8>,
    tmp: &mut [u8],
    parser: &mut Parser,
    config: &Config,
) -> Result<Option<ParsedHead>, Error>
where
    T: AsyncRead + Unpin,
{
    loop {
        if !pending.is_empty() {
            let (consumed, maybe_head) = parser.parse(pending)?;
            pending.drain(..consumed);
            if let Some(head) = maybe_head {
                return Ok(Some(head));
            }
        }
        let at_boundary = pending.is_empty() && !parser.is_dead();
        let n = read_more(io, pending, tmp, config.tcp.read_timeout).await?;
        if n == 0 {
            if at_boundary {
                return Ok(None);
            }
            return Err(Error::close_connection());
        }
    }
}

async fn read_body<T>(
    io: &mut Option<T>,
    pending: &mut Vec<u8>,
    tmp: &mut [u8],
    config: &Config,
    head: &ParsedHead,
) -> Result<Vec<u8>, Error>
where
    T: AsyncRead + Unpin,
{
    let keep_alive = encode::is_keep_alive(head.proto, &head.headers);
    let mut decoder = if head.chunked {
        Decoder::chunked()
    } else if let Some(len) = head.content_length {
        Decoder::length(len)
    } else if keep_alive {
        Decoder::length(0)
    } else {
        Decoder::eof()
    };

    let mut body = Vec::new();
    while !decoder.is_done() {
        if pending.is_empty() {
            let n = read_more(io, pending, tmp, config.tcp.read_timeout).await?;
            if n == 0 {
                if matches!(decoder, Decoder::Eof) {
                    break;
                }
                return Err(Error::close_connection());
            }
        }
        let consumed = decoder.decode(pending, config.body.max_length, config.body.max_chunk_size, &mut body)?;
        pending.drain(..consumed);
    }

    // Transfer framing (`chunked`/`Content-Length`/EOF) only undoes how the
    // body was delimited on the wire; `Content-Encoding` names a further
    // content transform (compression) layered on top of that, applied here
    // against the registry (`§4.D`).
    match head.headers.get("content-encoding") {
        Some(encoding) => config.body.decoders.apply(encoding, body, config.body.max_length),
        None => Ok(body),
    }
}

/// Render a response for an error raised before (or while) reading a
/// request, routing it through the router's `OnError` path rather than
/// bypassing custom error handlers (`§4.H` step 1, step 2).
///
/// No [`Request`] survives a body-read or head-parse failure, so one is
/// rebuilt here from whatever head fields were already known purely to
/// carry `err` through [`Router::handle_error`]; it is discarded once the
/// response is rendered, since the connection always closes after a
/// driver-level error.
#[allow(clippy::too_many_arguments)]
async fn route_driver_error<T>(
    io: &mut Option<T>,
    router: &Router<T>,
    config: &Config,
    default_headers: &Headers,
    proto: Proto,
    remote: SocketAddr,
    method: Method,
    path: String,
    headers: Headers,
    err: Error,
) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
    let taken_io = io.take().expect("connection io present while handling a driver error");
    let mut scratch = Request::new(
        method,
        path,
        Query::new(String::new()),
        proto,
        headers,
        None,
        false,
        None,
        None,
        remote,
        taken_io,
    );
    let response = router.handle_error(&mut scratch, err).await;
    if scratch.is_hijacked() {
        return Ok(());
    }
    *io = scratch.hijack();
    write_response(io, config, default_headers, proto, false, false, response).await?;
    Ok(())
}

/// Render and write `response` to the wire.
async fn write_response<T>(
    io: &mut Option<T>,
    config: &Config,
    default_headers: &Headers,
    proto: Proto,
    suppress_body: bool,
    keep_alive: bool,
    response: Response,
) -> Result<(), Error>
where
    T: AsyncWrite + Unpin,
{
    let io_mut = io.as_mut().expect("connection io present while writing");

    match response.payload() {
        Payload::File(path) => {
            let path = path.clone();
            write_file_response(io_mut, config, default_headers, proto, suppress_body, keep_alive, response, path).await
        }
        Payload::Bytes(_) | Payload::Empty => {
            let body = match response.payload() {
                Payload::Bytes(b) => b.clone(),
                _ => Bytes::new(),
            };
            let head = encode::render_head(
                response.status_code(),
                response.headers(),
                default_headers,
                body.len() as u64,
                keep_alive,
                proto,
                config.http.response_buffer_size,
            );
            io_mut.write_all(&head).await.map_err(Error::io)?;
            if !suppress_body {
                io_mut.write_all(&body).await.map_err(Error::io)?;
            }
            io_mut.flush().await.map_err(Error::io)?;
            Ok(())
        }
    }
}

async fn write_file_response<T>(
    io: &mut T,
    config: &Config,
    default_headers: &Headers,
    proto: Proto,
    suppress_body: bool,
    keep_alive: bool,
    response: Response,
    path: std::path::PathBuf,
) -> Result<(), Error>
where
    T: AsyncWrite + Unpin,
{
    match tokio::fs::metadata(&path).await {
        Ok(meta) => {
            let head = encode::render_head(
                response.status_code(),
                response.headers(),
                default_headers,
                meta.len(),
                keep_alive,
                proto,
                config.http.response_buffer_size,
            );
            io.write_all(&head).await.map_err(Error::io)?;
            if !suppress_body {
                let mut file = tokio::fs::File::open(&path).await.map_err(Error::io)?;
                tokio::io::copy(&mut file, io).await.map_err(Error::io)?;
            }
            io.flush().await.map_err(Error::io)?;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // one-shot retry: render the default not-found body instead.
            warn!(path = %path.display(), "file response target vanished, falling back to 404");
            let fallback = Response::new().with_error(&Error::not_found());
            let body = match fallback.payload() {
                Payload::Bytes(b) => b.clone(),
                _ => Bytes::new(),
            };
            let head = encode::render_head(
                fallback.status_code(),
                fallback.headers(),
                default_headers,
                body.len() as u64,
                keep_alive,
                proto,
                config.http.response_buffer_size,
            );
            io.write_all(&head).await.map_err(Error::io)?;
            if !suppress_body {
                io.write_all(&body).await.map_err(Error::io)?;
            }
            io.flush().await.map_err(Error::io)?;
            Ok(())
        }
        Err(e) => Err(Error::io(e)),
    }
}

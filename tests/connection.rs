//! End-to-end scenarios driving the connection loop over an in-memory
//! duplex stream, standing in for a socket (`§10.4`).

use std::sync::Arc;
use std::time::Duration;

use halyard::method::Method;
use halyard::request::Request;
use halyard::response::Response;
use halyard::router::{BoxFuture, RouterBuilder};
use halyard::server::Builder;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

async fn write_all(stream: &mut DuplexStream, bytes: &[u8]) {
    stream.write_all(bytes).await.unwrap();
}

/// Read one full HTTP response off `stream`: the head, then exactly
/// `Content-Length` bytes of body. Polls with a short timeout per read so
/// a harness bug hangs the test instead of the whole suite.
async fn read_response(stream: &mut DuplexStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut chunk))
            .await
            .expect("timed out waiting for response head")
            .unwrap();
        assert!(n > 0, "connection closed before a full response head arrived");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();
    let content_length: usize = head
        .lines()
        .find_map(|line| line.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
        .map(|v| v.parse().unwrap())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut chunk))
            .await
            .expect("timed out waiting for response body")
            .unwrap();
        assert!(n > 0, "connection closed before the full body arrived");
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = buf[head_end..head_end + content_length].to_vec();
    (head, body)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn expect_eof(stream: &mut DuplexStream) {
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("timed out waiting for connection close")
        .unwrap();
    assert_eq!(n, 0, "expected the server to close the connection");
}

fn spawn_connection<F>(build: F, pairs: usize) -> DuplexStream
where
    F: FnOnce(&mut RouterBuilder<DuplexStream>),
{
    init_tracing();
    let (client, server) = tokio::io::duplex(pairs.max(4096));
    let mut builder: RouterBuilder<DuplexStream> = RouterBuilder::new();
    build(&mut builder);
    let router = Arc::new(builder.build());
    let srv = Builder::new();
    let conn = srv.serve_connection(server, router, "127.0.0.1:0".parse().unwrap());
    tokio::spawn(async move {
        let _ = conn.await;
    });
    client
}

#[tokio::test]
async fn simple_get() {
    let mut client = spawn_connection(
        |r| {
            let h: fn(&mut Request<DuplexStream>) -> BoxFuture<'_> =
                |_req| Box::pin(async { Response::new().string("hi") });
            r.route(Method::Get, "/hello", h);
        },
        4096,
    );

    write_all(&mut client, b"GET /hello HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
    let (head, body) = read_response(&mut client).await;
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "head was: {head:?}");
    assert!(head.to_ascii_lowercase().contains("content-length: 2\r\n"));
    assert_eq!(body, b"hi");
}

#[tokio::test]
async fn chunked_post_reassembles_body() {
    let mut client = spawn_connection(
        |r| {
            let h: fn(&mut Request<DuplexStream>) -> BoxFuture<'_> = |req| {
                let echoed = String::from_utf8(req.body().full().to_vec()).unwrap();
                Box::pin(async move { Response::new().string(echoed) })
            };
            r.route(Method::Post, "/", h);
        },
        4096,
    );

    write_all(
        &mut client,
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
    )
    .await;
    let (_head, body) = read_response(&mut client).await;
    assert_eq!(body, b"hello world");
}

#[tokio::test]
async fn method_not_allowed_carries_allow_header() {
    let mut client = spawn_connection(
        |r| {
            let h: fn(&mut Request<DuplexStream>) -> BoxFuture<'_> =
                |_req| Box::pin(async { Response::new().string("ok") });
            r.route(Method::Get, "/", h);
        },
        4096,
    );

    write_all(&mut client, b"POST / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
    let (head, _body) = read_response(&mut client).await;
    assert!(head.starts_with("HTTP/1.1 405"), "head was: {head:?}");
    assert!(head.to_ascii_lowercase().contains("allow: get\r\n"));
}

#[tokio::test]
async fn head_suppresses_body_but_keeps_content_length() {
    let mut client = spawn_connection(
        |r| {
            let h: fn(&mut Request<DuplexStream>) -> BoxFuture<'_> =
                |_req| Box::pin(async { Response::new().string("xyz") });
            r.route(Method::Get, "/", h);
        },
        4096,
    );

    write_all(&mut client, b"HEAD / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
    let (head, body) = read_response(&mut client).await;
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.to_ascii_lowercase().contains("content-length: 3\r\n"));
    assert!(body.is_empty());
}

#[tokio::test]
async fn keep_alive_then_explicit_close() {
    let mut client = spawn_connection(
        |r| {
            let h: fn(&mut Request<DuplexStream>) -> BoxFuture<'_> =
                |_req| Box::pin(async { Response::new().string("ok") });
            r.route(Method::Get, "/", h);
        },
        4096,
    );

    write_all(&mut client, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let (head1, _) = read_response(&mut client).await;
    assert!(head1.starts_with("HTTP/1.1 200"));

    write_all(&mut client, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let (head2, _) = read_response(&mut client).await;
    assert!(head2.starts_with("HTTP/1.1 200"));

    write_all(&mut client, b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
    let (head3, _) = read_response(&mut client).await;
    assert!(head3.starts_with("HTTP/1.1 200"));

    expect_eof(&mut client).await;
}

#[tokio::test]
async fn oversized_header_value_is_rejected_and_connection_closes() {
    let mut client = spawn_connection(|_r| {}, 128 * 1024);

    let big_value = "x".repeat(128 * 1024);
    let request = format!("GET / HTTP/1.1\r\nHost: x\r\nX-Big: {big_value}\r\n\r\n");
    write_all(&mut client, request.as_bytes()).await;

    let (head, _body) = read_response(&mut client).await;
    assert!(head.starts_with("HTTP/1.1 431"), "head was: {head:?}");
    expect_eof(&mut client).await;
}

#[tokio::test]
async fn driver_level_parse_error_still_reaches_a_registered_error_handler() {
    use halyard::router::ErrorSelector;
    use halyard::status::StatusCode;

    let mut client = spawn_connection(
        |r| {
            let h: fn(&mut Request<DuplexStream>) -> BoxFuture<'_> = |_req| {
                Box::pin(async { Response::new().status(StatusCode(599)).string("caught at the door") })
            };
            r.route_error(h, [ErrorSelector::AllErrors]);
        },
        128 * 1024,
    );

    let big_value = "x".repeat(128 * 1024);
    let request = format!("GET / HTTP/1.1\r\nHost: x\r\nX-Big: {big_value}\r\n\r\n");
    write_all(&mut client, request.as_bytes()).await;

    let (head, body) = read_response(&mut client).await;
    assert!(head.starts_with("HTTP/1.1 599"), "head was: {head:?}");
    assert_eq!(body, b"caught at the door");
    expect_eof(&mut client).await;
}

//! The inbound request, as handed to a router or middleware.
//!
//! Grounded in the Go `Request` struct (`http/request.go`): the same field
//! set (method, path, query, params, proto, headers, framing, content
//! type, upgrade, remote address, a context bag, and a body), reshaped
//! into owned Rust types so nothing here borrows from the connection's
//! read buffer (`§9`, option (a)).

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::body::Body;
use crate::context::Context;
use crate::headers::Headers;
use crate::method::Method;
use crate::query::Query;
use crate::version::Proto;

/// An inbound HTTP request.
///
/// Generic over the connection's IO type `T` solely so [`Request::hijack`]
/// can hand the socket back to a handler; nothing else about a `Request`
/// borrows from or depends on `T`.
pub struct Request<T> {
    method: Method,
    path: String,
    query: Query,
    params: HashMap<String, String>,
    proto: Proto,
    headers: Headers,
    content_length: Option<u64>,
    chunked: bool,
    content_type: Option<String>,
    upgrade: Option<String>,
    remote: SocketAddr,
    body: Body,
    context: Context,
    io: Option<T>,
}

impl<T> Request<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        method: Method,
        path: String,
        query: Query,
        proto: Proto,
        headers: Headers,
        content_length: Option<u64>,
        chunked: bool,
        content_type: Option<String>,
        upgrade: Option<String>,
        remote: SocketAddr,
        io: T,
    ) -> Self {
        Request {
            method,
            path,
            query,
            params: HashMap::new(),
            proto,
            headers,
            content_length,
            chunked,
            content_type,
            upgrade,
            remote,
            body: Body::empty(),
            context: Context::new(),
            io: Some(io),
        }
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The request target's path component, percent-decoded.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The request target's query component.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Dynamic path parameters bound by the router (`:id`-style segments).
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// A single dynamic path parameter, by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    pub(crate) fn params_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.params
    }

    /// The protocol version on the request line.
    pub fn proto(&self) -> Proto {
        self.proto
    }

    /// The request's header fields.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// `Content-Length`, if the request carried one.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Whether the body is framed with `Transfer-Encoding: chunked`.
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    /// The `Content-Type` header value, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The `Upgrade` header value, if present.
    pub fn upgrade(&self) -> Option<&str> {
        self.upgrade.as_deref()
    }

    /// The peer's socket address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// The request body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    pub(crate) fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// The per-request context bag.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutably borrow the per-request context bag.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Whether [`Request::hijack`] has already taken ownership of the
    /// connection.
    pub fn is_hijacked(&self) -> bool {
        self.io.is_none()
    }

    /// Take ownership of the underlying connection, opting out of the
    /// normal response-rendering path for the rest of this connection's
    /// lifetime (`§4.I`).
    ///
    /// Returns `None` if called more than once.
    pub fn hijack(&mut self) -> Option<T> {
        self.io.take()
    }

    /// Reinitialize this request in place for the next request on the
    /// same kept-alive connection, loading freshly parsed head fields and
    /// reclaiming `io` (`§3`: mirrors the Go `Clear()` method, with the
    /// newly parsed data applied immediately after clearing).
    ///
    /// `keep_params` skips draining the dynamic-params map, matching
    /// [`crate::config::UrlConfig::disable_params_map_clear`].
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn reset_for(
        &mut self,
        method: Method,
        path: String,
        query: Query,
        proto: Proto,
        headers: Headers,
        content_length: Option<u64>,
        chunked: bool,
        content_type: Option<String>,
        upgrade: Option<String>,
        keep_params: bool,
        io: T,
    ) {
        self.method = method;
        self.path = path;
        self.query = query;
        self.proto = proto;
        self.headers = headers;
        self.content_length = content_length;
        self.chunked = chunked;
        self.content_type = content_type;
        self.upgrade = upgrade;
        self.context.clear();
        self.body = Body::empty();
        if !keep_params {
            self.params.clear();
        }
        self.io = Some(io);
    }
}

impl<T> std::fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("proto", &self.proto)
            .field("remote", &self.remote)
            .field("hijacked", &self.is_hijacked())
            .finish()
    }
}

//! The public embedding surface.
//!
//! Accepting connections and tuning the listening socket is left to the
//! application (`§1`: out of scope for this core); what this module gives
//! back is a [`Builder`] for configuring a connection's limits and default
//! headers once, then handing it whatever already-accepted stream the
//! application produced.

pub mod conn;

pub use conn::Connection;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::Config;
use crate::headers::Headers;
use crate::router::Router;

/// Builds [`Connection`]s sharing one [`Config`] and one set of
/// server-wide default response headers.
///
/// Cheap to clone: the only owned state is plain configuration, not a
/// socket or a router.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: Config,
    default_headers: Headers,
}

impl Builder {
    /// A builder with default configuration and no default headers.
    pub fn new() -> Self {
        Builder::default()
    }

    /// Replace the connection's [`Config`] wholesale.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Add a header sent on every response on connections built from this
    /// point on, for any key the handler's response didn't already set
    /// (`§4.F`'s default-header merge).
    pub fn default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.append(key, value);
        self
    }

    /// Bind `router` and `io` into a driveable [`Connection`].
    ///
    /// `remote` is the peer address, used for logging and surfaced on
    /// every [`crate::request::Request`] via
    /// [`crate::request::Request::remote_addr`]. The caller is expected to
    /// have already accepted `io` (e.g. from a `TcpListener`); this crate
    /// does not run an accept loop of its own.
    pub fn serve_connection<T>(
        &self,
        io: T,
        router: Arc<Router<T>>,
        remote: SocketAddr,
    ) -> Connection<T>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
    {
        Connection::new(io, router, self.config.clone(), self.default_headers.clone(), remote)
    }
}

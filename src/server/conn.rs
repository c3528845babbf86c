//! Lower-level connection API.
//!
//! [`Connection`] is the future [`super::Builder::serve_connection`]
//! returns; driving it (by `.await`ing it, or polling it directly) runs
//! the read → parse → dispatch → render loop described in `§4.H` to
//! completion.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::Config;
use crate::error::Error;
use crate::headers::Headers;
use crate::proto::h1::conn as h1;
use crate::router::Router;

/// A future binding one accepted connection to a [`Router`].
///
/// Resolves once the peer closes the connection, a protocol error forces
/// it closed, or a handler hijacks the socket via
/// [`crate::request::Request::hijack`].
#[must_use = "connections do nothing unless polled"]
pub struct Connection<T> {
    inner: Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>,
    _io: PhantomData<T>,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
    pub(super) fn new(
        io: T,
        router: Arc<Router<T>>,
        config: Config,
        default_headers: Headers,
        remote: SocketAddr,
    ) -> Self {
        Connection {
            inner: Box::pin(h1::serve_connection(io, router, config, default_headers, remote)),
            _io: PhantomData,
        }
    }
}

impl<T> Future for Connection<T> {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // `_io` is a zero-sized `PhantomData<T>` marker, not actual pinned
        // data, so projecting through the `Pin` without requiring `T: Unpin`
        // is sound.
        unsafe { self.get_unchecked_mut() }.inner.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish()
    }
}

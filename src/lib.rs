#![deny(missing_debug_implementations)]

//! # halyard
//!
//! An embeddable HTTP/1.x server core: an incremental, resumable request
//! parser, a chunked/length-aware body reader, a buffered response
//! renderer, and a router that dispatches parsed requests to handlers.
//!
//! This is a library, not a framework. It does not run a listening socket
//! or an accept loop — the application owns that, and hands each accepted
//! stream to [`server::Builder::serve_connection`]. What this crate owns
//! is everything from the first byte off that stream to the last byte of
//! the response: parsing, routing, and rendering.
//!
//! ```no_run
//! use std::sync::Arc;
//! use halyard::method::Method;
//! use halyard::router::{BoxFuture, RouterBuilder};
//! use halyard::response::Response;
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> std::io::Result<()> {
//! let mut builder = RouterBuilder::new();
//! builder.route(Method::Get, "/", |_req: &mut halyard::request::Request<tokio::net::TcpStream>| -> BoxFuture<'_> {
//!     Box::pin(async { Response::new().string("hello") })
//! });
//! let router = Arc::new(builder.build());
//! let server = halyard::server::Builder::new();
//!
//! let listener = TcpListener::bind("127.0.0.1:0").await?;
//! loop {
//!     let (stream, remote) = listener.accept().await?;
//!     let conn = server.serve_connection(stream, router.clone(), remote);
//!     tokio::spawn(async move {
//!         let _ = conn.await;
//!     });
//! }
//! # }
//! ```

pub mod body;
pub mod config;
pub mod context;
pub mod error;
pub mod headers;
pub mod method;
mod proto;
pub mod query;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod status;
pub mod version;

pub use error::{Error, Result};

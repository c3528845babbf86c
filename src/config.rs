//! Tunables consumed by the parser, body reader, and renderer.
//!
//! Plain data: no file or environment parsing lives here (`§1` scopes
//! configuration-file handling out of the core). Applications build a
//! [`Config`] with [`Config::default`] and override individual fields, or
//! chain the builder methods.

use std::time::Duration;

use crate::body::DecoderRegistry;

/// Top-level configuration for a [`crate::server::conn::Connection`].
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP-adjacent read tuning.
    pub tcp: TcpConfig,
    /// Limits applied while parsing header fields.
    pub headers: HeaderConfig,
    /// Limits applied to the request target.
    pub url: UrlConfig,
    /// Limits and buffering applied to the request body.
    pub body: BodyConfig,
    /// Renderer buffering.
    pub http: HttpConfig,
}

/// `tcp.read_timeout`, `tcp.read_buffer_size`.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Maximum time to wait for a socket read before failing the connection
    /// with [`crate::error::Error::connection_timeout`].
    pub read_timeout: Duration,
    /// Size of the buffer each `read()` call fills.
    pub read_buffer_size: usize,
}

/// `headers.max_key_length`, `headers.value_space.{default,max}`,
/// `headers.number.{default,max}`, `headers.max_values_object_pool_size`.
#[derive(Debug, Clone)]
pub struct HeaderConfig {
    /// Hard cap on a single header field name.
    pub max_key_length: usize,
    /// Default capacity reserved for a single header value.
    pub value_space_default: usize,
    /// Hard cap on a single header value.
    pub value_space_max: usize,
    /// Default number of header fields a request is expected to carry.
    pub number_default: usize,
    /// Hard cap on the number of header fields.
    pub number_max: usize,
    /// Size of the free-list of reusable header-value backing buffers kept
    /// per connection (`§5`: "object pool for header-values backing
    /// lists").
    pub max_values_object_pool_size: usize,
}

/// `url.buffer_size.{default,max}`, `url.params.disable_map_clear`.
#[derive(Debug, Clone)]
pub struct UrlConfig {
    /// Default capacity reserved for the path arena.
    pub buffer_size_default: usize,
    /// Hard cap on the path arena.
    pub buffer_size_max: usize,
    /// If set, the request is not drained of its dynamic-params map
    /// between requests on a kept-alive connection; a router that never
    /// rebinds stale keys between requests can use this to skip the
    /// per-request clear (`§3`).
    pub disable_params_map_clear: bool,
}

/// `body.max_length`, `body.decoded_buffer_size`, `body.max_chunk_size`.
#[derive(Debug, Clone)]
pub struct BodyConfig {
    /// Hard cap on a request body, for both `Content-Length` framing and
    /// the synthetic length used for close-delimited bodies (`§4.C`).
    pub max_length: u64,
    /// Frame size [`crate::body::Body::stream`] yields.
    pub decoded_buffer_size: usize,
    /// Hard cap on a single chunk in `Transfer-Encoding: chunked`.
    pub max_chunk_size: u64,
    /// `(token → constructor)` registry applied to `Content-Encoding`,
    /// stacked output-to-input (`§4.D`). Empty by default.
    pub decoders: DecoderRegistry,
}

/// `http.response_buffer_size`.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Default capacity reserved for the renderer's output buffer.
    pub response_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tcp: TcpConfig::default(),
            headers: HeaderConfig::default(),
            url: UrlConfig::default(),
            body: BodyConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            read_timeout: Duration::from_secs(60),
            read_buffer_size: 16 * 1024,
        }
    }
}

impl Default for HeaderConfig {
    fn default() -> Self {
        HeaderConfig {
            max_key_length: 256,
            value_space_default: 8 * 1024,
            value_space_max: 64 * 1024,
            number_default: 16,
            number_max: 256,
            max_values_object_pool_size: 32,
        }
    }
}

impl Default for UrlConfig {
    fn default() -> Self {
        UrlConfig {
            buffer_size_default: 2 * 1024,
            buffer_size_max: 16 * 1024,
            disable_params_map_clear: false,
        }
    }
}

impl Default for BodyConfig {
    fn default() -> Self {
        BodyConfig {
            max_length: 1024 * 1024,
            decoded_buffer_size: 16 * 1024,
            max_chunk_size: 1024 * 1024,
            decoders: DecoderRegistry::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            response_buffer_size: 4 * 1024,
        }
    }
}

impl Config {
    /// Start from defaults and override the read timeout. A small
    /// convenience; most fields are plain public data meant to be set
    /// directly.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.tcp.read_timeout = timeout;
        self
    }
}

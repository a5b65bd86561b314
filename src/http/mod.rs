//! HTTP/1.0 and HTTP/1.1 transport
//!
//! This module provides the wire protocol used underneath UPnP control and
//! content serving: header tables, entity bodies, chunked framing, request
//! and response messages, a redirect-following client and a blocking
//! server that dispatches requests to path-prefix handlers.
//!
//! # Architecture
//!
//! All I/O is blocking and bounded by the configured timeouts. The client
//! opens one connection per exchange through a [`Connector`]; the server
//! handles one request per accepted connection:
//!
//! - [`HttpClient`] writes a request, parses the response head and hands
//!   back a response whose [`Entity`] streams the body
//! - [`HttpServer`] accepts a client, parses the request, finds a
//!   [`RequestHandler`] and emits the response head and body
//!
//! # Examples
//!
//! ```no_run
//! use upnp_http::http::{HttpClient, HttpRequest, Method};
//!
//! let client = HttpClient::new();
//! let mut request = HttpRequest::new(Method::Get, "http://127.0.0.1:8080/description.xml")?;
//! let mut response = client.send_request(&mut request)?;
//! assert_eq!(response.status().code(), 200);
//! let body = response.load_body()?;
//! # let _ = body;
//! # Ok::<(), upnp_http::http::Error>(())
//! ```

pub mod chunked;
pub mod client;
pub mod connector;
pub mod entity;
pub mod file_handler;
pub mod handler;
pub mod headers;
pub mod message;
pub mod parser;
pub mod proxy;
pub mod server;
pub mod url;

pub use client::{ClientConfig, HttpClient};
pub use connector::{Connection, Connector, TcpConnector, Timeouts};
pub use entity::Entity;
pub use file_handler::FileRequestHandler;
pub use handler::{RequestContext, RequestHandler, StaticRequestHandler};
pub use headers::Headers;
pub use message::{HttpRequest, HttpResponse, Method, Status, Version};
pub use proxy::{ProxyAddress, ProxySelector, StaticProxySelector};
pub use server::{AbortHandle, HttpResponder, HttpServer, ServerConfig};
pub use self::url::HttpUrl;

use std::io;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("Invalid request line: {0}")]
    InvalidRequestLine(String),

    #[error("Invalid response line: {0}")]
    InvalidResponseLine(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("No such item: {0}")]
    NoSuchItem(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Timeout")]
    Timeout,

    #[error("Connection reset")]
    ConnectionReset,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Cannot resolve host name: {0}")]
    NameResolution(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("No proxy for this URL")]
    NoProxy,
}

impl Error {
    /// Classify an OS-level error into the closed set of resource kinds
    pub fn from_io(err: io::Error) -> Self {
        // errors raised inside Read/Write adapters travel wrapped
        if err.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            return match err.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(inner)) => *inner,
                _ => Error::InvalidFormat("wrapped error lost".to_string()),
            };
        }

        let detail = err.to_string();
        match err.kind() {
            io::ErrorKind::NotFound => Error::NoSuchItem(detail),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(detail),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(detail),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                Error::ConnectionReset
            }
            io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(err),
        }
    }

    /// Whether this is a timeout, as opposed to a reset or end of stream
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::from_io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            Error::Timeout => io::ErrorKind::TimedOut.into(),
            Error::ConnectionReset => io::ErrorKind::ConnectionReset.into(),
            Error::ConnectionClosed => io::ErrorKind::UnexpectedEof.into(),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Maximum number of redirects followed by the client
pub const MAX_REDIRECTS: usize = 20;

/// Maximum length of a request, status or header line
pub const MAX_LINE_LENGTH: usize = 8192;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// CRLF line ending
pub const CRLF: &str = "\r\n";

/// Default product token for the `User-Agent` and `Server` headers
pub const DEFAULT_PRODUCT: &str = concat!("upnp-http/", env!("CARGO_PKG_VERSION"));

pub(crate) mod header_names {
    pub const CONNECTION: &str = "Connection";
    pub const CONTENT_ENCODING: &str = "Content-Encoding";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const CONTENT_RANGE: &str = "Content-Range";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const ACCEPT_RANGES: &str = "Accept-Ranges";
    pub const HOST: &str = "Host";
    pub const LOCATION: &str = "Location";
    pub const RANGE: &str = "Range";
    pub const SERVER: &str = "Server";
    pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
    pub const USER_AGENT: &str = "User-Agent";
}

/// Value of `Transfer-Encoding` for chunked framing
pub const TRANSFER_ENCODING_CHUNKED: &str = "chunked";

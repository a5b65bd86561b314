//! HTTP message types
//!
//! This module defines the core types for HTTP requests and responses.
//! Bodies are carried as an optional [`Entity`] and streamed, so messages
//! are not `Clone`.

use super::entity::Entity;
use super::url::HttpUrl;
use super::{Error, Headers, Result, CRLF};
use std::fmt;
use std::io::{self, Write};

/// HTTP methods, including the UPnP/GENA extension methods
///
/// Tokens outside the known set are kept as [`Method::Other`] so requests
/// such as `PROPFIND` still reach a handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Trace,
    Subscribe,
    Unsubscribe,
    Notify,
    MSearch,
    Other(String),
}

impl Method {
    /// Parse method from string
    ///
    /// Only an empty token is rejected.
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "SUBSCRIBE" => Ok(Method::Subscribe),
            "UNSUBSCRIBE" => Ok(Method::Unsubscribe),
            "NOTIFY" => Ok(Method::Notify),
            "M-SEARCH" => Ok(Method::MSearch),
            "" => Err(Error::InvalidMethod(s.to_string())),
            other => Ok(Method::Other(other.to_string())),
        }
    }

    /// Convert method to string
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Subscribe => "SUBSCRIBE",
            Method::Unsubscribe => "UNSUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::MSearch => "M-SEARCH",
            Method::Other(token) => token.as_str(),
        }
    }

    /// Whether a response to this method carries an entity the client reads
    pub fn expects_response_entity(&self) -> bool {
        matches!(self, Method::Get | Method::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP version
///
/// Any other protocol token is kept verbatim as [`Version::Other`] and
/// treated like HTTP/1.0 wherever 1.1 behavior would apply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    Http10,
    Http11,
    Other(String),
}

impl Version {
    /// Parse version from string
    ///
    /// Only an empty token is rejected.
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            "" => Err(Error::InvalidVersion(s.to_string())),
            other => Ok(Version::Other(other.to_string())),
        }
    }

    /// Convert version to string
    pub fn as_str(&self) -> &str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
            Version::Other(token) => token.as_str(),
        }
    }

    /// Whether HTTP/1.1 connection semantics apply
    pub fn is_http11(&self) -> bool {
        *self == Version::Http11
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::Http11
    }
}

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

impl Status {
    /// Create a new status code
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Status { code })
        } else {
            Err(Error::InvalidStatus(format!("Invalid status code: {}", code)))
        }
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the canonical reason phrase for this status code
    pub fn reason_phrase(&self) -> &'static str {
        match self.code {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            203 => "Non-Authoritative Information",
            204 => "No Content",
            205 => "Reset Content",
            206 => "Partial Content",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            305 => "Use Proxy",
            307 => "Temporary Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            402 => "Payment Required",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            407 => "Proxy Authentication Required",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            411 => "Length Required",
            412 => "Precondition Failed",
            413 => "Request Entity Too Large",
            414 => "Request-URI Too Long",
            415 => "Unsupported Media Type",
            416 => "Requested Range Not Satisfiable",
            417 => "Expectation Failed",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => "Unknown",
        }
    }

    /// Check if this is an informational status (1xx)
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Check if this is a success status (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Check if this is a redirect the client follows (301, 302, 303, 307)
    pub fn is_redirect(&self) -> bool {
        matches!(self.code, 301 | 302 | 303 | 307)
    }

    /// Check if this is a client error status (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// Check if this is a server error status (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code)
    }

    // Common status codes as constants
    pub const OK: Status = Status { code: 200 };
    pub const PARTIAL_CONTENT: Status = Status { code: 206 };
    pub const BAD_REQUEST: Status = Status { code: 400 };
    pub const FORBIDDEN: Status = Status { code: 403 };
    pub const NOT_FOUND: Status = Status { code: 404 };
    pub const METHOD_NOT_ALLOWED: Status = Status { code: 405 };
    pub const RANGE_NOT_SATISFIABLE: Status = Status { code: 416 };
    pub const INTERNAL_SERVER_ERROR: Status = Status { code: 500 };
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}

/// HTTP request
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    url: HttpUrl,
    version: Version,
    headers: Headers,
    entity: Option<Entity>,
}

impl HttpRequest {
    /// Create a new HTTP/1.1 request for an absolute URL
    pub fn new(method: Method, url: &str) -> Result<Self> {
        Ok(Self::with_url(method, HttpUrl::parse(url)?))
    }

    /// Create a new HTTP/1.1 request for a parsed URL
    pub fn with_url(method: Method, url: HttpUrl) -> Self {
        HttpRequest {
            method,
            url,
            version: Version::default(),
            headers: Headers::new(),
            entity: None,
        }
    }

    /// Create a builder for constructing requests
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// Get the request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the request URL
    pub fn url(&self) -> &HttpUrl {
        &self.url
    }

    /// Replace the request URL
    pub fn set_url(&mut self, url: HttpUrl) {
        self.url = url;
    }

    /// Get the HTTP version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Set the HTTP version
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Get the entity
    pub fn entity(&self) -> Option<&Entity> {
        self.entity.as_ref()
    }

    /// Get the entity mutably
    pub fn entity_mut(&mut self) -> Option<&mut Entity> {
        self.entity.as_mut()
    }

    /// Attach an entity
    pub fn set_entity(&mut self, entity: Entity) {
        self.entity = Some(entity);
    }

    /// Detach the entity
    pub fn take_entity(&mut self) -> Option<Entity> {
        self.entity.take()
    }

    /// Write the request line, headers and blank line
    ///
    /// With `use_proxy` the target is the absolute URL, otherwise the
    /// origin-form path and query.
    pub fn emit_head<W: Write + ?Sized>(&self, writer: &mut W, use_proxy: bool) -> io::Result<()> {
        let target = if use_proxy {
            self.url.to_absolute_string()
        } else {
            self.url.to_request_string()
        };
        write!(writer, "{} {} {}{}", self.method, target, self.version, CRLF)?;
        self.headers.emit(writer)?;
        writer.write_all(CRLF.as_bytes())
    }

    /// Convert the request head to wire format
    pub fn head_to_wire(&self, use_proxy: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        // writing to a Vec cannot fail
        let _ = self.emit_head(&mut buf, use_proxy);
        buf
    }
}

/// Builder for HTTP requests
#[derive(Debug, Default)]
pub struct HttpRequestBuilder {
    method: Option<Method>,
    url: Option<String>,
    version: Option<Version>,
    headers: Headers,
    entity: Option<Entity>,
}

impl HttpRequestBuilder {
    /// Set the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the absolute URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the HTTP version
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Set the entity
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Build the request
    pub fn build(self) -> Result<HttpRequest> {
        let url = self
            .url
            .ok_or_else(|| Error::InvalidParameters("request has no URL".to_string()))?;
        Ok(HttpRequest {
            method: self.method.unwrap_or(Method::Get),
            url: HttpUrl::parse(&url)?,
            version: self.version.unwrap_or_default(),
            headers: self.headers,
            entity: self.entity,
        })
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    version: Version,
    status: Status,
    reason: String,
    headers: Headers,
    entity: Option<Entity>,
}

impl HttpResponse {
    /// Create a new HTTP response with the canonical reason phrase
    pub fn new(status: Status) -> Self {
        let reason = status.reason_phrase().to_string();
        HttpResponse {
            version: Version::default(),
            status,
            reason,
            headers: Headers::new(),
            entity: None,
        }
    }

    /// Create a builder for constructing responses
    pub fn builder() -> HttpResponseBuilder {
        HttpResponseBuilder::default()
    }

    /// Get the HTTP version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Set the HTTP version
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Get the status code
    pub fn status(&self) -> Status {
        self.status
    }

    /// Get the reason phrase
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Set the status code and reason phrase
    pub fn set_status(&mut self, status: Status, reason: impl Into<String>) {
        self.status = status;
        self.reason = reason.into();
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Get the entity
    pub fn entity(&self) -> Option<&Entity> {
        self.entity.as_ref()
    }

    /// Get the entity mutably
    pub fn entity_mut(&mut self) -> Option<&mut Entity> {
        self.entity.as_mut()
    }

    /// Get the entity, attaching an empty one first if there is none
    pub fn entity_or_default(&mut self) -> &mut Entity {
        self.entity.get_or_insert_with(Entity::new)
    }

    /// Attach an entity
    pub fn set_entity(&mut self, entity: Entity) {
        self.entity = Some(entity);
    }

    /// Detach the entity
    pub fn take_entity(&mut self) -> Option<Entity> {
        self.entity.take()
    }

    /// Read the whole response body into memory
    ///
    /// A response without an entity has an empty body.
    pub fn load_body(&mut self) -> Result<Vec<u8>> {
        match self.entity.as_mut() {
            Some(entity) if entity.has_stream() => entity.load(),
            _ => Ok(Vec::new()),
        }
    }

    /// Write the status line, headers and blank line
    pub fn emit_head<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        write!(
            writer,
            "{} {} {}{}",
            self.version,
            self.status.code(),
            self.reason,
            CRLF
        )?;
        self.headers.emit(writer)?;
        writer.write_all(CRLF.as_bytes())
    }

    /// Convert the response head to wire format
    pub fn head_to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // writing to a Vec cannot fail
        let _ = self.emit_head(&mut buf);
        buf
    }
}

/// Builder for HTTP responses
#[derive(Debug, Default)]
pub struct HttpResponseBuilder {
    version: Option<Version>,
    status: Option<Status>,
    reason: Option<String>,
    headers: Headers,
    entity: Option<Entity>,
}

impl HttpResponseBuilder {
    /// Set the HTTP version
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Set the status code
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the reason phrase
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Set the entity
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Build the response
    pub fn build(self) -> HttpResponse {
        let status = self.status.unwrap_or(Status::OK);
        let reason = self
            .reason
            .unwrap_or_else(|| status.reason_phrase().to_string());
        HttpResponse {
            version: self.version.unwrap_or_default(),
            status,
            reason,
            headers: self.headers,
            entity: self.entity,
        }
    }
}

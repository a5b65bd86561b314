//! HTTP URLs
//!
//! Requests address their target with an [`HttpUrl`]: scheme, host, port,
//! path, query and fragment. Absolute URLs are parsed with the `url` crate;
//! the server side builds one from an origin-form request target and the
//! `Host` header.

use super::{Error, Result, DEFAULT_HTTP_PORT};
use std::fmt;

/// An `http://` URL split into the parts the protocol layer needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpUrl {
    scheme: String,
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl HttpUrl {
    /// Parse an absolute URL such as `http://host:port/path?query`
    pub fn parse(input: &str) -> Result<Self> {
        let parsed = ::url::Url::parse(input)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", input, e)))?;
        Self::from_url(&parsed)
    }

    fn from_url(parsed: &::url::Url) -> Result<Self> {
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(format!("URL has no host: {}", parsed)))?;
        let port = parsed.port_or_known_default().unwrap_or(DEFAULT_HTTP_PORT);

        Ok(HttpUrl {
            scheme: parsed.scheme().to_string(),
            host: host.to_string(),
            port,
            path: parsed.path().to_string(),
            query: parsed.query().map(str::to_string),
            fragment: parsed.fragment().map(str::to_string),
        })
    }

    /// Build a URL from a host, a port and an origin-form target (`/path?query`)
    pub fn from_parts(host: &str, port: u16, path_plus: &str) -> Self {
        let mut url = HttpUrl {
            scheme: "http".to_string(),
            host: host.to_string(),
            port,
            path: "/".to_string(),
            query: None,
            fragment: None,
        };
        url.set_path_plus(path_plus);
        url
    }

    /// Resolve a possibly relative reference (e.g. a `Location` value)
    /// against this URL
    pub fn join(&self, reference: &str) -> Result<Self> {
        let base = ::url::Url::parse(&self.to_string())
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self, e)))?;
        let joined = base
            .join(reference)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", reference, e)))?;
        Self::from_url(&joined)
    }

    /// Get the scheme
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Get the host name or address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the (still percent-encoded) path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the query, without the leading `?`
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Get the fragment, without the leading `#`
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Set the host from a `Host` header value, which may carry a port
    pub fn set_host(&mut self, host: &str) {
        let host = host.trim();
        if let Some(colon) = host.rfind(':') {
            let (name, port) = (&host[..colon], &host[colon + 1..]);
            if !name.is_empty() && !name.ends_with(':') {
                if let Ok(port) = port.parse::<u16>() {
                    self.host = name.to_string();
                    self.port = port;
                    return;
                }
            }
        }
        self.host = host.to_string();
    }

    /// Set the port
    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    /// Set path, query and fragment from an origin-form target
    pub fn set_path_plus(&mut self, path_plus: &str) {
        let (rest, fragment) = match path_plus.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (path_plus, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (rest, None),
        };

        self.path = if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        };
        self.query = query;
        self.fragment = fragment;
    }

    /// The origin-form request target: path plus query
    pub fn to_request_string(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// The `Host` header value for this URL
    pub fn host_header(&self) -> String {
        if self.port == DEFAULT_HTTP_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The absolute form without fragment, as sent to a proxy
    pub fn to_absolute_string(&self) -> String {
        format!(
            "{}://{}{}",
            self.scheme,
            self.host_header(),
            self.to_request_string()
        )
    }
}

impl fmt::Display for HttpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_absolute_string())?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

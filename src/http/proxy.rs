//! Proxy selection
//!
//! Before each exchange the client asks its [`ProxySelector`] whether the
//! request URL should go through a proxy. With a proxy, the connection is
//! made to the proxy and the request line carries the absolute URL.

use super::{Error, HttpUrl, Result};
use std::fmt;

/// Host and port of an HTTP proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAddress {
    host: String,
    port: u16,
}

impl ProxyAddress {
    /// Create a proxy address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ProxyAddress {
            host: host.into(),
            port,
        }
    }

    /// Get the proxy host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the proxy port
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Chooses the proxy for a URL
///
/// `Ok(None)` and [`Error::NoProxy`] both mean "connect directly"; any
/// other error aborts the request.
pub trait ProxySelector: Send + Sync {
    fn proxy_for_url(&self, url: &HttpUrl) -> Result<Option<ProxyAddress>>;
}

impl<F> ProxySelector for F
where
    F: Fn(&HttpUrl) -> Result<Option<ProxyAddress>> + Send + Sync,
{
    fn proxy_for_url(&self, url: &HttpUrl) -> Result<Option<ProxyAddress>> {
        self(url)
    }
}

/// Sends every request through the same proxy
#[derive(Debug, Clone)]
pub struct StaticProxySelector {
    proxy: ProxyAddress,
}

impl StaticProxySelector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        StaticProxySelector {
            proxy: ProxyAddress::new(host, port),
        }
    }
}

impl ProxySelector for StaticProxySelector {
    fn proxy_for_url(&self, _url: &HttpUrl) -> Result<Option<ProxyAddress>> {
        if self.proxy.host.is_empty() {
            return Err(Error::NoProxy);
        }
        Ok(Some(self.proxy.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_selector() {
        let selector = StaticProxySelector::new("proxy.lan", 3128);
        let url = HttpUrl::parse("http://media.lan/a").unwrap();
        let proxy = selector.proxy_for_url(&url).unwrap().unwrap();
        assert_eq!(proxy.to_string(), "proxy.lan:3128");
    }

    #[test]
    fn test_empty_static_selector_means_no_proxy() {
        let selector = StaticProxySelector::new("", 0);
        let url = HttpUrl::parse("http://media.lan/a").unwrap();
        assert!(matches!(selector.proxy_for_url(&url), Err(Error::NoProxy)));
    }

    #[test]
    fn test_closure_selector() {
        let selector = |url: &HttpUrl| -> Result<Option<ProxyAddress>> {
            if url.host() == "localhost" {
                Ok(None)
            } else {
                Ok(Some(ProxyAddress::new("gw", 8080)))
            }
        };

        let local = HttpUrl::parse("http://localhost/").unwrap();
        let remote = HttpUrl::parse("http://example.org/").unwrap();
        assert_eq!(selector.proxy_for_url(&local).unwrap(), None);
        assert_eq!(
            selector.proxy_for_url(&remote).unwrap(),
            Some(ProxyAddress::new("gw", 8080))
        );
    }
}

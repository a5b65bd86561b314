//! HTTP client implementation
//!
//! [`HttpClient`] performs one exchange per connection: connect (directly
//! or through a proxy), write the request, parse the response head and
//! return a response whose entity streams the body from the connection.
//! Redirects are followed for GET and HEAD.

use super::chunked::ChunkedReader;
use super::connector::{Connector, TcpConnector, Timeouts};
use super::entity::Entity;
use super::header_names::{
    CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION,
    TRANSFER_ENCODING, USER_AGENT,
};
use super::parser::parse_response;
use super::proxy::{ProxyAddress, ProxySelector, StaticProxySelector};
use super::{Error, HttpRequest, HttpResponse, Method, Result, DEFAULT_PRODUCT, MAX_REDIRECTS};
use log::{debug, warn};
use std::io::{BufReader, Read, Write};
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Follow 301, 302, 303 and 307 responses to GET and HEAD
    pub follow_redirect: bool,
    /// Limit for establishing connections
    pub connection_timeout: Option<Duration>,
    /// Limit for each read or write
    pub io_timeout: Option<Duration>,
    /// Limit for host name resolution
    pub name_resolver_timeout: Option<Duration>,
    /// Default `User-Agent` header
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let timeouts = Timeouts::default();
        ClientConfig {
            follow_redirect: true,
            connection_timeout: timeouts.connection,
            io_timeout: timeouts.io,
            name_resolver_timeout: timeouts.name_resolver,
            user_agent: DEFAULT_PRODUCT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable redirect following
    pub fn follow_redirect(mut self, follow: bool) -> Self {
        self.follow_redirect = follow;
        self
    }

    /// Set the connection timeout
    pub fn connection_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the I/O timeout
    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set the name resolution timeout
    pub fn name_resolver_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.name_resolver_timeout = timeout;
        self
    }

    /// Set the `User-Agent` header value
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            connection: self.connection_timeout,
            io: self.io_timeout,
            name_resolver: self.name_resolver_timeout,
        }
    }
}

/// HTTP client
///
/// The client holds no connection state between calls, so one instance
/// can serve several threads.
pub struct HttpClient {
    config: ClientConfig,
    connector: Box<dyn Connector>,
    proxy_selector: Option<Box<dyn ProxySelector>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Create a client using plain TCP and the default configuration
    pub fn new() -> Self {
        Self::with_connector(Box::new(TcpConnector::new()))
    }

    /// Create a client using a custom connector
    pub fn with_connector(connector: Box<dyn Connector>) -> Self {
        HttpClient {
            config: ClientConfig::default(),
            connector,
            proxy_selector: None,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replace the configuration
    pub fn set_config(&mut self, config: ClientConfig) {
        self.config = config;
    }

    /// Set all three timeouts at once
    pub fn set_timeouts(
        &mut self,
        connection: Option<Duration>,
        io: Option<Duration>,
        name_resolver: Option<Duration>,
    ) {
        self.config.connection_timeout = connection;
        self.config.io_timeout = io;
        self.config.name_resolver_timeout = name_resolver;
    }

    /// Set the default `User-Agent` header value
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.config.user_agent = user_agent.into();
    }

    /// Replace the connector
    pub fn set_connector(&mut self, connector: Box<dyn Connector>) {
        self.connector = connector;
    }

    /// Send every request through one proxy; an empty host removes it
    pub fn set_proxy(&mut self, host: &str, port: u16) {
        if host.is_empty() {
            self.proxy_selector = None;
        } else {
            self.proxy_selector = Some(Box::new(StaticProxySelector::new(host, port)));
        }
    }

    /// Install or remove the proxy selector
    pub fn set_proxy_selector(&mut self, selector: Option<Box<dyn ProxySelector>>) {
        self.proxy_selector = selector;
    }

    /// Send a request and return the final response
    ///
    /// Redirects are followed for GET and HEAD when enabled, replacing the
    /// request URL each time. A redirect whose `Location` cannot be parsed
    /// is returned as the final response. After [`MAX_REDIRECTS`] exchanges
    /// the call fails with [`Error::TooManyRedirects`].
    pub fn send_request(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        if *request.method() == Method::Get && request.entity().is_some() {
            return Err(Error::InvalidRequest(
                "GET request must not carry an entity".to_string(),
            ));
        }

        for _ in 0..MAX_REDIRECTS {
            let response = self.send_request_once(request)?;

            let redirectable = matches!(request.method(), Method::Get | Method::Head);
            if !(self.config.follow_redirect && redirectable && response.status().is_redirect()) {
                return Ok(response);
            }

            let location = match response.headers().get(LOCATION) {
                Some(location) => location,
                None => return Ok(response),
            };
            match request.url().join(location) {
                Ok(url) => {
                    debug!(
                        "{} redirect from {} to {}",
                        response.status().code(),
                        request.url(),
                        url
                    );
                    request.set_url(url);
                }
                Err(err) => {
                    debug!("unusable redirect location {:?}: {}", location, err);
                    return Ok(response);
                }
            }
        }

        warn!("giving up on {} after {} redirects", request.url(), MAX_REDIRECTS);
        Err(Error::TooManyRedirects)
    }

    /// Perform a single exchange without following redirects
    pub fn send_request_once(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        let proxy = self.select_proxy(request)?;
        let (host, port) = match &proxy {
            Some(proxy) => (proxy.host().to_string(), proxy.port()),
            None => (request.url().host().to_string(), request.url().port()),
        };
        debug!(
            "{} {} via {}:{}{}",
            request.method(),
            request.url(),
            host,
            port,
            if proxy.is_some() { " (proxy)" } else { "" }
        );

        let mut connection = self
            .connector
            .connect(&host, port, &self.config.timeouts())?;
        self.write_request(&mut *connection.output, request, proxy.is_some())?;

        self.read_response(
            connection.input,
            request.method().expects_response_entity(),
        )
    }

    fn select_proxy(&self, request: &HttpRequest) -> Result<Option<ProxyAddress>> {
        let selector = match &self.proxy_selector {
            Some(selector) => selector,
            None => return Ok(None),
        };
        match selector.proxy_for_url(request.url()) {
            Ok(proxy) => Ok(proxy),
            Err(Error::NoProxy) => Ok(None),
            Err(err) => {
                warn!("proxy selection failed for {}: {}", request.url(), err);
                Err(err)
            }
        }
    }

    /// Apply default headers and write the request with its body
    ///
    /// Defaults never override headers the caller already set; entity
    /// metadata always does. An entity without a stream is sent as
    /// `Content-Length: 0`. A stream with no length must be chunked,
    /// otherwise the request fails with [`Error::InvalidParameters`]
    /// before anything is written.
    pub fn write_request(
        &self,
        output: &mut dyn Write,
        request: &mut HttpRequest,
        use_proxy: bool,
    ) -> Result<()> {
        if let Some(entity) = request.entity() {
            if entity.has_stream() && entity.content_length().is_none() && !entity.is_chunked() {
                return Err(Error::InvalidParameters(
                    "entity stream has neither a length nor chunked encoding".to_string(),
                ));
            }
        }

        let http11 = request.version().is_http11();
        let host = request.url().host_header();
        let user_agent = self.config.user_agent.clone();

        let mut entity = request.take_entity();
        {
            let headers = request.headers_mut();
            if !http11 {
                headers.set(CONNECTION, "close", false);
            }
            headers.set(USER_AGENT, user_agent, false);
            headers.set(HOST, host, false);

            if let Some(entity) = entity.as_ref() {
                match (entity.content_length(), entity.has_stream()) {
                    (Some(length), true) => headers.set(CONTENT_LENGTH, length.to_string(), true),
                    (_, false) => headers.set(CONTENT_LENGTH, "0", true),
                    (None, true) => {}
                }
                if !entity.content_type().is_empty() {
                    headers.set(CONTENT_TYPE, entity.content_type(), true);
                }
                if !entity.content_encoding().is_empty() {
                    headers.set(CONTENT_ENCODING, entity.content_encoding(), true);
                }
                if entity.is_chunked() && entity.has_stream() {
                    headers.set(TRANSFER_ENCODING, entity.transfer_encoding(), true);
                }
            }
        }

        // head goes out in one write
        output.write_all(&request.head_to_wire(use_proxy))?;

        if let Some(entity) = entity.as_mut() {
            entity.write_body(output)?;
        }
        output.flush()?;

        if let Some(entity) = entity {
            request.set_entity(entity);
        }
        Ok(())
    }

    /// Read a response head, skipping interim 1xx responses
    ///
    /// With `expect_entity` the response gets an entity streaming the body
    /// from `input`: chunked framing is removed, a known length bounds the
    /// stream, otherwise the body runs to the end of the connection.
    pub fn read_response(
        &self,
        input: Box<dyn Read + Send>,
        expect_entity: bool,
    ) -> Result<HttpResponse> {
        let mut reader = BufReader::new(input);

        let mut response = loop {
            let response = parse_response(&mut reader)?;
            if response.status().is_informational() {
                debug!("skipping interim response {}", response.status().code());
                continue;
            }
            break response;
        };
        debug!(
            "response {} {}",
            response.status().code(),
            response.reason()
        );

        if expect_entity {
            let mut entity = Entity::from_headers(response.headers());
            if entity.is_chunked() {
                entity.set_stream(ChunkedReader::new(reader), None);
                entity.set_transfer_encoding("");
                entity.clear_content_length();
            } else if let Some(length) = entity.content_length() {
                entity.set_stream(reader.take(length), None);
            } else {
                entity.set_stream(reader, None);
            }
            response.set_entity(entity);
        }

        Ok(response)
    }

    /// Convenience GET returning the response
    pub fn get(&self, url: &str) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(Method::Get, url)?;
        self.send_request(&mut request)
    }

    /// Convenience POST of an in-memory body
    pub fn post(&self, url: &str, content_type: &str, body: impl Into<bytes::Bytes>) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(Method::Post, url)?;
        let mut entity = Entity::from_bytes(body);
        entity.set_content_type(content_type);
        request.set_entity(entity);
        self.send_request(&mut request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::connector::Connection;
    use crate::http::{HttpUrl, Version};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// Connector that replays canned responses and records what was sent
    struct ScriptedConnector {
        responses: Mutex<Vec<&'static str>>,
        sent: Arc<Mutex<Vec<(String, u16, Vec<u8>)>>>,
    }

    struct Recorder {
        host: String,
        port: u16,
        buffer: Vec<u8>,
        sent: Arc<Mutex<Vec<(String, u16, Vec<u8>)>>>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Drop for Recorder {
        fn drop(&mut self) {
            let record = (self.host.clone(), self.port, std::mem::take(&mut self.buffer));
            self.sent.lock().unwrap().push(record);
        }
    }

    impl ScriptedConnector {
        fn new(responses: Vec<&'static str>) -> (Self, Arc<Mutex<Vec<(String, u16, Vec<u8>)>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            let connector = ScriptedConnector {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                sent: sent.clone(),
            };
            (connector, sent)
        }
    }

    impl Connector for ScriptedConnector {
        fn connect(&self, host: &str, port: u16, _timeouts: &Timeouts) -> Result<Connection> {
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| Error::ConnectionFailed("script exhausted".to_string()))?;
            let recorder = Recorder {
                host: host.to_string(),
                port,
                buffer: Vec::new(),
                sent: self.sent.clone(),
            };
            Ok(Connection::new(Cursor::new(response.as_bytes().to_vec()), recorder))
        }
    }

    fn sent_text(sent: &Arc<Mutex<Vec<(String, u16, Vec<u8>)>>>, index: usize) -> String {
        String::from_utf8(sent.lock().unwrap()[index].2.clone()).unwrap()
    }

    #[test]
    fn test_default_headers() {
        let (connector, sent) =
            ScriptedConnector::new(vec!["HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok"]);
        let client = HttpClient::with_connector(Box::new(connector));

        let mut request = HttpRequest::new(Method::Get, "http://10.1.1.1:8080/desc.xml").unwrap();
        request.headers_mut().add("User-Agent", "custom/2.0");
        let mut response = client.send_request(&mut request).unwrap();

        assert_eq!(response.load_body().unwrap(), b"ok");
        let wire = sent_text(&sent, 0);
        assert!(wire.starts_with("GET /desc.xml HTTP/1.1\r\n"));
        assert!(wire.contains("User-Agent: custom/2.0\r\n"));
        assert!(wire.contains("Host: 10.1.1.1:8080\r\n"));
        assert!(!wire.contains("Connection: close"));
    }

    #[test]
    fn test_http10_request_closes() {
        let (connector, sent) = ScriptedConnector::new(vec!["HTTP/1.0 204 No Content\r\n\r\n"]);
        let client = HttpClient::with_connector(Box::new(connector));

        let mut request = HttpRequest::new(Method::Get, "http://media.lan/").unwrap();
        request.set_version(Version::Http10);
        client.send_request(&mut request).unwrap();

        let wire = sent_text(&sent, 0);
        assert!(wire.contains("Connection: close\r\n"));
        assert!(wire.contains("Host: media.lan\r\n"));
        assert!(wire.contains(&format!("User-Agent: {}\r\n", DEFAULT_PRODUCT)));
    }

    #[test]
    fn test_post_entity_headers() {
        let (connector, sent) = ScriptedConnector::new(vec!["HTTP/1.1 200 OK\r\n\r\n"]);
        let client = HttpClient::with_connector(Box::new(connector));

        let mut request = HttpRequest::new(Method::Post, "http://10.0.0.3/ctl").unwrap();
        request.headers_mut().add("Content-Type", "text/plain");
        let mut entity = Entity::from_bytes("<Envelope/>");
        entity.set_content_type("text/xml; charset=\"utf-8\"");
        request.set_entity(entity);
        client.send_request(&mut request).unwrap();

        let wire = sent_text(&sent, 0);
        assert!(wire.contains("Content-Length: 11\r\n"));
        assert!(wire.contains("Content-Type: text/xml; charset=\"utf-8\"\r\n"));
        assert!(wire.ends_with("\r\n\r\n<Envelope/>"));
    }

    #[test]
    fn test_entity_without_stream_sends_zero_length() {
        let (connector, sent) = ScriptedConnector::new(vec!["HTTP/1.1 200 OK\r\n\r\n"]);
        let client = HttpClient::with_connector(Box::new(connector));

        let mut request = HttpRequest::new(Method::Notify, "http://10.0.0.3/event").unwrap();
        request.headers_mut().add("Content-Length", "42");
        let mut entity = Entity::new();
        entity.set_content_type("text/xml");
        entity.set_content_encoding("identity");
        request.set_entity(entity);
        client.send_request(&mut request).unwrap();

        let wire = sent_text(&sent, 0);
        assert!(wire.contains("Content-Length: 0\r\n"));
        assert!(!wire.contains("Content-Length: 42"));
        assert!(wire.contains("Content-Type: text/xml\r\n"));
        assert!(wire.contains("Content-Encoding: identity\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_unframed_stream_rejected() {
        let (connector, sent) = ScriptedConnector::new(vec!["HTTP/1.1 200 OK\r\n\r\n"]);
        let client = HttpClient::with_connector(Box::new(connector));

        let mut request = HttpRequest::new(Method::Post, "http://10.0.0.3/ctl").unwrap();
        let mut entity = Entity::new();
        entity.set_stream(Cursor::new(b"no length".to_vec()), None);
        request.set_entity(entity);

        assert!(matches!(
            client.send_request(&mut request),
            Err(Error::InvalidParameters(_))
        ));
        assert!(request.entity().is_some());
        assert!(sent.lock().unwrap().iter().all(|(_, _, bytes)| bytes.is_empty()));
    }

    #[test]
    fn test_get_with_entity_rejected() {
        let (connector, sent) = ScriptedConnector::new(vec![]);
        let client = HttpClient::with_connector(Box::new(connector));

        let mut request = HttpRequest::new(Method::Get, "http://10.0.0.3/").unwrap();
        request.set_entity(Entity::from_bytes("x"));
        assert!(matches!(
            client.send_request(&mut request),
            Err(Error::InvalidRequest(_))
        ));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_skips_interim_responses() {
        let (connector, _) = ScriptedConnector::new(vec![
            "HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nyes",
        ]);
        let client = HttpClient::with_connector(Box::new(connector));

        let mut response = client.get("http://10.0.0.3/").unwrap();
        assert_eq!(response.status().code(), 200);
        assert_eq!(response.load_body().unwrap(), b"yes");
    }

    #[test]
    fn test_chunked_response() {
        let (connector, _) = ScriptedConnector::new(vec![
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
        ]);
        let client = HttpClient::with_connector(Box::new(connector));

        let mut response = client.get("http://10.0.0.3/").unwrap();
        let entity = response.entity().unwrap();
        assert_eq!(entity.transfer_encoding(), "");
        assert_eq!(entity.content_length(), None);
        assert_eq!(response.load_body().unwrap(), b"Wikipedia");
    }

    #[test]
    fn test_head_has_no_entity() {
        let (connector, _) =
            ScriptedConnector::new(vec!["HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n"]);
        let client = HttpClient::with_connector(Box::new(connector));

        let mut request = HttpRequest::new(Method::Head, "http://10.0.0.3/big").unwrap();
        let response = client.send_request(&mut request).unwrap();
        assert!(response.entity().is_none());
    }

    #[test]
    fn test_follows_relative_redirects() {
        let (connector, sent) = ScriptedConnector::new(vec![
            "HTTP/1.1 302 Found\r\nLocation: /second\r\n\r\n",
            "HTTP/1.1 301 Moved Permanently\r\nLocation: http://other:81/third\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone",
        ]);
        let client = HttpClient::with_connector(Box::new(connector));

        let mut request = HttpRequest::new(Method::Get, "http://first:8000/start").unwrap();
        let mut response = client.send_request(&mut request).unwrap();

        assert_eq!(response.load_body().unwrap(), b"done");
        assert_eq!(request.url().to_string(), "http://other:81/third");

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!((sent[1].0.as_str(), sent[1].1), ("first", 8000));
        assert!(String::from_utf8_lossy(&sent[1].2).starts_with("GET /second "));
        assert_eq!((sent[2].0.as_str(), sent[2].1), ("other", 81));
    }

    #[test]
    fn test_redirect_not_followed_when_disabled() {
        let (connector, _) =
            ScriptedConnector::new(vec!["HTTP/1.1 302 Found\r\nLocation: /x\r\n\r\n"]);
        let mut client = HttpClient::with_connector(Box::new(connector));
        client.set_config(ClientConfig::new().follow_redirect(false));

        let response = client.get("http://a/").unwrap();
        assert_eq!(response.status().code(), 302);
    }

    #[test]
    fn test_post_redirect_returned() {
        let (connector, _) =
            ScriptedConnector::new(vec!["HTTP/1.1 303 See Other\r\nLocation: /x\r\n\r\n"]);
        let client = HttpClient::with_connector(Box::new(connector));

        let response = client.post("http://a/form", "text/plain", "data").unwrap();
        assert_eq!(response.status().code(), 303);
    }

    #[test]
    fn test_too_many_redirects() {
        let loops = vec!["HTTP/1.1 307 Temporary Redirect\r\nLocation: /loop\r\n\r\n"; MAX_REDIRECTS];
        let (connector, sent) = ScriptedConnector::new(loops);
        let client = HttpClient::with_connector(Box::new(connector));

        assert!(matches!(client.get("http://a/"), Err(Error::TooManyRedirects)));
        assert_eq!(sent.lock().unwrap().len(), MAX_REDIRECTS);
    }

    #[test]
    fn test_proxy_request_uses_absolute_target() {
        let (connector, sent) = ScriptedConnector::new(vec!["HTTP/1.1 200 OK\r\n\r\n"]);
        let mut client = HttpClient::with_connector(Box::new(connector));
        client.set_proxy("gateway", 3128);

        client.get("http://media.lan:8200/x?y=1").unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!((sent[0].0.as_str(), sent[0].1), ("gateway", 3128));
        let wire = String::from_utf8_lossy(&sent[0].2);
        assert!(wire.starts_with("GET http://media.lan:8200/x?y=1 HTTP/1.1\r\n"));
        assert!(wire.contains("Host: media.lan:8200\r\n"));
    }

    #[test]
    fn test_proxy_selector_errors() {
        let (connector, sent) = ScriptedConnector::new(vec!["HTTP/1.1 200 OK\r\n\r\n"]);
        let mut client = HttpClient::with_connector(Box::new(connector));

        client.set_proxy_selector(Some(Box::new(|_: &HttpUrl| -> Result<Option<ProxyAddress>> {
            Err(Error::NoProxy)
        })));
        client.get("http://direct:9000/").unwrap();
        assert_eq!(sent.lock().unwrap()[0].0, "direct");

        client.set_proxy_selector(Some(Box::new(|_: &HttpUrl| -> Result<Option<ProxyAddress>> {
            Err(Error::NotSupported("pac".to_string()))
        })));
        assert!(matches!(client.get("http://direct/"), Err(Error::NotSupported(_))));
    }
}

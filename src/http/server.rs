//! HTTP server implementation
//!
//! [`HttpServer`] binds a listening socket, accepts one client at a time
//! and answers exactly one request per connection. Requests are routed to
//! the first registered [`RequestHandler`] whose path matches; handler
//! failures are turned into small HTML error pages.

use super::chunked::ChunkedReader;
use super::entity::Entity;
use super::handler::{RequestContext, RequestHandler};
use super::header_names::{
    CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, SERVER, TRANSFER_ENCODING,
};
use super::parser::parse_request;
use super::{
    Error, HttpRequest, HttpResponse, Method, Result, Status, Version, DEFAULT_HTTP_PORT,
    DEFAULT_PRODUCT,
};
use log::{debug, info, trace, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, BufReader, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LISTEN_BACKLOG: i32 = 128;

const FORBIDDEN_HTML: &str = "<html><head><title>403 Forbidden</title></head><body><h1>Forbidden</h1><p>Access to this URL is forbidden.</p></html>";
const NOT_FOUND_HTML: &str = "<html><head><title>404 Not Found</title></head><body><h1>Not Found</h1><p>The requested URL was not found on this server.</p></html>";
const INTERNAL_ERROR_HTML: &str = "<html><head><title>500 Internal Error</title></head><body><h1>Internal Error</h1><p>The server encountered an unexpected condition which prevented it from fulfilling the request.</p></html>";

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen_address: IpAddr,
    /// Port to listen on, 0 picks an ephemeral port
    pub listen_port: u16,
    /// Set `SO_REUSEADDR` before binding
    pub reuse_address: bool,
    /// Limit for waiting on a new client, `None` waits forever
    pub connection_timeout: Option<Duration>,
    /// Limit for each read or write on a client connection
    pub io_timeout: Option<Duration>,
    /// Default `Server` header
    pub server_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: DEFAULT_HTTP_PORT,
            reuse_address: true,
            connection_timeout: None,
            io_timeout: Some(Duration::from_secs(60)),
            server_header: DEFAULT_PRODUCT.to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a configuration listening on all interfaces at `port`
    pub fn new(port: u16) -> Self {
        ServerConfig {
            listen_port: port,
            ..Self::default()
        }
    }

    /// Set the listen address
    pub fn listen_address(mut self, address: IpAddr) -> Self {
        self.listen_address = address;
        self
    }

    /// Enable or disable address reuse
    pub fn reuse_address(mut self, reuse: bool) -> Self {
        self.reuse_address = reuse;
        self
    }

    /// Set the accept timeout
    pub fn connection_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the per-connection I/O timeout
    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set the `Server` header value
    pub fn server_header(mut self, header: impl Into<String>) -> Self {
        self.server_header = header.into();
        self
    }
}

struct HandlerConfig {
    handler: Arc<dyn RequestHandler>,
    path: String,
    include_children: bool,
}

/// HTTP server
pub struct HttpServer {
    config: ServerConfig,
    listener: Option<TcpListener>,
    handlers: Vec<HandlerConfig>,
    aborted: Arc<AtomicBool>,
}

impl HttpServer {
    /// Create a server; the socket is bound on first use
    pub fn new(config: ServerConfig) -> Self {
        HttpServer {
            config,
            listener: None,
            handlers: Vec::new(),
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Replace the configuration and make sure the socket is bound
    ///
    /// An already bound socket keeps its address.
    pub fn set_config(&mut self, config: ServerConfig) -> Result<()> {
        self.config = config;
        self.bind()
    }

    /// Bind and listen; does nothing if already bound
    pub fn bind(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }

        let addr = SocketAddr::new(self.config.listen_address, self.config.listen_port);
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        if self.config.reuse_address {
            socket.set_reuse_address(true)?;
        }
        if let Err(err) = socket.bind(&addr.into()) {
            warn!("failed to bind {}: {}", addr, err);
            return Err(err.into());
        }
        socket.listen(LISTEN_BACKLOG)?;

        let listener: TcpListener = socket.into();
        info!("listening on {}", listener.local_addr()?);
        self.listener = Some(listener);
        Ok(())
    }

    /// Address the server is bound to, if bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Port the server is bound to, if bound
    pub fn bound_port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }

    /// Register a handler for a path
    ///
    /// With `include_children` the handler serves every path starting with
    /// `path`, otherwise only `path` itself. Handlers are tried in
    /// registration order.
    pub fn add_request_handler(
        &mut self,
        handler: Arc<dyn RequestHandler>,
        path: impl Into<String>,
        include_children: bool,
    ) {
        self.handlers.push(HandlerConfig {
            handler,
            path: path.into(),
            include_children,
        });
    }

    /// Find the handler for a request path
    pub fn find_request_handler(&self, request: &HttpRequest) -> Option<Arc<dyn RequestHandler>> {
        let path = request.url().path();
        self.handlers
            .iter()
            .find(|config| {
                if config.include_children {
                    path.starts_with(&config.path)
                } else {
                    path == config.path
                }
            })
            .map(|config| config.handler.clone())
    }

    /// Get a handle that stops [`run`](HttpServer::run) from another thread
    pub fn abort_handle(&mut self) -> Result<AbortHandle> {
        self.bind()?;
        let listener = self.listener()?.try_clone()?;
        Ok(AbortHandle {
            aborted: self.aborted.clone(),
            listener: Arc::new(Socket::from(listener)),
        })
    }

    fn listener(&self) -> Result<&TcpListener> {
        self.listener
            .as_ref()
            .ok_or_else(|| Error::InvalidParameters("server is not bound".to_string()))
    }

    /// Wait for a client and accept it
    ///
    /// Fails with [`Error::Timeout`] when no client arrives within the
    /// connection timeout, and with [`Error::ConnectionClosed`] once the
    /// server has been aborted.
    pub fn wait_for_new_client(&mut self) -> Result<(TcpStream, RequestContext)> {
        self.bind()?;
        let listener = self.listener()?;

        if !wait_readable(listener.as_raw_fd(), self.config.connection_timeout)? {
            return Err(Error::Timeout);
        }
        if self.aborted.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        let (stream, remote) = listener.accept()?;
        stream.set_read_timeout(self.config.io_timeout)?;
        stream.set_write_timeout(self.config.io_timeout)?;

        let context = RequestContext::new(stream.local_addr().ok(), Some(remote));
        debug!("accepted client {}", remote);
        Ok((stream, context))
    }

    /// Serve clients one after another until accepting fails
    ///
    /// A failed exchange is logged and the loop moves on. Returns `Ok` when
    /// stopped through an [`AbortHandle`], otherwise the accept error.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let (stream, context) = match self.wait_for_new_client() {
                Ok(client) => client,
                Err(_) if self.aborted.load(Ordering::SeqCst) => {
                    info!("server aborted");
                    return Ok(());
                }
                Err(err) => {
                    warn!("accept failed: {}", err);
                    return Err(err);
                }
            };

            let input = stream.try_clone()?;
            let mut output = stream;
            if let Err(err) = self.respond_to_client(input, &mut output, &context) {
                debug!("exchange with {:?} failed: {}", context.remote_address(), err);
            }
            // dropping both halves closes the connection
        }
    }

    /// Answer one request read from `input`, writing the response to `output`
    pub fn respond_to_client<R, W>(
        &self,
        input: R,
        output: &mut W,
        context: &RequestContext,
    ) -> Result<()>
    where
        R: Read + Send + 'static,
        W: Write,
    {
        let mut responder = HttpResponder::new(input, output, self.config.server_header.clone());

        let mut request = match responder.parse_request(context.local_address()) {
            Ok(request) => request,
            Err(err) => {
                debug!("failed to parse request: {}", err);
                return Err(err);
            }
        };
        info!(
            "{} {} from {:?}",
            request.method(),
            request.url().to_request_string(),
            context.remote_address()
        );

        let handler = self.find_request_handler(&request);
        let mut response = HttpResponse::builder()
            .version(Version::Http10)
            .status(Status::OK)
            .reason("OK")
            .entity(Entity::new())
            .build();

        let result = match &handler {
            Some(handler) => handler.setup_response(&mut request, context, &mut response),
            None => Err(Error::NoSuchItem(request.url().path().to_string())),
        };

        let mut handler_sends_body = handler.is_some();
        if let Err(err) = result {
            let (status, reason, page) = match &err {
                Error::NoSuchItem(_) => (Status::NOT_FOUND, "Not Found", NOT_FOUND_HTML),
                Error::PermissionDenied(_) => (Status::FORBIDDEN, "Forbidden", FORBIDDEN_HTML),
                _ => (
                    Status::INTERNAL_SERVER_ERROR,
                    "Internal Error",
                    INTERNAL_ERROR_HTML,
                ),
            };
            debug!("{} for {}: {}", status.code(), request.url().path(), err);

            response.set_status(status, reason);
            let mut entity = Entity::from_bytes(page);
            entity.set_content_type("text/html");
            response.set_entity(entity);
            handler_sends_body = false;
        }

        if let Err(err) = responder.send_response_headers(&mut response) {
            debug!("failed to send response headers: {}", err);
            return Err(err);
        }

        let body = if *request.method() == Method::Head {
            Ok(())
        } else {
            match &handler {
                Some(handler) if handler_sends_body => {
                    handler.send_response_body(context, &mut response, responder.output())
                }
                _ => match response.entity_mut() {
                    Some(entity) => entity.write_body(responder.output()).map(|_| ()),
                    None => Ok(()),
                },
            }
        };

        let flushed = responder.output().flush();
        if let Err(err) = &body {
            debug!("failed to send response body: {}", err);
        }
        body?;
        flushed?;
        Ok(())
    }
}

/// Stops a running [`HttpServer`] from another thread
#[derive(Clone)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
    listener: Arc<Socket>,
}

impl AbortHandle {
    /// Mark the server aborted and wake it from accept
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        if let Err(err) = self.listener.shutdown(Shutdown::Both) {
            debug!("listener shutdown: {}", err);
        }
    }
}

/// Reads one request from a connection and writes the response head
///
/// `HttpServer::respond_to_client` drives it; custom servers can use it
/// directly.
pub struct HttpResponder<'a, W: Write> {
    input: Option<BufReader<Box<dyn Read + Send>>>,
    output: &'a mut W,
    server_header: String,
}

impl<'a, W: Write> HttpResponder<'a, W> {
    pub fn new(
        input: impl Read + Send + 'static,
        output: &'a mut W,
        server_header: impl Into<String>,
    ) -> Self {
        let input: Box<dyn Read + Send> = Box::new(input);
        HttpResponder {
            input: Some(BufReader::new(input)),
            output,
            server_header: server_header.into(),
        }
    }

    /// Parse the request head and attach the request body
    ///
    /// Requests other than GET and HEAD get an entity: chunked bodies are
    /// decoded, others are bounded by `Content-Length` (absent means empty).
    /// Can be called once per connection.
    pub fn parse_request(&mut self, local_address: Option<SocketAddr>) -> Result<HttpRequest> {
        let mut reader = self
            .input
            .take()
            .ok_or_else(|| Error::InvalidParameters("request already parsed".to_string()))?;
        let mut request = parse_request(&mut reader, local_address)?;

        if !matches!(request.method(), Method::Get | Method::Head) {
            let mut entity = Entity::from_headers(request.headers());
            if entity.is_chunked() {
                entity.set_stream(ChunkedReader::new(reader), None);
                entity.set_transfer_encoding("");
                entity.clear_content_length();
            } else {
                let length = entity.content_length().unwrap_or(0);
                entity.set_stream(reader.take(length), Some(length));
            }
            request.set_entity(entity);
        }

        Ok(request)
    }

    /// Apply server defaults and entity headers, then write the head
    ///
    /// Entity metadata is copied whenever an entity is present. Without a
    /// body stream the response always advertises `Content-Length: 0`.
    pub fn send_response_headers(&mut self, response: &mut HttpResponse) -> Result<()> {
        let http11 = response.version().is_http11();
        let entity = response.entity().map(|e| {
            (
                e.has_stream(),
                e.content_length(),
                e.content_type().to_string(),
                e.content_encoding().to_string(),
                e.transfer_encoding().to_string(),
            )
        });

        let headers = response.headers_mut();
        headers.set(SERVER, self.server_header.as_str(), false);
        if !http11 {
            headers.set(CONNECTION, "close", false);
        }

        let has_stream = match entity {
            Some((has_stream, length, content_type, content_encoding, transfer_encoding)) => {
                if let (true, Some(length)) = (has_stream, length) {
                    headers.set(CONTENT_LENGTH, length.to_string(), true);
                }
                if !content_type.is_empty() {
                    headers.set(CONTENT_TYPE, content_type, true);
                }
                if !content_encoding.is_empty() {
                    headers.set(CONTENT_ENCODING, content_encoding, true);
                }
                if !transfer_encoding.is_empty() {
                    headers.set(TRANSFER_ENCODING, transfer_encoding, true);
                }
                has_stream
            }
            None => false,
        };
        if !has_stream {
            headers.set(CONTENT_LENGTH, "0", true);
        }

        trace!(
            "response head: {} {}",
            response.status().code(),
            response.reason()
        );
        self.output.write_all(&response.head_to_wire())?;
        Ok(())
    }

    /// The connection output, for writing the body
    pub fn output(&mut self) -> &mut W {
        &mut *self.output
    }
}

/// Wait until `fd` is readable, `Ok(false)` on timeout
fn wait_readable(fd: RawFd, timeout: Option<Duration>) -> Result<bool> {
    use libc::{poll, pollfd, POLLIN};

    let mut pfd = pollfd {
        fd,
        events: POLLIN,
        revents: 0,
    };

    let timeout_ms = timeout
        .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
        .unwrap_or(-1); // -1 = infinite

    loop {
        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };
        if result >= 0 {
            return Ok(result > 0);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(Error::Io(err));
        }
    }
}

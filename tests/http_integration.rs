//! Integration tests for the HTTP layer
//!
//! These tests run the client against a real server on a loopback port.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use upnp_http::http::{
    AbortHandle, ClientConfig, Entity, Error, FileRequestHandler, HttpClient, HttpRequest,
    HttpResponse, HttpServer, Method, RequestContext, RequestHandler, Result, ServerConfig,
    StaticRequestHandler, Status,
};

fn handler(handler: impl RequestHandler + 'static) -> Arc<dyn RequestHandler> {
    Arc::new(handler)
}

struct TestServer {
    port: u16,
    abort: AbortHandle,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    fn start(handlers: Vec<(Arc<dyn RequestHandler>, &str, bool)>) -> Self {
        let config = ServerConfig::new(0)
            .listen_address("127.0.0.1".parse().unwrap())
            .io_timeout(Some(Duration::from_secs(5)));
        let mut server = HttpServer::new(config);
        for (handler, path, include_children) in handlers {
            server.add_request_handler(handler, path, include_children);
        }
        server.bind().unwrap();
        let port = server.bound_port().unwrap();
        let abort = server.abort_handle().unwrap();
        let handle = thread::spawn(move || server.run());
        TestServer { port, abort, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    fn stop(self) {
        self.abort.abort();
        assert!(self.handle.join().unwrap().is_ok());
    }
}

/// Redirects to `location`, counting hits
struct Redirect {
    location: String,
    hits: Arc<AtomicUsize>,
}

impl RequestHandler for Redirect {
    fn setup_response(
        &self,
        _request: &mut HttpRequest,
        _context: &RequestContext,
        response: &mut HttpResponse,
    ) -> Result<()> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        response.set_status(Status::new(302)?, "Found");
        response.headers_mut().set("Location", self.location.as_str(), true);
        Ok(())
    }
}

/// Echoes the request body back with the request's content type
struct Echo;

impl RequestHandler for Echo {
    fn setup_response(
        &self,
        request: &mut HttpRequest,
        _context: &RequestContext,
        response: &mut HttpResponse,
    ) -> Result<()> {
        let body = match request.entity_mut() {
            Some(entity) => entity.load()?,
            None => Vec::new(),
        };
        let content_type = request
            .entity()
            .map(|entity| entity.content_type().to_string())
            .unwrap_or_default();
        let entity = response.entity_or_default();
        entity.set_content_type(content_type);
        entity.set_body(body);
        Ok(())
    }
}

#[test]
fn test_get_static_document() {
    let server = TestServer::start(vec![(
        handler(StaticRequestHandler::new("text/xml", "<root/>")),
        "/description.xml",
        false,
    )]);

    let client = HttpClient::new();
    let mut response = client.get(&server.url("/description.xml")).unwrap();
    assert_eq!(response.status().code(), 200);
    assert_eq!(response.entity().unwrap().content_type(), "text/xml");
    assert_eq!(response.load_body().unwrap(), b"<root/>");

    let mut response = client.get(&server.url("/missing")).unwrap();
    assert_eq!(response.status().code(), 404);
    assert_eq!(response.reason(), "Not Found");
    let body = String::from_utf8(response.load_body().unwrap()).unwrap();
    assert!(body.contains("404"));

    server.stop();
}

#[test]
fn test_post_echo() {
    let server = TestServer::start(vec![(handler(Echo), "/control", false)]);

    let client = HttpClient::new();
    let mut response = client
        .post(&server.url("/control"), "text/xml; charset=\"utf-8\"", "<Browse/>")
        .unwrap();
    assert_eq!(response.status().code(), 200);
    assert_eq!(
        response.entity().unwrap().content_type(),
        "text/xml; charset=\"utf-8\""
    );
    assert_eq!(response.load_body().unwrap(), b"<Browse/>");

    server.stop();
}

#[test]
fn test_chunked_request_body() {
    let server = TestServer::start(vec![(handler(Echo), "/", true)]);

    let mut entity = Entity::new();
    entity.set_transfer_encoding("chunked");
    entity.set_stream(std::io::Cursor::new(b"streamed without a length".to_vec()), None);
    let mut request = HttpRequest::builder()
        .method(Method::Post)
        .url(server.url("/event"))
        .entity(entity)
        .build()
        .unwrap();

    let mut response = HttpClient::new().send_request(&mut request).unwrap();
    assert_eq!(response.load_body().unwrap(), b"streamed without a length");

    server.stop();
}

#[test]
fn test_redirect_chain() {
    let hits = Arc::new(AtomicUsize::new(0));
    let server = TestServer::start(vec![
        (
            handler(Redirect {
                location: "/second".to_string(),
                hits: hits.clone(),
            }),
            "/first",
            false,
        ),
        (
            handler(Redirect {
                location: "/final".to_string(),
                hits: hits.clone(),
            }),
            "/second",
            false,
        ),
        (
            handler(StaticRequestHandler::new("text/plain", "arrived")),
            "/final",
            false,
        ),
    ]);

    let client = HttpClient::new();
    let mut request = HttpRequest::new(Method::Get, &server.url("/first")).unwrap();
    let mut response = client.send_request(&mut request).unwrap();

    assert_eq!(response.status().code(), 200);
    assert_eq!(response.load_body().unwrap(), b"arrived");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(request.url().path(), "/final");

    server.stop();
}

#[test]
fn test_redirect_not_followed() {
    let hits = Arc::new(AtomicUsize::new(0));
    let server = TestServer::start(vec![(
        handler(Redirect {
            location: "/elsewhere".to_string(),
            hits: hits.clone(),
        }),
        "/",
        true,
    )]);

    let mut client = HttpClient::new();
    client.set_config(ClientConfig::new().follow_redirect(false));
    let response = client.get(&server.url("/moved")).unwrap();
    assert_eq!(response.status().code(), 302);
    assert_eq!(response.headers().get("Location"), Some("/elsewhere"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    server.stop();
}

#[test]
fn test_endless_redirects() {
    let hits = Arc::new(AtomicUsize::new(0));
    let server = TestServer::start(vec![(
        handler(Redirect {
            location: "/loop".to_string(),
            hits: hits.clone(),
        }),
        "/loop",
        false,
    )]);

    let result = HttpClient::new().get(&server.url("/loop"));
    assert!(matches!(result, Err(Error::TooManyRedirects)));
    assert_eq!(hits.load(Ordering::SeqCst), 20);

    server.stop();
}

#[test]
fn test_get_with_entity_is_rejected() {
    let mut request = HttpRequest::builder()
        .method(Method::Get)
        .url("http://127.0.0.1:9/never")
        .entity(Entity::from_bytes("body"))
        .build()
        .unwrap();

    let result = HttpClient::new().send_request(&mut request);
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}

#[test]
fn test_file_serving_with_ranges() {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    fs::write(dir.path().join("clip.mp4"), &data).unwrap();

    let server = TestServer::start(vec![(
        handler(FileRequestHandler::new("/content", dir.path())),
        "/content",
        true,
    )]);
    let client = HttpClient::new();

    let mut response = client.get(&server.url("/content/clip.mp4")).unwrap();
    assert_eq!(response.status().code(), 200);
    assert_eq!(response.headers().get("Accept-Ranges"), Some("bytes"));
    assert_eq!(response.entity().unwrap().content_type(), "video/mp4");
    assert_eq!(response.load_body().unwrap(), data);

    let mut request = HttpRequest::new(Method::Get, &server.url("/content/clip.mp4")).unwrap();
    request.headers_mut().add("Range", "bytes=1000-1999");
    let mut response = client.send_request(&mut request).unwrap();
    assert_eq!(response.status().code(), 206);
    assert_eq!(
        response.headers().get("Content-Range"),
        Some("bytes 1000-1999/4096")
    );
    assert_eq!(response.load_body().unwrap(), &data[1000..2000]);

    let mut request = HttpRequest::new(Method::Get, &server.url("/content/clip.mp4")).unwrap();
    request.headers_mut().add("Range", "bytes=4000-5000");
    let response = client.send_request(&mut request).unwrap();
    assert_eq!(response.status().code(), 416);
    assert_eq!(response.headers().get("Content-Range"), Some("bytes */4096"));

    let mut request = HttpRequest::new(Method::Head, &server.url("/content/clip.mp4")).unwrap();
    let response = client.send_request(&mut request).unwrap();
    assert_eq!(response.status().code(), 200);
    assert_eq!(response.headers().get("Content-Length"), Some("4096"));

    let response = client.get(&server.url("/content/nothing.mp4")).unwrap();
    assert_eq!(response.status().code(), 404);

    server.stop();
}

#[test]
fn test_raw_http10_request() {
    let server = TestServer::start(vec![(
        handler(StaticRequestHandler::new("text/plain", "plain")),
        "/",
        true,
    )]);

    let mut stream = TcpStream::connect(("127.0.0.1", server.port)).unwrap();
    stream
        .write_all(b"GET /anything HTTP/1.0\r\nUser-Agent: raw\r\n\r\n")
        .unwrap();
    let mut wire = String::new();
    stream.read_to_string(&mut wire).unwrap();

    assert!(wire.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(wire.contains("Connection: close\r\n"));
    assert!(wire.contains("Content-Length: 5\r\n"));
    assert!(wire.ends_with("\r\n\r\nplain"));

    server.stop();
}

#[test]
fn test_unknown_method_gets_405() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"text").unwrap();
    let server = TestServer::start(vec![(
        handler(FileRequestHandler::new("/media", dir.path())),
        "/media",
        true,
    )]);

    let mut stream = TcpStream::connect(("127.0.0.1", server.port)).unwrap();
    stream
        .write_all(b"PROPFIND /media/a.txt HTTP/1.1\r\nHost: x\r\nDepth: 0\r\n\r\n")
        .unwrap();
    let mut wire = String::new();
    stream.read_to_string(&mut wire).unwrap();

    assert!(wire.starts_with("HTTP/1.0 405 Method Not Allowed\r\n"), "{}", wire);
    assert!(wire.contains("Content-Length: 0\r\n"));

    server.stop();
}

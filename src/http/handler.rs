//! Request handlers
//!
//! The server dispatches each request to a [`RequestHandler`] registered
//! for a path prefix. A handler fills in the response in
//! [`setup_response`](RequestHandler::setup_response) and may take over
//! body transmission in
//! [`send_response_body`](RequestHandler::send_response_body).

use super::{HttpRequest, HttpResponse, Result};
use bytes::Bytes;
use std::io::Write;
use std::net::SocketAddr;

/// Endpoints of the connection a request arrived on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    local_address: Option<SocketAddr>,
    remote_address: Option<SocketAddr>,
}

impl RequestContext {
    pub fn new(local_address: Option<SocketAddr>, remote_address: Option<SocketAddr>) -> Self {
        RequestContext {
            local_address,
            remote_address,
        }
    }

    /// Address the request was received on
    pub fn local_address(&self) -> Option<SocketAddr> {
        self.local_address
    }

    /// Address of the client
    pub fn remote_address(&self) -> Option<SocketAddr> {
        self.remote_address
    }
}

/// Produces responses for requests under a path
///
/// Errors returned from `setup_response` are mapped to status codes by the
/// server: [`Error::NoSuchItem`](super::Error::NoSuchItem) becomes 404,
/// [`Error::PermissionDenied`](super::Error::PermissionDenied) 403 and
/// anything else 500.
pub trait RequestHandler: Send + Sync {
    /// Fill in status, headers and entity for `request`
    fn setup_response(
        &self,
        request: &mut HttpRequest,
        context: &RequestContext,
        response: &mut HttpResponse,
    ) -> Result<()>;

    /// Write the response body after the head has been sent
    ///
    /// The default streams the response entity, with chunked framing when
    /// its transfer encoding says so.
    fn send_response_body(
        &self,
        _context: &RequestContext,
        response: &mut HttpResponse,
        output: &mut dyn Write,
    ) -> Result<()> {
        if let Some(entity) = response.entity_mut() {
            entity.write_body(output)?;
        }
        output.flush()?;
        Ok(())
    }
}

/// Serves a fixed body with a fixed content type
#[derive(Debug, Clone)]
pub struct StaticRequestHandler {
    mime_type: String,
    body: Bytes,
}

impl StaticRequestHandler {
    pub fn new(mime_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        StaticRequestHandler {
            mime_type: mime_type.into(),
            body: body.into(),
        }
    }
}

impl RequestHandler for StaticRequestHandler {
    fn setup_response(
        &self,
        _request: &mut HttpRequest,
        _context: &RequestContext,
        response: &mut HttpResponse,
    ) -> Result<()> {
        let entity = response.entity_or_default();
        entity.set_content_type(self.mime_type.as_str());
        entity.set_body(self.body.clone());
        Ok(())
    }
}

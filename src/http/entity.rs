//! HTTP entities
//!
//! An [`Entity`] describes a message payload: its length (when known),
//! content type, content and transfer encodings, and the stream the bytes
//! are read from.

use super::chunked::ChunkedWriter;
use super::header_names::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use super::{Error, Headers, Result, TRANSFER_ENCODING_CHUNKED};
use bytes::Bytes;
use log::debug;
use std::fmt;
use std::io::{self, Cursor, Read, Write};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Readable source of entity bytes
pub type BodyStream = Box<dyn Read + Send>;

/// Payload of a request or response
///
/// When the transfer encoding is `chunked` the content length is reported
/// as unknown, whatever value was recorded.
#[derive(Default)]
pub struct Entity {
    content_length: Option<u64>,
    content_type: String,
    content_encoding: String,
    transfer_encoding: String,
    stream: Option<BodyStream>,
}

impl Entity {
    /// Create an empty entity with no stream
    pub fn new() -> Self {
        Entity::default()
    }

    /// Create an entity described by message headers
    ///
    /// An unparsable `Content-Length` is recorded as zero.
    pub fn from_headers(headers: &Headers) -> Self {
        let mut entity = Entity::new();

        if let Some(length) = headers.get(CONTENT_LENGTH) {
            entity.content_length = Some(length.trim().parse::<u64>().unwrap_or(0));
        }
        if let Some(content_type) = headers.get(CONTENT_TYPE) {
            entity.content_type = content_type.to_string();
        }
        if let Some(encoding) = headers.get(CONTENT_ENCODING) {
            entity.content_encoding = encoding.to_string();
        }
        if let Some(encoding) = headers.get(TRANSFER_ENCODING) {
            entity.transfer_encoding = encoding.to_string();
        }

        entity
    }

    /// Create an entity holding an in-memory body
    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        let mut entity = Entity::new();
        entity.set_body(body);
        entity
    }

    /// Get the content length, `None` when unknown or chunked
    pub fn content_length(&self) -> Option<u64> {
        if self.is_chunked() {
            None
        } else {
            self.content_length
        }
    }

    /// Set the content length
    pub fn set_content_length(&mut self, length: u64) {
        self.content_length = Some(length);
    }

    /// Forget the content length
    pub fn clear_content_length(&mut self) {
        self.content_length = None;
    }

    /// Get the content type (empty if unset)
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Set the content type
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    /// Get the content encoding (empty if unset)
    pub fn content_encoding(&self) -> &str {
        &self.content_encoding
    }

    /// Set the content encoding
    pub fn set_content_encoding(&mut self, encoding: impl Into<String>) {
        self.content_encoding = encoding.into();
    }

    /// Get the transfer encoding (empty if unset)
    pub fn transfer_encoding(&self) -> &str {
        &self.transfer_encoding
    }

    /// Set the transfer encoding, an empty string clears it
    pub fn set_transfer_encoding(&mut self, encoding: impl Into<String>) {
        self.transfer_encoding = encoding.into();
    }

    /// Whether the body uses chunked transfer framing
    pub fn is_chunked(&self) -> bool {
        self.transfer_encoding
            .eq_ignore_ascii_case(TRANSFER_ENCODING_CHUNKED)
    }

    /// Use an in-memory buffer as the body, recording its length
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        let body = body.into();
        self.content_length = Some(body.len() as u64);
        self.stream = Some(Box::new(Cursor::new(body)));
    }

    /// Use a stream as the body
    ///
    /// `length` replaces the recorded content length when given; pass
    /// `None` to keep whatever the headers declared.
    pub fn set_stream(&mut self, stream: impl Read + Send + 'static, length: Option<u64>) {
        if length.is_some() {
            self.content_length = length;
        }
        self.stream = Some(Box::new(stream));
    }

    /// Whether a body stream is attached
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Borrow the body stream
    pub fn stream_mut(&mut self) -> Option<&mut BodyStream> {
        self.stream.as_mut()
    }

    /// Detach the body stream
    pub fn take_stream(&mut self) -> Option<BodyStream> {
        self.stream.take()
    }

    /// Read the whole body into memory
    ///
    /// Reads exactly the content length when it is known, otherwise until
    /// the stream ends.
    pub fn load(&mut self) -> Result<Vec<u8>> {
        let length = self.content_length();
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::InvalidParameters("entity has no body stream".to_string()))?;

        let mut body = Vec::new();
        match length {
            Some(length) => {
                stream.take(length).read_to_end(&mut body)?;
                if (body.len() as u64) < length {
                    return Err(Error::ConnectionClosed);
                }
            }
            None => {
                stream.read_to_end(&mut body)?;
            }
        }
        Ok(body)
    }

    /// Send the body stream to `output`, consuming the stream
    ///
    /// Chunked entities are framed with [`ChunkedWriter`]; others are
    /// copied up to the content length, or until the stream ends when the
    /// length is unknown. Returns the number of payload bytes written.
    pub fn write_body(&mut self, output: &mut dyn Write) -> Result<u64> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => return Ok(0),
        };

        let (written, result) = if self.is_chunked() {
            let mut framed = ChunkedWriter::new(&mut *output);
            match copy_stream(&mut stream, &mut framed, None) {
                (written, Ok(())) => (written, framed.finish().map(|_| ())),
                failed => failed,
            }
        } else {
            copy_stream(&mut stream, output, self.content_length())
        };

        if let Err(err) = result {
            debug!("body only partially written ({} bytes): {}", written, err);
            return Err(err.into());
        }
        Ok(written)
    }
}

/// Copy `src` to `dst`, at most `limit` bytes when given
///
/// With a limit, a source that ends early is an error. The byte count is
/// returned alongside the outcome so partial copies can be reported.
fn copy_stream(
    src: &mut dyn Read,
    dst: &mut dyn Write,
    limit: Option<u64>,
) -> (u64, io::Result<()>) {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let want = match limit {
            Some(limit) if copied >= limit => return (copied, Ok(())),
            Some(limit) => (limit - copied).min(buf.len() as u64) as usize,
            None => buf.len(),
        };

        let n = match src.read(&mut buf[..want]) {
            Ok(0) if limit.is_some() => {
                return (copied, Err(io::ErrorKind::UnexpectedEof.into()));
            }
            Ok(0) => return (copied, Ok(())),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return (copied, Err(err)),
        };

        if let Err(err) = dst.write_all(&buf[..n]) {
            return (copied, Err(err));
        }
        copied += n as u64;
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .field("content_encoding", &self.content_encoding)
            .field("transfer_encoding", &self.transfer_encoding)
            .field("has_stream", &self.stream.is_some())
            .finish()
    }
}

//! Chunked transfer encoding support
//!
//! This module provides stream adapters for HTTP chunked transfer encoding:
//! [`ChunkedReader`] strips the framing from an incoming body and
//! [`ChunkedWriter`] adds it to an outgoing one.

use super::parser::read_line;
use super::{Error, Result, CRLF, MAX_LINE_LENGTH};
use log::trace;
use std::io::{self, BufRead, Cursor, Read, Write};

/// Chunked decoder
///
/// Reads a chunked body from the wrapped reader and yields the payload
/// bytes. After the terminating zero-size chunk and its trailers, every
/// read returns end of stream without touching the wrapped reader.
///
/// Framing errors surface as [`io::ErrorKind::InvalidData`] carrying
/// [`Error::InvalidFormat`]; converting the I/O error back with
/// [`Error::from`] recovers it.
pub struct ChunkedReader<R: BufRead> {
    reader: R,
    remaining: u64,
    eos: bool,
}

impl<R: BufRead> ChunkedReader<R> {
    /// Create a new chunked decoder
    pub fn new(reader: R) -> Self {
        ChunkedReader {
            reader,
            remaining: 0,
            eos: false,
        }
    }

    /// Whether the terminating chunk has been consumed
    pub fn is_complete(&self) -> bool {
        self.eos
    }

    /// Consume the decoder and return the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn next_line(&mut self) -> io::Result<String> {
        read_line(&mut self.reader, MAX_LINE_LENGTH)?
            .ok_or_else(|| io::ErrorKind::UnexpectedEof.into())
    }

    /// Read the next chunk-size line; `Ok(0)` is the last chunk
    fn read_chunk_size(&mut self) -> io::Result<u64> {
        let line = self.next_line()?;
        let digits = line
            .split(|c: char| c == ' ' || c == ';')
            .next()
            .unwrap_or("");
        if digits.is_empty() {
            return Err(Error::InvalidFormat("empty chunk size line".to_string()).into());
        }
        if digits.len() > 16 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidFormat(format!("invalid chunk size: {}", digits)).into());
        }

        let size = u64::from_str_radix(digits, 16)
            .map_err(|_| Error::InvalidFormat(format!("invalid chunk size: {}", digits)))?;
        trace!("chunk size {}", size);
        Ok(size)
    }

    fn skip_trailers(&mut self) -> io::Result<()> {
        while let Some(line) = read_line(&mut self.reader, MAX_LINE_LENGTH)? {
            if line.is_empty() {
                break;
            }
            trace!("skipping chunk trailer: {}", line);
        }
        Ok(())
    }
}

impl<R: BufRead> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.eos || buf.is_empty() {
            return Ok(0);
        }

        if self.remaining == 0 {
            let size = self.read_chunk_size()?;
            if size == 0 {
                self.skip_trailers()?;
                self.eos = true;
                return Ok(0);
            }
            self.remaining = size;
        }

        let max = (buf.len() as u64).min(self.remaining) as usize;
        let n = self.reader.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        self.remaining -= n as u64;

        if self.remaining == 0 {
            let mut crlf = [0u8; 2];
            self.reader.read_exact(&mut crlf)?;
            if &crlf != b"\r\n" {
                return Err(Error::InvalidFormat("missing CRLF after chunk data".to_string()).into());
            }
        }

        Ok(n)
    }
}

/// Chunked encoder
///
/// Each non-empty `write` emits exactly one chunk. Call [`finish`] to
/// write the terminating zero-size chunk.
///
/// [`finish`]: ChunkedWriter::finish
pub struct ChunkedWriter<W: Write> {
    writer: W,
}

impl<W: Write> ChunkedWriter<W> {
    /// Create a new chunked encoder
    pub fn new(writer: W) -> Self {
        ChunkedWriter { writer }
    }

    /// Write the final chunk, flush, and return the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        write!(self.writer, "0{}{}", CRLF, CRLF)?;
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Get a reference to the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Get a mutable reference to the underlying writer
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

impl<W: Write> Write for ChunkedWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        write!(self.writer, "{:x}{}", data.len(), CRLF)?;
        self.writer.write_all(data)?;
        self.writer.write_all(CRLF.as_bytes())?;

        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Decode complete chunked body from bytes
pub fn decode_chunked_body(input: &[u8]) -> Result<Vec<u8>> {
    let mut reader = ChunkedReader::new(Cursor::new(input));
    let mut output = Vec::new();
    reader.read_to_end(&mut output)?;
    Ok(output)
}

/// Encode data as chunked body
pub fn encode_chunked_body(data: &[u8], chunk_size: usize) -> Result<Vec<u8>> {
    let mut encoder = ChunkedWriter::new(Vec::new());

    for chunk in data.chunks(chunk_size.max(1)) {
        encoder.write_all(chunk)?;
    }

    Ok(encoder.finish()?)
}

//! HTTP message parsing
//!
//! This module parses request and status lines and reads complete message
//! heads (start line plus header block) from a buffered stream. Bodies are
//! left in the stream for the caller to attach as an entity.

use super::header_names::HOST;
use super::{
    Error, Headers, HttpRequest, HttpResponse, HttpUrl, Method, Result, Status, Version,
    DEFAULT_HTTP_PORT,
};
use log::debug;
use std::io::{BufRead, Read};
use std::net::SocketAddr;

/// Read one line, without its `\r\n` or `\n` terminator
///
/// Returns `Ok(None)` at end of stream when nothing was read. A final line
/// without a terminator is returned as is. Lines longer than `max_length`
/// fail with [`Error::InvalidFormat`]. Bytes are decoded as lossy UTF-8.
pub(crate) fn read_line<R: BufRead>(reader: &mut R, max_length: usize) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let limit = max_length as u64 + 2;
    let n = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;

    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if n as u64 == limit {
        return Err(Error::InvalidFormat(format!(
            "line exceeds {} bytes",
            max_length
        )));
    }

    if buf.len() > max_length {
        return Err(Error::InvalidFormat(format!(
            "line exceeds {} bytes",
            max_length
        )));
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Parse HTTP request line
///
/// Format: METHOD TARGET VERSION
/// Example: GET /index.html HTTP/1.1
///
/// The line is split at its first two spaces, so the target cannot contain
/// a space but the protocol field is taken verbatim. Unknown methods and
/// protocols are kept as given.
pub fn parse_request_line(line: &str) -> Result<(Method, String, Version)> {
    let (method, rest) = line
        .split_once(' ')
        .ok_or_else(|| Error::InvalidRequestLine(line.to_string()))?;
    let (target, protocol) = rest
        .split_once(' ')
        .ok_or_else(|| Error::InvalidRequestLine(line.to_string()))?;

    let method = Method::from_str(method)?;
    let version = Version::from_str(protocol)?;

    Ok((method, target.to_string(), version))
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON
/// Example: HTTP/1.1 200 OK
///
/// The status field must be exactly three characters wide. A missing
/// reason phrase is replaced by the canonical one.
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let (protocol, rest) = line
        .split_once(' ')
        .ok_or_else(|| Error::InvalidResponseLine(line.to_string()))?;
    let (code, reason) = match rest.split_once(' ') {
        Some((code, reason)) => (code, Some(reason)),
        None => (rest, None),
    };

    if code.len() != 3 {
        return Err(Error::InvalidResponseLine(line.to_string()));
    }

    let version = Version::from_str(protocol)?;
    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|code| Status::new(code).ok())
        .ok_or_else(|| Error::InvalidResponseLine(line.to_string()))?;
    let reason = match reason {
        Some(reason) => reason.to_string(),
        None => status.reason_phrase().to_string(),
    };

    Ok((version, status, reason))
}

/// Read a request head from a stream
///
/// An absolute `http://` target is used as the request URL (proxy style).
/// Otherwise the target is a path on port 80 and the host comes from the
/// `Host` header, the local endpoint or `localhost`, in that order.
pub fn parse_request<R: BufRead>(
    reader: &mut R,
    local_address: Option<SocketAddr>,
) -> Result<HttpRequest> {
    let line = read_line(reader, super::MAX_LINE_LENGTH)?.ok_or(Error::ConnectionClosed)?;
    debug!("request line: {}", line);

    let (method, target, version) = parse_request_line(&line)?;
    let headers = Headers::parse(reader)?;

    let is_absolute = target
        .get(..7)
        .map_or(false, |scheme| scheme.eq_ignore_ascii_case("http://"));
    let url = if is_absolute {
        HttpUrl::parse(&target)?
    } else {
        let mut url = HttpUrl::from_parts("localhost", DEFAULT_HTTP_PORT, &target);
        if let Some(host) = headers.get(HOST) {
            url.set_host(host);
        } else if let Some(local) = local_address {
            url.set_host(&local.to_string());
        }
        url
    };

    let mut request = HttpRequest::with_url(method, url);
    request.set_version(version);
    *request.headers_mut() = headers;
    Ok(request)
}

/// Read a response head from a stream
pub fn parse_response<R: BufRead>(reader: &mut R) -> Result<HttpResponse> {
    let line = read_line(reader, super::MAX_LINE_LENGTH)?.ok_or(Error::ConnectionClosed)?;
    debug!("status line: {}", line);

    let (version, status, reason) = parse_status_line(&line)?;
    let headers = Headers::parse(reader)?;

    let mut response = HttpResponse::new(status);
    response.set_version(version);
    response.set_status(status, reason);
    *response.headers_mut() = headers;
    Ok(response)
}

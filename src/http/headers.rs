//! HTTP headers handling
//!
//! This module provides an ordered header table with case-insensitive
//! lookups, tolerant parsing of folded header lines and wire emission.

use super::parser::read_line;
use super::{Result, CRLF, MAX_LINE_LENGTH};
use log::trace;
use std::fmt;
use std::io::{self, BufRead, Write};

/// HTTP headers collection
///
/// Headers are stored in insertion order and support:
/// - Case-insensitive header name lookups (first match wins)
/// - Multiple values for the same header name
/// - Emission in table order, without sorting or deduplication
///
/// A header with an empty name is never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    /// Create a new empty headers collection
    pub fn new() -> Self {
        Headers {
            headers: Vec::new(),
        }
    }

    /// Parse header lines from a stream until an empty line
    ///
    /// Lines starting with a space or tab continue the previous header.
    /// Lines without a colon are dropped. End of stream also ends the
    /// header block; only I/O errors are reported.
    pub fn parse<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mut headers = Headers::new();
        let mut pending: Option<(String, String)> = None;

        while let Some(line) = read_line(reader, MAX_LINE_LENGTH)? {
            if line.is_empty() {
                break;
            }

            let first = line.as_bytes()[0];
            if first == b' ' || first == b'\t' {
                if let Some((_, value)) = pending.as_mut() {
                    // folded header
                    value.push_str(line.trim_start_matches(|c: char| c == ' ' || c == '\t'));
                    continue;
                }
            }

            if let Some((name, value)) = pending.take() {
                trace!("header - {}: {}", name, value.trim());
                headers.add(name, value.trim());
            }

            match Self::parse_header_line(&line) {
                Some((name, value)) => pending = Some((name, value)),
                None => trace!("ignoring malformed header line: {}", line),
            }
        }

        if let Some((name, value)) = pending.take() {
            trace!("header - {}: {}", name, value.trim());
            headers.add(name, value.trim());
        }

        Ok(headers)
    }

    /// Split a header line into name and untrimmed value
    ///
    /// The value starts at the first non-whitespace character after the
    /// colon. Returns `None` when there is no colon or the name is empty.
    pub fn parse_header_line(line: &str) -> Option<(String, String)> {
        let colon_pos = line.find(':')?;
        if colon_pos == 0 {
            return None;
        }
        let name = line[..colon_pos].to_string();
        let value = line[colon_pos + 1..]
            .trim_start_matches(|c: char| c == ' ' || c == '\t')
            .to_string();
        Some((name, value))
    }

    /// Write each header as `Name: Value\r\n` in table order
    pub fn emit<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        for (name, value) in &self.headers {
            write!(writer, "{}: {}{}", name, value, CRLF)?;
        }
        Ok(())
    }

    /// Append a header, keeping any existing header with the same name
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if name.is_empty() {
            return;
        }
        self.headers.push((name, value.into()));
    }

    /// Set a header
    ///
    /// If no header with this name exists it is appended. Otherwise the
    /// first match is overwritten when `replace` is true and left alone
    /// when it is false, which is how defaults are applied without
    /// overriding a caller-supplied value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>, replace: bool) {
        let name = name.into();
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => {
                if replace {
                    *existing = value.into();
                }
            }
            None => self.add(name, value),
        }
    }

    /// Get the first value for a header (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get all values for a header (case-insensitive)
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Check if a header exists
    pub fn contains(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Remove all instances of a header (case-insensitive)
    pub fn remove(&mut self, name: &str) -> usize {
        let initial_len = self.headers.len();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        initial_len - self.headers.len()
    }

    /// Get the number of headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Clear all headers
    pub fn clear(&mut self) {
        self.headers.clear();
    }

    /// Iterate over all headers
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            write!(f, "{}: {}{}", name, value, CRLF)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}

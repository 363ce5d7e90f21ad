//! Raw HTTP/1.1 response parsing.
//!
//! # Design
//! The parser is intentionally literal. It splits at the first blank line,
//! keeps everything after it as the body (no Content-Length truncation, no
//! dechunking), and folds header values the simple way: the text after the
//! first colon is split on every colon and rejoined with single spaces. A
//! value such as `12:30:00` therefore reads back as `12 30 00`. Callers
//! talking to arbitrary servers should keep that in mind.

use crate::error::{Error, Result};
use crate::http::HeaderMap;

const HEADER_END: &[u8] = b"\r\n\r\n";

/// A parsed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    version: String,
    status_code: u16,
    reason: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    /// Parse the complete bytes read from a connection.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = match find(raw, HEADER_END) {
            Some(pos) => (&raw[..pos], &raw[pos + HEADER_END.len()..]),
            None => (raw, &[][..]),
        };
        let head = String::from_utf8_lossy(head);
        let mut lines = head.split("\r\n");

        let start_line = lines.next().unwrap_or_default();
        let mut details = start_line.split(' ');
        let version = details.next().unwrap_or_default().to_string();
        let status = details.next().unwrap_or_default();
        let status_code = status
            .parse::<u16>()
            .map_err(|_| Error::MalformedResponse(format!("bad status line `{start_line}`")))?;
        let reason = details.collect::<Vec<_>>().join(" ");

        let mut headers = HeaderMap::new();
        for line in lines {
            let mut pieces = line.split(':');
            let name = pieces.next().unwrap_or_default();
            let value = pieces.collect::<Vec<_>>().join(" ");
            headers.append(name, value.trim());
        }

        Ok(Self {
            version,
            status_code,
            reason,
            headers,
            body: body.to_vec(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_ignore_case(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

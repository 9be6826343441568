//! Status report for the network collaborator
//!
//! `GET /sensors` answers `gas_value,ir_value,alarm_flag\n` as plain text;
//! the page served at `GET /` polls it and splits on commas, so the field
//! order is fixed. Until the first cycle publishes, `/sensors` answers
//! `503` rather than a zeroed line that would read as "safe". Only the
//! request line is looked at, and every response closes the connection.

use core::fmt::Write;

use heapless::String;

use crate::snapshot::SensorSnapshot;

pub const INDEX_PATH: &str = "/";
pub const STATUS_PATH: &str = "/sensors";

/// Embedded status page
pub const INDEX_HTML: &str = include_str!("status_page.html");

/// Longest status line: `65535,65535,1\n`
pub const STATUS_LINE_CAPACITY: usize = 16;

/// Room for the status line plus all response headers
pub const RESPONSE_HEAD_CAPACITY: usize = 192;

/// Format `gas,ir,flag\n`.
pub fn status_line(snapshot: &SensorSnapshot) -> String<STATUS_LINE_CAPACITY> {
    let mut line = String::new();
    // Cannot overflow: three numbers of at most 5 digits plus separators
    let _ = writeln!(
        line,
        "{},{},{}",
        snapshot.gas_value,
        snapshot.ir_value,
        if snapshot.alarm_active { '1' } else { '0' }
    );
    line
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    Status,
    NotFound,
    MethodNotAllowed,
    BadRequest,
}

impl Route {
    /// Pick the route for a raw request. Query strings are ignored.
    pub fn from_request(request: &[u8]) -> Self {
        let Some((method, path)) = parse_request_line(request) else {
            return Self::BadRequest;
        };
        let path = path.split_once('?').map_or(path, |(path, _)| path);

        match (method, path) {
            ("GET", INDEX_PATH) => Self::Index,
            ("GET", STATUS_PATH) => Self::Status,
            ("GET", _) => Self::NotFound,
            _ => Self::MethodNotAllowed,
        }
    }
}

/// Method and path of the first request line, if it is well formed.
pub fn parse_request_line(request: &[u8]) -> Option<(&str, &str)> {
    let end = request
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(request.len());
    let line = core::str::from_utf8(&request[..end]).ok()?;

    let mut parts = line.split(' ');
    let method = parts.next().filter(|m| !m.is_empty())?;
    let path = parts.next().filter(|p| p.starts_with('/'))?;
    parts.next().filter(|v| v.starts_with("HTTP/"))?;

    Some((method, path))
}

pub enum Body {
    Static(&'static str),
    Status(String<STATUS_LINE_CAPACITY>),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Static(text) => text.as_bytes(),
            Self::Status(line) => line.as_bytes(),
        }
    }
}

pub struct Response {
    pub status: &'static str,
    pub content_type: &'static str,
    pub body: Body,
    /// Milliseconds since the snapshot behind a status response was taken
    pub sample_age_ms: Option<u64>,
}

impl Response {
    /// Build the response to `request` from the latest snapshot.
    pub fn for_request(request: &[u8], snapshot: &SensorSnapshot, now_ms: u64) -> Self {
        match Route::from_request(request) {
            Route::Index => Self::text("200 OK", "text/html; charset=utf-8", INDEX_HTML),
            Route::Status if !snapshot.is_published() => {
                Self::text("503 Service Unavailable", "text/plain", "No reading yet\n")
            }
            Route::Status => Self {
                status: "200 OK",
                content_type: "text/plain",
                body: Body::Status(status_line(snapshot)),
                sample_age_ms: snapshot.age_ms(now_ms),
            },
            Route::NotFound => Self::text("404 Not Found", "text/plain", "Not Found\n"),
            Route::MethodNotAllowed => {
                Self::text("405 Method Not Allowed", "text/plain", "Method Not Allowed\n")
            }
            Route::BadRequest => Self::text("400 Bad Request", "text/plain", "Bad Request\n"),
        }
    }

    const fn text(status: &'static str, content_type: &'static str, body: &'static str) -> Self {
        Self {
            status,
            content_type,
            body: Body::Static(body),
            sample_age_ms: None,
        }
    }

    /// Status line and headers, terminated by the blank line.
    pub fn head(&self) -> String<RESPONSE_HEAD_CAPACITY> {
        let mut head = String::new();
        // Longest status, content type and header values fit the capacity
        let _ = write!(
            head,
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
             Cache-Control: no-store\r\nConnection: close\r\n",
            self.status,
            self.content_type,
            self.body.as_bytes().len()
        );
        if let Some(age) = self.sample_age_ms {
            let _ = write!(head, "X-Sample-Age-Ms: {}\r\n", age);
        }
        let _ = head.push_str("\r\n");
        head
    }
}

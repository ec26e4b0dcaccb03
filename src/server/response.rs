use dashmap::DashMap;
use may_minihttp::Response;
use once_cell::sync::Lazy;
use tracing::{error, warn};

use crate::dispatcher::{HandlerResponse, HeaderVec};

/// Upper bound on distinct interned header lines.
const MAX_HEADER_LINES: usize = 4096;

/// `may_minihttp` only accepts `&'static str` header lines; each distinct
/// line is leaked once and reused afterwards.
static HEADER_LINES: Lazy<DashMap<String, &'static str>> = Lazy::new(DashMap::new);

/// `None` once [`MAX_HEADER_LINES`] distinct lines have been leaked.
fn intern_header_line(name: &str, value: &str) -> Option<&'static str> {
    let line = format!("{name}: {value}");
    if let Some(existing) = HEADER_LINES.get(&line) {
        return Some(*existing);
    }
    if HEADER_LINES.len() >= MAX_HEADER_LINES {
        return None;
    }
    Some(
        *HEADER_LINES
            .entry(line.clone())
            .or_insert_with(|| Box::leak(line.into_boxed_str())),
    )
}

fn write_headers(res: &mut Response, headers: &HeaderVec) {
    for (name, value) in headers {
        match intern_header_line(name, value) {
            Some(line) => {
                res.header(line);
            }
            None => warn!(header = %name, "Header line cache full; header dropped"),
        }
    }
}

pub(crate) fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        s if s < 300 => "OK",
        s if s < 500 => "Bad Request",
        _ => "Internal Server Error",
    }
}

/// Write a handler response: headers as given, text bodies raw, everything
/// else as JSON. 204 responses carry no body.
pub fn write_handler_response(res: &mut Response, hr: HandlerResponse) {
    res.status_code(hr.status as usize, status_reason(hr.status));

    let is_text = hr.is_text();
    write_headers(res, &hr.headers);

    if hr.status == 204 {
        return;
    }
    if hr.get_header("content-type").is_none() {
        res.header("Content-Type: application/json");
    }

    match hr.body {
        serde_json::Value::String(text) if is_text => {
            res.body_vec(text.into_bytes());
        }
        body => match serde_json::to_vec(&body) {
            Ok(bytes) => {
                res.body_vec(bytes);
            }
            Err(e) => {
                error!(error = %e, "Failed to serialize response body");
                res.status_code(500, status_reason(500));
                res.body_vec(br#"{"error":"Something went wrong!"}"#.to_vec());
            }
        },
    }
}

/// Write raw bytes with the given headers, used for static files.
pub fn write_bytes(res: &mut Response, status: u16, headers: &HeaderVec, bytes: Vec<u8>) {
    res.status_code(status as usize, status_reason(status));
    write_headers(res, headers);
    res.body_vec(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(204), "No Content");
        assert_eq!(status_reason(403), "Forbidden");
        assert_eq!(status_reason(503), "Service Unavailable");
        assert_eq!(status_reason(418), "Bad Request");
    }

    #[test]
    fn header_lines_are_interned() {
        let a = intern_header_line("vary", "Origin");
        let b = intern_header_line("vary", "Origin");
        assert_eq!(a, Some("vary: Origin"));
        assert!(std::ptr::eq(a.unwrap(), b.unwrap()));
    }
}

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use may_minihttp::Request;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::dispatcher::HeaderVec;
use crate::router::ParamVec;

/// Why a request body could not be turned into JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyError {
    Unreadable(String),
    MalformedJson(String),
}

impl fmt::Display for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyError::Unreadable(e) => write!(f, "request body could not be read: {e}"),
            BodyError::MalformedJson(e) => write!(f, "malformed JSON body: {e}"),
        }
    }
}

impl std::error::Error for BodyError {}

/// Request data extracted once per connection call by `AppService`.
#[derive(Debug, PartialEq)]
pub struct ParsedRequest {
    pub method: String,
    /// Path without the query string
    pub path: String,
    /// Lower-cased names, in arrival order
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub query_params: ParamVec,
    /// `Ok(None)` for an empty body
    pub body: Result<Option<Value>, BodyError>,
}

impl ParsedRequest {
    #[inline]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Split the `cookie` header into name/value pairs.
pub fn parse_cookies(headers: &HeaderVec) -> HeaderVec {
    headers
        .iter()
        .filter(|(k, _)| k.as_ref() == "cookie")
        .flat_map(|(_, v)| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=').unwrap_or((pair.trim(), ""));
            if name.is_empty() {
                return None;
            }
            Some((Arc::from(name.trim()), value.trim().to_string()))
        })
        .collect()
}

/// Decode everything after `?` in `raw_path`, keeping repeats in order.
pub fn parse_query_params(raw_path: &str) -> ParamVec {
    match raw_path.split_once('?') {
        Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
            .collect(),
        None => ParamVec::new(),
    }
}

/// Turn a raw body into JSON.
///
/// `application/json` and `+json` types are parsed as JSON.
/// `application/x-www-form-urlencoded` becomes an object of strings, where a
/// repeated key collects its values into an array. Any other content type,
/// or none at all, is treated as no body.
pub fn parse_body(content_type: Option<&str>, bytes: &[u8]) -> Result<Option<Value>, BodyError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let Some(kind) = content_type.map(BodyKind::of) else {
        return Ok(None);
    };
    match kind {
        BodyKind::Json => serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|e| BodyError::MalformedJson(e.to_string())),
        BodyKind::Form => Ok(Some(parse_form(bytes))),
        BodyKind::Other => Ok(None),
    }
}

/// How a request body is interpreted, by its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Other,
}

impl BodyKind {
    fn of(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == "application/json" || essence.ends_with("+json") {
            BodyKind::Json
        } else if essence == "application/x-www-form-urlencoded" {
            BodyKind::Form
        } else {
            BodyKind::Other
        }
    }
}

fn parse_form(bytes: &[u8]) -> Value {
    let mut object = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match object.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(object)
}

/// Extract method, path, headers, cookies, query and body from a request.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase()),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();
    debug!(header_count = headers.len(), "Headers extracted");

    let cookies = parse_cookies(&headers);
    let query_params = parse_query_params(&raw_path);
    debug!(
        cookie_count = cookies.len(),
        param_count = query_params.len(),
        "Cookies and query params parsed"
    );

    let content_type = headers
        .iter()
        .find(|(k, _)| k.as_ref() == "content-type")
        .map(|(_, v)| v.clone());
    let mut bytes = Vec::new();
    let body = match req.body().read_to_end(&mut bytes) {
        Ok(size) => {
            if size > 0 {
                debug!(
                    body_size_bytes = size,
                    content_type = ?content_type,
                    "Request body read"
                );
            }
            parse_body(content_type.as_deref(), &bytes)
        }
        Err(e) => Err(BodyError::Unreadable(e.to_string())),
    };

    info!(method = %method, path = %path, "HTTP request parsed");

    ParsedRequest {
        method,
        path,
        headers,
        cookies,
        query_params,
        body,
    }
}

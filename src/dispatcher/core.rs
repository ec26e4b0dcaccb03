//! Dispatcher core: hot path for request dispatch.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::unnecessary_to_owned)]

use crate::ids::RequestId;
use crate::router::{ParamVec, RouteMatch};
use crate::runtime_config::RuntimeConfig;
use http::Method;
use may::coroutine;
use may::sync::mpsc;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::middleware::Middleware;

/// Maximum inline headers/cookies before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header/cookie storage; names are lower-cased on parse.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Request data passed to a handler coroutine.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Request path as received, without the query string
    pub path: String,
    pub handler_name: Arc<str>,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    /// JSON or urlencoded body converted to JSON
    pub body: Option<Value>,
    /// Claims produced by the security provider for protected operations,
    /// e.g. `{"id": 1, "timestamp": 1700000000000}` for a mock bearer token.
    pub claims: Option<Value>,
    /// Channel for sending the response back to the dispatcher
    pub reply_tx: mpsc::Sender<HandlerResponse>,
}

impl HandlerRequest {
    /// Last occurrence wins when a name repeats.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Last occurrence wins, so `?brand=a&brand=b` yields `b`.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive header lookup.
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Send the reply; a closed channel only means the client is gone.
    pub fn respond(&self, response: HandlerResponse) {
        if self.reply_tx.send(response).is_err() {
            warn!(
                request_id = %self.request_id,
                handler_name = %self.handler_name,
                "Reply channel closed before response was sent"
            );
        }
    }
}

/// Response data sent back from a handler coroutine.
///
/// A `Value::String` body with a `text/plain` content type is written as raw
/// text; every other body is serialized as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with `content-type: application/json`.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Plain text response, used by the terminal-friendly messaging routes.
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((
            Arc::from("content-type"),
            "text/plain; charset=utf-8".to_string(),
        ));
        Self {
            status,
            headers,
            body: Value::String(body.into()),
        }
    }

    /// `{"error": message}`, the envelope of the entrypoint's own failures.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive).
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        self.body.is_string()
            && self
                .get_header("content-type")
                .is_some_and(|ct| ct.starts_with("text/"))
    }
}

/// Channel sender feeding one handler coroutine
pub type HandlerSender = mpsc::Sender<HandlerRequest>;

/// Routes requests to handler coroutines registered by name.
#[derive(Clone, Default)]
pub struct Dispatcher {
    pub handlers: HashMap<String, HandlerSender>,
    /// Applied in insertion order
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the sender for `handler_name`.
    ///
    /// Replacing drops the old sender, which closes its channel and lets the old
    /// coroutine exit.
    pub fn add_route(&mut self, handler_name: &str, sender: HandlerSender) {
        if self.handlers.insert(handler_name.to_string(), sender).is_some() {
            warn!(
                handler_name = %handler_name,
                total_handlers = self.handlers.len(),
                "Replaced existing handler - old coroutine will exit"
            );
        } else {
            info!(
                handler_name = %handler_name,
                total_handlers = self.handlers.len(),
                "Handler registered"
            );
        }
    }

    /// Append a middleware; hooks run in insertion order.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Whether a handler is registered under `name`.
    #[must_use]
    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Spawn a coroutine that feeds every request for `name` to `handler_fn`.
    ///
    /// Panics inside the handler become a 500 reply. The handler must send
    /// exactly one response per request.
    ///
    /// # Safety
    ///
    /// Calls `may::coroutine::Builder::spawn`, which is unsafe in the `may`
    /// runtime. The runtime must be configured before this is called.
    pub unsafe fn register_handler<F>(&mut self, name: &str, handler_fn: F)
    where
        F: Fn(HandlerRequest) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<HandlerRequest>();
        let handler_name = name.to_string();
        let stack_size = RuntimeConfig::from_env().stack_size;

        // SAFETY: the handler is Send + 'static and the runtime is configured at startup.
        let spawn_result = unsafe {
            coroutine::Builder::new()
                .name(handler_name.clone())
                .stack_size(stack_size)
                .spawn(move || {
                    debug!(stack_size = stack_size, "Handler coroutine start");

                    for req in rx.iter() {
                        let reply_tx = req.reply_tx.clone();
                        let handler_name = Arc::clone(&req.handler_name);
                        let request_id = req.request_id;
                        let execution_start = Instant::now();

                        if let Err(panic) =
                            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                handler_fn(req);
                            }))
                        {
                            let panic_message = panic
                                .downcast_ref::<&str>()
                                .map(|s| (*s).to_string())
                                .or_else(|| panic.downcast_ref::<String>().cloned())
                                .unwrap_or_else(|| "unknown panic".to_string());
                            error!(
                                request_id = %request_id,
                                handler_name = %handler_name,
                                panic_message = %panic_message,
                                "Handler panicked"
                            );
                            if reply_tx
                                .send(HandlerResponse::error(500, "Something went wrong!"))
                                .is_err()
                            {
                                debug!(request_id = %request_id, "Client gone after handler panic");
                            }
                        } else {
                            debug!(
                                request_id = %request_id,
                                handler_name = %handler_name,
                                execution_time_ms = execution_start.elapsed().as_millis() as u64,
                                "Handler execution complete"
                            );
                        }
                    }
                })
        };

        if let Err(e) = spawn_result {
            error!(
                handler_name = %name,
                error = %e,
                stack_size = stack_size,
                "Failed to spawn handler coroutine"
            );
            return;
        }

        self.add_route(name, tx);
    }

    /// Dispatch a matched request and wait for the handler's reply.
    ///
    /// Returns `None` if no handler is registered for the route. Middleware
    /// `before` hooks may answer early; `after` hooks always run.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch(
        &self,
        request_id: RequestId,
        path: &str,
        route_match: RouteMatch,
        body: Option<Value>,
        headers: HeaderVec,
        cookies: HeaderVec,
        claims: Option<Value>,
    ) -> Option<HandlerResponse> {
        let Some(tx) = self.handlers.get(route_match.handler_name.as_ref()) else {
            error!(
                request_id = %request_id,
                handler_name = %route_match.handler_name,
                available_handlers = self.handlers.len(),
                "Handler not found"
            );
            return None;
        };

        let (reply_tx, reply_rx) = mpsc::channel();
        let request = HandlerRequest {
            request_id,
            method: route_match.route.method.clone(),
            path: path.to_string(),
            handler_name: route_match.handler_name,
            path_params: route_match.path_params,
            query_params: route_match.query_params,
            headers,
            cookies,
            body,
            claims,
            reply_tx,
        };

        let mut early_resp: Option<HandlerResponse> = None;
        for mw in &self.middlewares {
            let resp = mw.before(&request);
            if early_resp.is_none() {
                early_resp = resp;
            }
        }

        let (mut resp, latency) = if let Some(r) = early_resp {
            debug!(request_id = %request_id, status = r.status, "Middleware answered early");
            (r, Duration::ZERO)
        } else {
            let start = Instant::now();
            if let Err(e) = tx.send(request.clone()) {
                error!(
                    request_id = %request_id,
                    handler_name = %request.handler_name,
                    error = %e,
                    "Failed to send request to handler"
                );
                return None;
            }

            // may's mpsc has no recv_timeout; handlers always reply or panic
            let r = match reply_rx.recv() {
                Ok(response) => response,
                Err(e) => {
                    error!(
                        request_id = %request_id,
                        handler_name = %request.handler_name,
                        error = %e,
                        "Handler channel closed without a reply"
                    );
                    HandlerResponse::error(503, "Service unavailable")
                }
            };
            (r, start.elapsed())
        };

        for mw in &self.middlewares {
            mw.after(&request, &mut resp, latency);
        }

        Some(resp)
    }
}

use crate::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse};
use crate::error::ApiError;
use crate::ids::RequestId;
use crate::router::ParamVec;
use crate::runtime_config::RuntimeConfig;
use http::Method;
use may::sync::mpsc;
use serde::Serialize;
use serde_json::Value;
use std::convert::TryFrom;
use std::sync::Arc;
use tracing::{error, warn};

/// Trait implemented by typed coroutine handlers.
///
/// The raw [`HandlerRequest`] is converted into `Self::Request` with
/// `TryFrom`; a conversion failure is answered with the returned
/// [`ApiError`] without calling the handler.
pub trait Handler: Send + 'static {
    type Request: TryFrom<HandlerRequest, Error = ApiError> + Send + 'static;
    type Response: IntoHandlerResponse + Send + 'static;

    fn handle(&self, req: TypedHandlerRequest<Self::Request>) -> Self::Response;
}

/// Conversion of a handler's return value into the wire response.
pub trait IntoHandlerResponse {
    fn into_handler_response(self) -> HandlerResponse;
}

impl IntoHandlerResponse for HandlerResponse {
    fn into_handler_response(self) -> HandlerResponse {
        self
    }
}

impl IntoHandlerResponse for ApiError {
    fn into_handler_response(self) -> HandlerResponse {
        self.into_response()
    }
}

impl<T, E> IntoHandlerResponse for Result<T, E>
where
    T: IntoHandlerResponse,
    E: IntoHandlerResponse,
{
    fn into_handler_response(self) -> HandlerResponse {
        match self {
            Ok(ok) => ok.into_handler_response(),
            Err(err) => err.into_handler_response(),
        }
    }
}

/// Serializable body with an explicit status.
#[derive(Debug, Clone)]
pub struct Json<T>(pub u16, pub T);

impl<T> Json<T> {
    pub fn ok(body: T) -> Self {
        Json(200, body)
    }

    pub fn created(body: T) -> Self {
        Json(201, body)
    }
}

impl<T: Serialize> IntoHandlerResponse for Json<T> {
    fn into_handler_response(self) -> HandlerResponse {
        match serde_json::to_value(self.1) {
            Ok(body) => HandlerResponse::json(self.0, body),
            Err(e) => {
                error!(error = %e, "Failed to serialize handler response");
                HandlerResponse::error(500, "Something went wrong!")
            }
        }
    }
}

/// Plain-text body with an explicit status.
#[derive(Debug, Clone)]
pub struct Text(pub u16, pub String);

impl IntoHandlerResponse for Text {
    fn into_handler_response(self) -> HandlerResponse {
        HandlerResponse::text(self.0, self.1)
    }
}

/// Typed request data passed to a [`Handler`].
#[derive(Debug, Clone)]
pub struct TypedHandlerRequest<T> {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub handler_name: Arc<str>,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    /// Claims attached by the security provider, if the operation is protected
    pub claims: Option<Value>,
    pub data: T,
}

impl<T> TypedHandlerRequest<T> {
    /// Build a typed request from the raw one and already converted data.
    pub fn from_parts(req: HandlerRequest, data: T) -> Self {
        TypedHandlerRequest {
            request_id: req.request_id,
            method: req.method,
            path: req.path,
            handler_name: req.handler_name,
            path_params: req.path_params,
            query_params: req.query_params,
            claims: req.claims,
            data,
        }
    }
}

/// Spawn a typed handler coroutine and return the sender feeding it.
///
/// # Safety
///
/// Spawns a `may` coroutine; the runtime must be configured first.
pub unsafe fn spawn_typed<H>(handler: H) -> std::io::Result<mpsc::Sender<HandlerRequest>>
where
    H: Handler + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<HandlerRequest>();

    // SAFETY: the handler is Send + 'static; see the function contract.
    unsafe {
        may::coroutine::Builder::new()
            .stack_size(RuntimeConfig::from_env().stack_size)
            .spawn(move || {
                let handler = handler;
                for req in rx.iter() {
                    let reply_tx = req.reply_tx.clone();
                    let request_id = req.request_id;
                    let handler_name = Arc::clone(&req.handler_name);

                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        match H::Request::try_from(req.clone()) {
                            Ok(data) => handler
                                .handle(TypedHandlerRequest::from_parts(req, data))
                                .into_handler_response(),
                            Err(err) => {
                                warn!(
                                    request_id = %request_id,
                                    handler_name = %handler_name,
                                    status = err.status,
                                    error = %err.message,
                                    "Request rejected during conversion"
                                );
                                err.into_response()
                            }
                        }
                    }));

                    let response = match result {
                        Ok(response) => response,
                        Err(_) => {
                            error!(
                                request_id = %request_id,
                                handler_name = %handler_name,
                                "Typed handler panicked"
                            );
                            HandlerResponse::error(500, "Something went wrong!")
                        }
                    };
                    if reply_tx.send(response).is_err() {
                        warn!(request_id = %request_id, "Reply channel closed");
                    }
                }
            })?;
    }

    Ok(tx)
}

impl Dispatcher {
    /// Register a typed handler under `name`.
    ///
    /// # Safety
    ///
    /// Same contract as [`spawn_typed`].
    pub unsafe fn register_typed<H>(&mut self, name: &str, handler: H)
    where
        H: Handler + Send + 'static,
    {
        match unsafe { spawn_typed(handler) } {
            Ok(tx) => self.add_route(name, tx),
            Err(e) => error!(handler_name = %name, error = %e, "Failed to spawn typed handler"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_picks_the_right_side() {
        let ok: Result<Json<Value>, ApiError> = Ok(Json::created(json!({"id": 3})));
        let resp = ok.into_handler_response();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.get_header("content-type"), Some("application/json"));

        let err: Result<Json<Value>, ApiError> = Err(ApiError::not_found("nope"));
        let resp = err.into_handler_response();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, json!({"success": false, "error": "nope"}));
    }

    #[test]
    fn text_sets_plain_content_type() {
        let resp = Text(503, "down".into()).into_handler_response();
        assert!(resp.is_text());
        assert_eq!(resp.status, 503);
    }
}

//! Route handlers, one typed controller per OpenAPI `operationId`.
//!
//! Each controller owns `Arc`s to the state it touches and runs in its own
//! coroutine (see [`crate::registry`]). Request types implement
//! `TryFrom<HandlerRequest>`; their conversion errors are answered without
//! reaching the controller.

pub mod auth;
pub mod catalog;
pub mod messaging;
pub mod orders;

use serde_json::{json, Value};

use crate::dispatcher::HandlerRequest;
use crate::error::ApiError;

/// No input beyond the route itself.
#[derive(Debug, Clone, Copy)]
pub struct NoInput;

impl TryFrom<HandlerRequest> for NoInput {
    type Error = ApiError;

    fn try_from(_req: HandlerRequest) -> Result<Self, ApiError> {
        Ok(NoInput)
    }
}

/// The request body, `{}` when none was sent.
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

impl TryFrom<HandlerRequest> for JsonBody {
    type Error = ApiError;

    fn try_from(req: HandlerRequest) -> Result<Self, ApiError> {
        Ok(JsonBody(req.body.unwrap_or_else(|| json!({}))))
    }
}

/// Non-empty string field of a JSON body.
pub(crate) fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

use http::Method;
use serde_json::Value;
use std::sync::Arc;

pub use oas3::spec::{SecurityRequirement, SecurityScheme};

/// Everything the server needs to know about one OpenAPI operation.
#[derive(Debug, Clone)]
pub struct RouteMeta {
    pub method: Method,
    /// Path relative to the base path, e.g. `/computer-items/{id}`
    pub path_pattern: Arc<str>,
    /// `operationId` (or `x-handler`) naming the registered handler
    pub handler_name: Arc<str>,
    /// First server URL path, e.g. `/api`
    pub base_path: String,
    pub summary: Option<String>,
    /// `application/json` request body schema with `$ref`s expanded
    pub request_schema: Option<Value>,
    pub request_body_required: bool,
    /// Operation security, falling back to the document-level requirement
    pub security: Vec<SecurityRequirement>,
}

impl RouteMeta {
    /// Full path including the base path.
    pub fn full_path(&self) -> String {
        format!("{}{}", self.base_path, self.path_pattern)
    }

    /// Whether any security requirement is attached.
    pub fn is_protected(&self) -> bool {
        self.security.iter().any(|req| !req.0.is_empty())
    }
}

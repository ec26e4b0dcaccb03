//! Error types and their HTTP envelopes.
//!
//! Domain failures are plain enums ([`StoreError`], [`MessagingError`]).
//! Handlers turn them into an [`ApiError`], which knows which of the API's
//! response envelopes to produce:
//!
//! | style         | body                                              |
//! |---------------|---------------------------------------------------|
//! | `Plain`       | `{"success": false, "error": msg}`                |
//! | `Timestamped` | `{"success": false, "error": msg, "timestamp": …}` |
//! | `Text`        | `❌ Error: msg` as `text/plain`                   |
//! | `Bare`        | `{"error": msg}`                                  |

use std::fmt;

use serde_json::{json, Map, Value};

use crate::clock;
use crate::dispatcher::HandlerResponse;

/// Failures of the in-memory catalog and user directory.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    ItemNotFound,
    MissingItemFields,
    /// A merge left the item with an ill-typed field
    InvalidItem(String),
    UserNotFound,
    MissingRegistrationFields,
    DuplicateUser,
    MissingCredentials,
    InvalidCredentials,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ItemNotFound => write!(f, "Computer item not found"),
            StoreError::MissingItemFields => {
                write!(f, "Please provide name, category, price, and brand")
            }
            StoreError::InvalidItem(reason) => write!(f, "Invalid computer item: {reason}"),
            StoreError::UserNotFound => write!(f, "User not found"),
            StoreError::MissingRegistrationFields => {
                write!(f, "Please provide username, email, and password")
            }
            StoreError::DuplicateUser => write!(f, "Username or email already exists"),
            StoreError::MissingCredentials => write!(f, "Please provide username and password"),
            StoreError::InvalidCredentials => write!(f, "Invalid credentials"),
        }
    }
}

impl std::error::Error for StoreError {}

impl StoreError {
    /// HTTP status the failure is answered with.
    pub fn status(&self) -> u16 {
        match self {
            StoreError::ItemNotFound | StoreError::UserNotFound => 404,
            StoreError::InvalidCredentials => 401,
            _ => 400,
        }
    }
}

/// Failures of the messaging adapter and its gateway client.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagingError {
    /// No session, or the session has not reached `ready`
    NotReady,
    /// The gateway could not be reached
    Transport(String),
    /// The gateway answered with a non-success status
    Gateway { status: u16, body: String },
    /// The gateway answered with something we could not interpret
    InvalidResponse(String),
}

impl fmt::Display for MessagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagingError::NotReady => write!(f, "WhatsApp client is not ready"),
            MessagingError::Transport(e) => write!(f, "WhatsApp gateway unreachable: {e}"),
            MessagingError::Gateway { status, body } => {
                write!(f, "WhatsApp gateway returned {status}: {body}")
            }
            MessagingError::InvalidResponse(e) => {
                write!(f, "Unexpected WhatsApp gateway response: {e}")
            }
        }
    }
}

impl std::error::Error for MessagingError {}

impl From<reqwest::Error> for MessagingError {
    fn from(err: reqwest::Error) -> Self {
        MessagingError::Transport(err.to_string())
    }
}

/// Which envelope an [`ApiError`] is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStyle {
    Plain,
    Timestamped,
    Text,
    Bare,
}

/// An HTTP-ready error: status, message and envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    pub style: ErrorStyle,
    pub details: Option<Value>,
}

impl ApiError {
    /// An error in the plain `{success: false, error}` envelope.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            style: ErrorStyle::Plain,
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// Switch to the `{success, error, timestamp}` envelope.
    pub fn timestamped(mut self) -> Self {
        self.style = ErrorStyle::Timestamped;
        self
    }

    /// Switch to the plain-text `❌ Error:` body.
    pub fn text(mut self) -> Self {
        self.style = ErrorStyle::Text;
        self
    }

    /// Switch to the `{error}` envelope used outside the resource routes.
    pub fn bare(mut self) -> Self {
        self.style = ErrorStyle::Bare;
        self
    }

    /// Attach a `details` field, e.g. schema validation messages.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Render into the envelope chosen by `style`.
    pub fn into_response(self) -> HandlerResponse {
        match self.style {
            ErrorStyle::Text => {
                HandlerResponse::text(self.status, format!("❌ Error: {}", self.message))
            }
            ErrorStyle::Bare => HandlerResponse::error(self.status, &self.message),
            ErrorStyle::Plain | ErrorStyle::Timestamped => {
                let mut body = Map::new();
                body.insert("success".into(), Value::Bool(false));
                body.insert("error".into(), Value::String(self.message));
                if let Some(details) = self.details {
                    body.insert("details".into(), details);
                }
                if self.style == ErrorStyle::Timestamped {
                    body.insert("timestamp".into(), json!(clock::now_iso()));
                }
                HandlerResponse::json(self.status, Value::Object(body))
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::new(err.status(), err.to_string())
    }
}

impl From<MessagingError> for ApiError {
    fn from(err: MessagingError) -> Self {
        ApiError::internal(err.to_string()).timestamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_plain_envelope() {
        let resp = ApiError::from(StoreError::ItemNotFound).into_response();
        assert_eq!(resp.status, 404);
        assert_eq!(
            resp.body,
            json!({"success": false, "error": "Computer item not found"})
        );
    }

    #[test]
    fn messaging_errors_are_timestamped() {
        let resp = ApiError::from(MessagingError::NotReady).into_response();
        assert_eq!(resp.status, 500);
        assert_eq!(resp.body["error"], "WhatsApp client is not ready");
        assert!(resp.body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn text_errors_render_as_plain_text() {
        let resp = ApiError::from(MessagingError::NotReady).text().into_response();
        assert!(resp.is_text());
        assert_eq!(resp.body, json!("❌ Error: WhatsApp client is not ready"));
    }

    #[test]
    fn details_are_attached() {
        let resp = ApiError::bad_request("Request validation failed")
            .with_details(json!(["missing product"]))
            .into_response();
        assert_eq!(resp.body["details"], json!(["missing product"]));
    }
}

//! Authentication for operations that carry an OpenAPI `security` requirement.
//!
//! The service collects credentials into a [`SecurityRequest`] and asks the
//! [`SecurityProvider`] registered under each scheme name. A provider either
//! returns the claims handed to the handler or the [`ApiError`] sent back to
//! the client.
//!
//! The store only ships [`MockTokenProvider`], which accepts the tokens that
//! `POST /api/auth/login` issues (`mock-jwt-token-<millis>`). Tokens are not
//! signed.

use serde_json::{json, Value};
use tracing::debug;

use crate::dispatcher::HeaderVec;
use crate::error::ApiError;
use crate::router::ParamVec;
use crate::spec::SecurityScheme;
use crate::store::parse_int_prefix;

/// Credentials of one request, borrowed from the parsed request.
pub struct SecurityRequest<'a> {
    pub headers: &'a HeaderVec,
    pub query: &'a ParamVec,
    pub cookies: &'a HeaderVec,
}

impl<'a> SecurityRequest<'a> {
    /// Case-insensitive header lookup.
    #[inline]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn get_query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Validates credentials for one security scheme.
pub trait SecurityProvider: Send + Sync {
    /// Check `req` against `scheme` and return the caller's claims.
    ///
    /// `scopes` are the scopes listed by the operation's requirement.
    fn validate(
        &self,
        scheme: &SecurityScheme,
        scopes: &[String],
        req: &SecurityRequest,
    ) -> Result<Value, ApiError>;
}

/// Prefix of the tokens issued by the login route.
pub const MOCK_TOKEN_PREFIX: &str = "mock-jwt-token-";

/// Accepts `Authorization: Bearer mock-jwt-token-<millis>`.
///
/// - no token → 401 `Access token required`
/// - token without the mock prefix → 403 `Invalid token`
/// - otherwise the claims are `{"id": 1, "timestamp": <millis or null>}`
#[derive(Debug, Default, Clone, Copy)]
pub struct MockTokenProvider;

impl MockTokenProvider {
    pub fn new() -> Self {
        Self
    }

    /// The second space-separated part of the `Authorization` header.
    fn extract_token<'a>(req: &'a SecurityRequest) -> Option<&'a str> {
        req.get_header("authorization")
            .and_then(|h| h.split(' ').nth(1))
            .filter(|t| !t.is_empty())
    }

    /// Claims for a token issued by the login route.
    pub fn claims_for(token: &str) -> Option<Value> {
        let stamp = token.strip_prefix(MOCK_TOKEN_PREFIX)?;
        let timestamp = parse_int_prefix(stamp).map_or(Value::Null, Value::from);
        Some(json!({ "id": 1, "timestamp": timestamp }))
    }
}

/// Whether `scheme` is an HTTP bearer scheme.
pub fn is_bearer(scheme: &SecurityScheme) -> bool {
    matches!(scheme, SecurityScheme::Http { scheme, .. } if scheme.eq_ignore_ascii_case("bearer"))
}

impl SecurityProvider for MockTokenProvider {
    fn validate(
        &self,
        scheme: &SecurityScheme,
        _scopes: &[String],
        req: &SecurityRequest,
    ) -> Result<Value, ApiError> {
        if !is_bearer(scheme) {
            debug!("Mock token provider asked to validate a non-bearer scheme");
            return Err(ApiError::forbidden("Invalid token"));
        }
        let Some(token) = Self::extract_token(req) else {
            debug!("Bearer token missing");
            return Err(ApiError::unauthorized("Access token required"));
        };
        Self::claims_for(token).ok_or_else(|| {
            debug!("Bearer token without mock prefix");
            ApiError::forbidden("Invalid token")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn bearer() -> SecurityScheme {
        SecurityScheme::Http {
            scheme: "bearer".to_string(),
            bearer_format: None,
            description: None,
        }
    }

    fn check(authorization: Option<&str>) -> Result<Value, ApiError> {
        let mut headers = HeaderVec::new();
        if let Some(value) = authorization {
            headers.push((Arc::from("authorization"), value.to_string()));
        }
        let query = ParamVec::new();
        let cookies = HeaderVec::new();
        let req = SecurityRequest {
            headers: &headers,
            query: &query,
            cookies: &cookies,
        };
        MockTokenProvider.validate(&bearer(), &[], &req)
    }

    #[test]
    fn missing_token_is_401() {
        assert_eq!(check(None).unwrap_err().status, 401);
        assert_eq!(check(Some("Bearer")).unwrap_err().status, 401);
        let err = check(Some("Bearer  mock-jwt-token-1")).unwrap_err();
        assert_eq!(err.message, "Access token required");
    }

    #[test]
    fn foreign_token_is_403() {
        let err = check(Some("Bearer abc.def.ghi")).unwrap_err();
        assert_eq!(err.status, 403);
        assert_eq!(err.message, "Invalid token");
    }

    #[test]
    fn mock_token_yields_claims() {
        let claims = check(Some("Bearer mock-jwt-token-1700000000000")).unwrap();
        assert_eq!(claims, json!({"id": 1, "timestamp": 1700000000000_i64}));

        let claims = check(Some("Bearer mock-jwt-token-12ab")).unwrap();
        assert_eq!(claims["timestamp"], json!(12));

        let claims = check(Some("Bearer mock-jwt-token-")).unwrap();
        assert_eq!(claims["timestamp"], Value::Null);
    }
}

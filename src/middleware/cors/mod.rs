//! Cross-origin resource sharing for the store API.
//!
//! The storefront is usually opened from a different origin than the API, so
//! the default policy ([`CorsMiddleware::permissive`]) allows every origin.
//! Deployments that need a closed list configure one through
//! [`CorsMiddlewareBuilder`] from the `cors` section of the config file.
//!
//! The service asks the policy for two things: the answer to an `OPTIONS`
//! preflight ([`CorsMiddleware::preflight`]) and the headers to add to every
//! other response ([`CorsMiddleware::decorate`]).

mod builder;
mod error;

pub use builder::CorsMiddlewareBuilder;
pub use error::CorsConfigError;

use http::Method;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::dispatcher::{HandlerResponse, HeaderVec};

/// How the `Origin` header is matched.
#[derive(Clone)]
pub enum OriginValidation {
    Exact(Vec<String>),
    /// Any origin; answered with `*`
    Wildcard,
    Regex(Vec<Regex>),
}

impl std::fmt::Debug for OriginValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginValidation::Exact(origins) => f.debug_tuple("Exact").field(origins).finish(),
            OriginValidation::Wildcard => write!(f, "Wildcard"),
            OriginValidation::Regex(patterns) => f
                .debug_tuple("Regex")
                .field(&patterns.iter().map(|re| re.as_str()).collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl OriginValidation {
    fn is_allowed(&self, origin: &str) -> bool {
        match self {
            OriginValidation::Exact(origins) => origins.iter().any(|o| o == origin),
            OriginValidation::Wildcard => true,
            OriginValidation::Regex(patterns) => patterns.iter().any(|re| re.is_match(origin)),
        }
    }
}

/// The CORS policy applied by the HTTP service.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    pub(crate) origin_validation: OriginValidation,
    pub(crate) allowed_headers: Vec<String>,
    pub(crate) allowed_methods: Vec<Method>,
    pub(crate) allow_credentials: bool,
    pub(crate) expose_headers: Vec<String>,
    pub(crate) max_age: Option<u32>,
}

impl CorsMiddleware {
    /// Any origin, any requested header, the verbs the API serves.
    pub fn permissive() -> Self {
        Self {
            origin_validation: OriginValidation::Wildcard,
            allowed_headers: vec!["*".into()],
            allowed_methods: vec![
                Method::GET,
                Method::HEAD,
                Method::PUT,
                Method::PATCH,
                Method::POST,
                Method::DELETE,
            ],
            allow_credentials: false,
            expose_headers: vec![],
            max_age: None,
        }
    }

    pub fn origin_validation(&self) -> &OriginValidation {
        &self.origin_validation
    }

    /// The value for `access-control-allow-origin`, or `None` when the
    /// origin is refused. Requests without an `Origin` only get `*`.
    fn allow_origin_value(&self, origin: Option<&str>) -> Option<String> {
        match (&self.origin_validation, origin) {
            (OriginValidation::Wildcard, _) => Some("*".to_string()),
            (validation, Some(origin)) if validation.is_allowed(origin) => {
                Some(origin.to_string())
            }
            _ => None,
        }
    }

    /// Answer an `OPTIONS` preflight.
    ///
    /// 204 with the allow headers on success; 403 when the origin, the
    /// requested method or one of the requested headers is not allowed.
    pub fn preflight(
        &self,
        origin: Option<&str>,
        requested_method: Option<&str>,
        requested_headers: Option<&str>,
    ) -> HandlerResponse {
        let Some(allow_origin) = self.allow_origin_value(origin) else {
            warn!(origin = ?origin, "CORS preflight from disallowed origin");
            return HandlerResponse::error(403, "CORS origin not allowed");
        };

        if let Some(method) = requested_method {
            let allowed = method
                .parse::<Method>()
                .map(|m| self.allowed_methods.contains(&m))
                .unwrap_or(false);
            if !allowed {
                warn!(method = %method, "CORS preflight: method not allowed");
                return HandlerResponse::error(403, "CORS method not allowed");
            }
        }

        let reflect_headers = self.allowed_headers.iter().any(|h| h == "*");
        if !reflect_headers {
            for header in requested_headers
                .into_iter()
                .flat_map(|h| h.split(','))
                .map(str::trim)
                .filter(|h| !h.is_empty())
            {
                if !self
                    .allowed_headers
                    .iter()
                    .any(|h| h.eq_ignore_ascii_case(header))
                {
                    warn!(header = %header, "CORS preflight: header not allowed");
                    return HandlerResponse::error(403, "CORS header not allowed");
                }
            }
        }

        let mut res = HandlerResponse::new(204, HeaderVec::new(), Value::Null);
        res.set_header("access-control-allow-origin", allow_origin);
        res.set_header(
            "access-control-allow-methods",
            self.allowed_methods
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(","),
        );
        let allow_headers = if reflect_headers {
            requested_headers.unwrap_or_default().to_string()
        } else {
            self.allowed_headers.join(",")
        };
        if !allow_headers.is_empty() {
            res.set_header("access-control-allow-headers", allow_headers);
        }
        if self.allow_credentials {
            res.set_header("access-control-allow-credentials", "true".to_string());
        }
        if let Some(age) = self.max_age {
            res.set_header("access-control-max-age", age.to_string());
        }
        let vary = if reflect_headers {
            "Origin, Access-Control-Request-Headers"
        } else {
            "Origin"
        };
        res.set_header("vary", vary.to_string());

        debug!(origin = ?origin, "CORS preflight accepted");
        res
    }

    /// Add the CORS response headers for a non-preflight request.
    ///
    /// A refused origin gets no `access-control-*` headers, which makes the
    /// browser drop the response.
    pub fn decorate(&self, origin: Option<&str>, res: &mut HandlerResponse) {
        res.set_header("vary", "Origin".to_string());
        let Some(allow_origin) = self.allow_origin_value(origin) else {
            if origin.is_some() {
                debug!(origin = ?origin, "Origin not allowed; CORS headers omitted");
            }
            return;
        };
        res.set_header("access-control-allow-origin", allow_origin);
        if self.allow_credentials {
            res.set_header("access-control-allow-credentials", "true".to_string());
        }
        if !self.expose_headers.is_empty() {
            res.set_header(
                "access-control-expose-headers",
                self.expose_headers.join(", "),
            );
        }
    }
}

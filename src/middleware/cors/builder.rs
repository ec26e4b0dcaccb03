use http::Method;
use regex::Regex;

use super::{CorsConfigError, CorsMiddleware, OriginValidation};

/// Fluent construction of a [`CorsMiddleware`] from configured values.
///
/// ```rust,ignore
/// use computer_store::middleware::CorsMiddlewareBuilder;
/// use http::Method;
///
/// let cors = CorsMiddlewareBuilder::new()
///     .allowed_origins(&["https://shop.example.com", "https://*.example.org"])
///     .allowed_methods(&[Method::GET, Method::POST])
///     .allow_credentials(true)
///     .max_age(600)
///     .build()?;
/// ```
///
/// Origins may be exact (`https://shop.example.com`), the wildcard `*`, or a
/// subdomain wildcard (`https://*.example.org`). Raw regular expressions go
/// through [`CorsMiddlewareBuilder::origin_patterns`].
pub struct CorsMiddlewareBuilder {
    allowed_origins: Vec<String>,
    origin_patterns: Vec<String>,
    allowed_headers: Vec<String>,
    allowed_methods: Vec<Method>,
    allow_credentials: bool,
    expose_headers: Vec<String>,
    max_age: Option<u32>,
}

impl CorsMiddlewareBuilder {
    /// No origins, `Content-Type`/`Authorization` headers and the usual verbs.
    pub fn new() -> Self {
        Self {
            allowed_origins: vec![],
            origin_patterns: vec![],
            allowed_headers: vec!["Content-Type".into(), "Authorization".into()],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allow_credentials: false,
            expose_headers: vec![],
            max_age: None,
        }
    }

    pub fn allowed_origins<S: AsRef<str>>(mut self, origins: &[S]) -> Self {
        self.allowed_origins = origins.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Regular expressions matched against the whole `Origin` header.
    pub fn origin_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.origin_patterns = patterns.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn allowed_methods(mut self, methods: &[Method]) -> Self {
        self.allowed_methods = methods.to_vec();
        self
    }

    /// `*` echoes whatever the preflight asks for.
    pub fn allowed_headers<S: AsRef<str>>(mut self, headers: &[S]) -> Self {
        self.allowed_headers = headers.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    pub fn expose_headers<S: AsRef<str>>(mut self, headers: &[S]) -> Self {
        self.expose_headers = headers.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Preflight cache duration in seconds.
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Validate the settings and compile the origin matchers.
    ///
    /// # Errors
    ///
    /// - [`CorsConfigError::WildcardWithCredentials`] for `*` with credentials
    /// - [`CorsConfigError::EmptyOriginsWithCredentials`] for credentials without origins
    /// - [`CorsConfigError::InvalidOriginFormat`] for origins that are not `scheme://host[:port]`
    /// - [`CorsConfigError::InvalidPattern`] for patterns that do not compile
    pub fn build(self) -> Result<CorsMiddleware, CorsConfigError> {
        let wildcard = self.allowed_origins.iter().any(|o| o == "*");
        if self.allow_credentials && wildcard {
            return Err(CorsConfigError::WildcardWithCredentials);
        }
        if self.allow_credentials
            && self.allowed_origins.is_empty()
            && self.origin_patterns.is_empty()
        {
            return Err(CorsConfigError::EmptyOriginsWithCredentials);
        }

        let origin_validation = if wildcard {
            OriginValidation::Wildcard
        } else {
            let mut exact = Vec::new();
            let mut patterns = Vec::new();
            for origin in &self.allowed_origins {
                let (scheme, host) = split_origin(origin)?;
                match host.strip_prefix("*.") {
                    Some(domain) => patterns.push(compile(&format!(
                        r"^{}://([A-Za-z0-9-]+\.)+{}$",
                        regex::escape(scheme),
                        regex::escape(domain)
                    ))?),
                    None => exact.push(origin.clone()),
                }
            }
            for pattern in &self.origin_patterns {
                patterns.push(compile(pattern)?);
            }

            if patterns.is_empty() {
                OriginValidation::Exact(exact)
            } else {
                for origin in &exact {
                    patterns.push(compile(&format!("^{}$", regex::escape(origin)))?);
                }
                OriginValidation::Regex(patterns)
            }
        };

        Ok(CorsMiddleware {
            origin_validation,
            allowed_headers: self.allowed_headers,
            allowed_methods: self.allowed_methods,
            allow_credentials: self.allow_credentials,
            expose_headers: self.expose_headers,
            max_age: self.max_age,
        })
    }
}

impl Default for CorsMiddlewareBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn split_origin(origin: &str) -> Result<(&str, &str), CorsConfigError> {
    let invalid = || CorsConfigError::InvalidOriginFormat {
        origin: origin.to_string(),
    };
    let (scheme, host) = origin.split_once("://").ok_or_else(invalid)?;
    if scheme.is_empty()
        || !scheme.chars().all(|c| c.is_ascii_alphabetic())
        || host.is_empty()
        || host.contains('/')
    {
        return Err(invalid());
    }
    Ok((scheme, host))
}

fn compile(pattern: &str) -> Result<Regex, CorsConfigError> {
    Regex::new(pattern).map_err(|e| CorsConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

use std::fmt;

/// Rejected CORS settings, returned by [`super::CorsMiddlewareBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsConfigError {
    /// `*` together with `allow_credentials: true`
    WildcardWithCredentials,
    /// Credentials enabled but no origin configured
    EmptyOriginsWithCredentials,
    /// Origin is not `scheme://host[:port]`
    InvalidOriginFormat { origin: String },
    /// Origin pattern failed to compile
    InvalidPattern { pattern: String, reason: String },
}

impl fmt::Display for CorsConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorsConfigError::WildcardWithCredentials => write!(
                f,
                "CORS configuration error: wildcard origin (*) cannot be combined with credentials"
            ),
            CorsConfigError::EmptyOriginsWithCredentials => write!(
                f,
                "CORS configuration error: credentials require at least one allowed origin"
            ),
            CorsConfigError::InvalidOriginFormat { origin } => write!(
                f,
                "CORS configuration error: invalid origin '{origin}', expected scheme://host[:port]"
            ),
            CorsConfigError::InvalidPattern { pattern, reason } => write!(
                f,
                "CORS configuration error: invalid origin pattern '{pattern}': {reason}"
            ),
        }
    }
}

impl std::error::Error for CorsConfigError {}

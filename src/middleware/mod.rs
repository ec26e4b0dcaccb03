//! Request middleware.
//!
//! [`Middleware`] hooks run around every dispatched handler call. CORS is a
//! policy object the service consults for every response, including the ones
//! that never reach a handler.

mod core;
mod cors;
mod metrics;
mod tracing;

pub use core::Middleware;
pub use cors::{CorsConfigError, CorsMiddleware, CorsMiddlewareBuilder, OriginValidation};
pub use metrics::MetricsMiddleware;
pub use tracing::TracingMiddleware;

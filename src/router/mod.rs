//! # Router
//!
//! Matches incoming requests to the operations of the OpenAPI document.
//!
//! Routes are inserted into a radix tree under their full path (server base
//! path plus the OpenAPI path). Matching yields the [`RouteMeta`](crate::spec::RouteMeta)
//! plus the extracted `{param}` values; query parameters are attached later by
//! the server.

mod core;
mod radix;

pub use core::{ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS};

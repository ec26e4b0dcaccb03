//! OpenAPI document loading.
//!
//! The route table of the service lives in `doc/openapi.yaml`. Each
//! operation becomes a [`RouteMeta`] whose `operationId` names the handler
//! coroutine registered in [`crate::registry`].

mod build;
mod load;
mod types;

pub use build::{build_routes, expand_schema_refs, extract_security_schemes};
pub use load::{load_spec, load_spec_from_str, SpecBundle};
pub use types::*;

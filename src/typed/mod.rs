//! # Typed Handlers
//!
//! Type-safe request handling on top of the raw dispatcher.
//!
//! A handler declares a request type implementing
//! `TryFrom<HandlerRequest, Error = ApiError>` and a response type
//! implementing [`IntoHandlerResponse`]. Conversion failures never reach the
//! handler; they are answered with the [`ApiError`](crate::error::ApiError)
//! the conversion produced, so each route keeps its own validation messages.
//!
//! ```rust,ignore
//! struct GetItem { id: String }
//!
//! impl TryFrom<HandlerRequest> for GetItem {
//!     type Error = ApiError;
//!     fn try_from(req: HandlerRequest) -> Result<Self, ApiError> {
//!         Ok(GetItem { id: req.get_path_param("id").unwrap_or_default().to_string() })
//!     }
//! }
//!
//! impl Handler for GetItemController {
//!     type Request = GetItem;
//!     type Response = Result<Json<Value>, ApiError>;
//!     fn handle(&self, req: TypedHandlerRequest<GetItem>) -> Self::Response { … }
//! }
//! ```

mod core;

pub use core::*;

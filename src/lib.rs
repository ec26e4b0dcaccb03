//! # Computer Item Store
//!
//! An OpenAPI-driven HTTP service for a small computer shop, running on the
//! `may` coroutine runtime and `may_minihttp`.
//!
//! ## Overview
//!
//! The service exposes:
//!
//! - an in-memory catalog of computer items (`/api/computer-items`)
//! - mock user registration, login and profiles (`/api/auth`)
//! - order submission that relays a formatted message to a fixed phone
//!   number (`/api/orders`)
//! - a control surface for the WhatsApp messaging adapter (`/api/whatsapp`)
//! - the storefront under `static_site/`
//!
//! Routes, request schemas and security requirements come from
//! `doc/openapi.yaml`; every `operationId` maps to a typed handler registered
//! in [`registry`].
//!
//! ## Architecture
//!
//! - **[`spec`]** - OpenAPI loading and route metadata
//! - **[`router`]** - Radix tree path matching
//! - **[`dispatcher`]** - Coroutine-based handler dispatch
//! - **[`typed`]** - Typed handler traits and response helpers
//! - **[`server`]** - `may_minihttp` service, request parsing and response writing
//! - **[`middleware`]** - CORS, metrics and tracing
//! - **[`security`]** - Mock bearer token provider
//! - **[`store`]** - Catalog and user directory
//! - **[`orders`]** - Order payloads and the notification text
//! - **[`messaging`]** - Messaging adapter, gateway client and text reports
//! - **[`handlers`]** - Controllers behind each operation
//! - **[`config`]** / **[`logging`]** - YAML configuration and `tracing` setup
//! - **[`app`]** - Wiring of state, service and server
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Service as AppService
//!     participant Router
//!     participant Security as MockTokenProvider
//!     participant Dispatcher
//!     participant Handler as Handler coroutine
//!
//!     Client->>Service: HTTP request
//!     Service->>Router: route(method, path)
//!     Router-->>Service: RouteMatch
//!     Service->>Security: validate(bearer token)
//!     Security-->>Service: claims
//!     Service->>Dispatcher: dispatch(route_match, body, claims)
//!     Dispatcher->>Handler: HandlerRequest
//!     Handler-->>Dispatcher: HandlerResponse
//!     Dispatcher-->>Service: HandlerResponse
//!     Service-->>Client: HTTP response + CORS headers
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cargo run -- serve --config config/config.yaml
//! curl http://localhost:3060/api/computer-items?category=Laptop
//! ```

pub mod app;
pub mod cli;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod logging;
pub mod messaging;
pub mod middleware;
pub mod orders;
pub mod registry;
pub mod router;
pub mod runtime_config;
pub mod security;
pub mod server;
pub mod spec;
pub mod static_files;
pub mod store;
pub mod typed;

pub use app::AppState;
pub use config::AppConfig;
pub use error::{ApiError, MessagingError, StoreError};
pub use security::{MockTokenProvider, SecurityProvider, SecurityRequest};
pub use spec::{
    load_spec, load_spec_from_str, RouteMeta, SecurityRequirement, SecurityScheme, SpecBundle,
};

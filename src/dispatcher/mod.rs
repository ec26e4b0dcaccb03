//! # Dispatcher
//!
//! Coroutine-based handler dispatch.
//!
//! Every operation of the OpenAPI document is served by a named handler
//! running in its own `may` coroutine. The service thread sends a
//! [`HandlerRequest`] down the handler's channel and blocks on a one-shot
//! reply channel for the [`HandlerResponse`].
//!
//! ## Request Flow
//!
//! 1. Router matches the request and yields the handler name
//! 2. Middleware `before` hooks run (and may answer early)
//! 3. Request is sent to the handler coroutine
//! 4. Handler replies on `reply_tx`
//! 5. Middleware `after` hooks see the response and latency
//!
//! ## Error Handling
//!
//! - Missing handlers make `dispatch` return `None` (the service answers 500)
//! - Handler panics are caught and answered with 500
//! - A handler whose coroutine died answers 503
//!
//! Stack size comes from `STORE_STACK_SIZE`, see [`crate::runtime_config`].

mod core;

pub use core::{
    Dispatcher, HandlerRequest, HandlerResponse, HandlerSender, HeaderVec, MAX_INLINE_HEADERS,
};

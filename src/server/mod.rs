//! HTTP front end: request parsing, the store service and the server handle.

mod http_server;
mod request;
mod response;
mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_body, parse_cookies, parse_query_params, BodyError, ParsedRequest};
pub use service::AppService;

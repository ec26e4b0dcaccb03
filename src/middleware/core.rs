use std::time::Duration;

use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// Hook around handler dispatch.
///
/// `before` may answer the request itself by returning a response; the
/// handler is then skipped. `after` sees every response together with the
/// handler latency (zero for early answers).
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &HandlerRequest) -> Option<HandlerResponse> {
        None
    }
    fn after(&self, _req: &HandlerRequest, _res: &mut HandlerResponse, _latency: Duration) {}
}

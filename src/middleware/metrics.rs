use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::Middleware;
use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// Prometheus-style counters for the store API.
///
/// Dispatched requests are counted by the middleware hooks. Requests that
/// never reach a handler (static files, `/api/health`, 404s) are recorded
/// through [`MetricsMiddleware::inc_top_level_request`].
#[derive(Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    client_errors: AtomicUsize,
    server_errors: AtomicUsize,
    total_latency_ns: AtomicU64,
    top_level_requests: AtomicUsize,
    auth_failures: AtomicUsize,
    stack_size: AtomicUsize,
}

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// `(4xx, 5xx)` responses seen by the dispatcher
    pub fn error_counts(&self) -> (usize, usize) {
        (
            self.client_errors.load(Ordering::Relaxed),
            self.server_errors.load(Ordering::Relaxed),
        )
    }

    /// Mean handler latency; zero before the first request.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Count a request answered without a handler.
    pub fn inc_top_level_request(&self) {
        self.top_level_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn top_level_request_count(&self) -> usize {
        self.top_level_requests.load(Ordering::Relaxed)
    }

    /// Count a request rejected by a security provider.
    pub fn inc_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auth_failures(&self) -> usize {
        self.auth_failures.load(Ordering::Relaxed)
    }

    /// Prometheus text exposition of every counter.
    pub fn render(&self) -> String {
        let (client_errors, server_errors) = self.error_counts();
        let stack_size = match self.stack_size.load(Ordering::Relaxed) {
            0 => may::config().get_stack_size(),
            n => n,
        };
        let mut out = String::with_capacity(1024);
        let mut metric = |name: &str, kind: &str, help: &str, value: String| {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {value}\n"
            ));
        };
        metric(
            "store_requests_total",
            "counter",
            "Requests dispatched to handlers",
            self.request_count().to_string(),
        );
        metric(
            "store_client_errors_total",
            "counter",
            "Dispatched requests answered with 4xx",
            client_errors.to_string(),
        );
        metric(
            "store_server_errors_total",
            "counter",
            "Dispatched requests answered with 5xx",
            server_errors.to_string(),
        );
        metric(
            "store_request_latency_seconds",
            "gauge",
            "Average handler latency in seconds",
            self.average_latency().as_secs_f64().to_string(),
        );
        metric(
            "store_top_level_requests_total",
            "counter",
            "Requests answered without a handler",
            self.top_level_request_count().to_string(),
        );
        metric(
            "store_auth_failures_total",
            "counter",
            "Rejected bearer tokens",
            self.auth_failures().to_string(),
        );
        metric(
            "store_coroutine_stack_bytes",
            "gauge",
            "Configured coroutine stack size",
            stack_size.to_string(),
        );
        out
    }
}

impl Middleware for MetricsMiddleware {
    fn before(&self, _req: &HandlerRequest) -> Option<HandlerResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(&self, _req: &HandlerRequest, res: &mut HandlerResponse, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        match res.status {
            400..=499 => {
                self.client_errors.fetch_add(1, Ordering::Relaxed);
            }
            500..=599 => {
                self.server_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        if may::coroutine::is_coroutine() {
            let size = may::coroutine::current().stack_size();
            self.stack_size.store(size, Ordering::Relaxed);
        }
    }
}

//! Router core: hot path for request routing.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]

use crate::spec::RouteMeta;
use http::Method;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::radix::RadixRouter;

/// Maximum number of path/query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage.
///
/// Names are `Arc<str>` because they come from the route tree built at startup.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of successfully matching a request path to a route
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteMeta>,
    /// `{id}` → `("id", "123")`
    pub path_params: ParamVec,
    pub handler_name: Arc<str>,
    /// Filled in by the server after matching
    pub query_params: ParamVec,
}

impl RouteMatch {
    /// Last occurrence wins when a name repeats.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Matches requests against the routes of the OpenAPI document.
#[derive(Clone)]
pub struct Router {
    radix_router: RadixRouter,
    routes: Vec<Arc<RouteMeta>>,
}

impl Router {
    #[must_use]
    pub fn new(routes: Vec<RouteMeta>) -> Self {
        let routes: Vec<Arc<RouteMeta>> = routes.into_iter().map(Arc::new).collect();
        let radix_router = RadixRouter::new(&routes);

        let base_path = routes
            .first()
            .map(|r| r.base_path.as_str())
            .unwrap_or_default();
        info!(
            routes_count = routes.len(),
            base_path = %base_path,
            "Routing table loaded"
        );

        Self {
            radix_router,
            routes,
        }
    }

    /// All routes in document order.
    pub fn routes(&self) -> &[Arc<RouteMeta>] {
        &self.routes
    }

    /// `METHOD /full/path -> handler` lines, for `computer-store routes`.
    pub fn describe_routes(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|r| format!("{:<7} {} -> {}", r.method.as_str(), r.full_path(), r.handler_name))
            .collect()
    }

    /// Match an HTTP request to a route.
    #[must_use]
    pub fn route(&self, method: Method, path: &str) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, "Route match attempt");

        let match_start = Instant::now();
        let result = self.radix_router.route(&method, path);
        let match_duration = match_start.elapsed();

        let Some((route, params)) = result else {
            debug!(
                method = %method,
                path = %path,
                duration_us = match_duration.as_micros(),
                "No route matched"
            );
            return None;
        };

        if match_duration > Duration::from_millis(1) {
            warn!(
                method = %method,
                path = %path,
                handler_name = %route.handler_name,
                duration_us = match_duration.as_micros(),
                "Slow route matching detected"
            );
        } else {
            debug!(
                method = %method,
                path = %path,
                handler_name = %route.handler_name,
                route_pattern = %route.path_pattern,
                path_params = ?params,
                "Route matched"
            );
        }

        Some(RouteMatch {
            handler_name: Arc::clone(&route.handler_name),
            route,
            path_params: params,
            query_params: ParamVec::new(),
        })
    }

    /// Methods declared at `path`; reported in the `allow` header of a 404.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        self.radix_router.allowed_methods(path)
    }
}

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use http::Method;
use jsonschema::Validator;
use may_minihttp::{HttpService, Request, Response};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::request::{parse_request, BodyError, ParsedRequest};
use super::response::{write_bytes, write_handler_response};
use crate::clock;
use crate::dispatcher::{Dispatcher, HandlerResponse, HeaderVec};
use crate::error::ApiError;
use crate::ids::RequestId;
use crate::middleware::{CorsMiddleware, MetricsMiddleware};
use crate::router::{RouteMatch, Router};
use crate::security::{SecurityProvider, SecurityRequest};
use crate::spec::{RouteMeta, SecurityScheme};
use crate::static_files::StaticFiles;

/// What a request ends up as: a handler-style response or a static file.
enum Reply {
    Handler(HandlerResponse),
    File {
        content_type: &'static str,
        bytes: Vec<u8>,
    },
}

/// The store's `may_minihttp` service.
///
/// Order of evaluation for each request:
///
/// 1. `OPTIONS` is answered by the CORS policy.
/// 2. A malformed JSON body is rejected.
/// 3. `GET` outside `/api` is looked up in the static directory.
/// 4. `GET /`, `GET /api/health` and `GET /metrics` are answered here.
/// 5. Routed operations go through security, body validation and the
///    dispatcher.
/// 6. Everything else is `404 {"error": "Route not found"}`.
///
/// Every response except the preflight is decorated with CORS headers.
#[derive(Clone)]
pub struct AppService {
    pub router: Arc<Router>,
    pub dispatcher: Arc<Dispatcher>,
    pub security_schemes: HashMap<String, SecurityScheme>,
    pub security_providers: HashMap<String, Arc<dyn SecurityProvider>>,
    pub metrics: Option<Arc<MetricsMiddleware>>,
    pub cors: Arc<CorsMiddleware>,
    pub static_files: Option<StaticFiles>,
    /// Template context for HTML pages
    pub page_context: Value,
    /// Compiled request body schemas keyed by handler name
    validators: Arc<HashMap<String, Validator>>,
    started: Instant,
}

impl AppService {
    /// Build the service and compile every request body schema.
    ///
    /// # Errors
    ///
    /// A request schema in the OpenAPI document that is not a valid JSON Schema.
    pub fn new(
        router: Router,
        dispatcher: Dispatcher,
        security_schemes: HashMap<String, SecurityScheme>,
    ) -> anyhow::Result<Self> {
        let mut validators = HashMap::new();
        for route in router.routes() {
            if let Some(schema) = &route.request_schema {
                let validator = jsonschema::validator_for(schema).map_err(|e| {
                    anyhow::anyhow!(
                        "invalid request schema for {} {}: {e}",
                        route.method,
                        route.full_path()
                    )
                })?;
                validators.insert(route.handler_name.to_string(), validator);
            }
        }
        debug!(validators = validators.len(), "Request schemas compiled");

        Ok(Self {
            router: Arc::new(router),
            dispatcher: Arc::new(dispatcher),
            security_schemes,
            security_providers: HashMap::new(),
            metrics: None,
            cors: Arc::new(CorsMiddleware::permissive()),
            static_files: None,
            page_context: Value::Null,
            validators: Arc::new(validators),
            started: Instant::now(),
        })
    }

    /// Validate requests for the security scheme `name` with `provider`.
    pub fn register_security_provider(&mut self, name: &str, provider: Arc<dyn SecurityProvider>) {
        self.security_providers.insert(name.to_string(), provider);
    }

    pub fn set_metrics_middleware(&mut self, metrics: Arc<MetricsMiddleware>) {
        self.metrics = Some(metrics);
    }

    /// Replace the default permissive CORS policy.
    pub fn set_cors(&mut self, cors: CorsMiddleware) {
        self.cors = Arc::new(cors);
    }

    /// Serve files from `static_files`; HTML pages are rendered with `page_context`.
    pub fn set_static_files(&mut self, static_files: StaticFiles, page_context: Value) {
        self.static_files = Some(static_files);
        self.page_context = page_context;
    }

    fn count_top_level(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_top_level_request();
        }
    }

    fn handle(&self, request_id: RequestId, parsed: ParsedRequest) -> Reply {
        let ParsedRequest {
            method,
            path,
            headers,
            cookies,
            query_params,
            body,
        } = parsed;

        if method == "OPTIONS" {
            self.count_top_level();
            let find = |name: &str| {
                headers
                    .iter()
                    .find(|(k, _)| k.as_ref() == name)
                    .map(|(_, v)| v.as_str())
            };
            return Reply::Handler(self.cors.preflight(
                find("origin"),
                find("access-control-request-method"),
                find("access-control-request-headers"),
            ));
        }

        let body = match body {
            Ok(body) => body,
            Err(e) => {
                self.count_top_level();
                warn!(request_id = %request_id, error = %e, "Rejected request body");
                let message = match e {
                    BodyError::MalformedJson(_) => "Malformed JSON body",
                    BodyError::Unreadable(_) => "Request body could not be read",
                };
                return Reply::Handler(HandlerResponse::error(400, message));
            }
        };

        if method == "GET" && !path.starts_with("/api/") && path != "/metrics" {
            if let Some(reply) = self.static_file(&path) {
                self.count_top_level();
                return reply;
            }
        }

        if method == "GET" {
            let answer = match path.as_str() {
                "/" => Some(HandlerResponse::json(
                    200,
                    json!({
                        "message": "Welcome to Computer Item Store API",
                        "version": "1.0.0",
                        "status": "running"
                    }),
                )),
                "/api/health" => Some(HandlerResponse::json(
                    200,
                    json!({
                        "status": "healthy",
                        "timestamp": clock::now_iso(),
                        "uptime": self.started.elapsed().as_secs_f64()
                    }),
                )),
                "/metrics" => self.metrics.as_ref().map(|metrics| {
                    let mut res = HandlerResponse::text(200, metrics.render());
                    res.set_header("content-type", "text/plain; version=0.0.4".to_string());
                    res
                }),
                _ => None,
            };
            if let Some(res) = answer {
                self.count_top_level();
                return Reply::Handler(res);
            }
        }

        let route_match = method
            .parse::<Method>()
            .ok()
            .and_then(|m| self.router.route(m, &path));
        let Some(mut route_match) = route_match else {
            self.count_top_level();
            let mut res = HandlerResponse::error(404, "Route not found");
            let allowed = self.router.allowed_methods(&path);
            if !allowed.is_empty() {
                debug!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    "Method not served at this path"
                );
                res.set_header(
                    "allow",
                    allowed
                        .iter()
                        .map(Method::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                );
            }
            return Reply::Handler(res);
        };
        route_match.query_params = query_params;

        let claims = if route_match.route.is_protected() {
            let sec_req = SecurityRequest {
                headers: &headers,
                query: &route_match.query_params,
                cookies: &cookies,
            };
            match self.authorize(&route_match.route, &sec_req) {
                Ok(claims) => Some(claims),
                Err(err) => {
                    self.count_top_level();
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_auth_failure();
                    }
                    info!(
                        request_id = %request_id,
                        handler = %route_match.handler_name,
                        status = err.status,
                        "Request rejected by security provider"
                    );
                    return Reply::Handler(err.into_response());
                }
            }
        } else {
            None
        };

        if let Err(err) = self.validate_body(&route_match, body.as_ref()) {
            self.count_top_level();
            return Reply::Handler(err.into_response());
        }

        match self
            .dispatcher
            .dispatch(request_id, &path, route_match, body, headers, cookies, claims)
        {
            Some(res) => Reply::Handler(res),
            None => Reply::Handler(HandlerResponse::error(500, "Something went wrong!")),
        }
    }

    fn static_file(&self, path: &str) -> Option<Reply> {
        let static_files = self.static_files.as_ref()?;
        let ctx = (!self.page_context.is_null()).then_some(&self.page_context);
        match static_files.load(path, ctx) {
            Ok((bytes, content_type)) => Some(Reply::File {
                content_type,
                bytes,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                error!(path = %path, error = %e, "Failed to load static file");
                Some(Reply::Handler(HandlerResponse::error(
                    500,
                    "Something went wrong!",
                )))
            }
        }
    }

    /// Any one requirement passing is enough; within a requirement every
    /// scheme must pass. The first failure is reported.
    fn authorize(&self, route: &RouteMeta, req: &SecurityRequest) -> Result<Value, ApiError> {
        let mut first_error: Option<ApiError> = None;
        for requirement in &route.security {
            let mut claims = Value::Null;
            let mut failed = false;
            for (scheme_name, scopes) in &requirement.0 {
                let provider = self.security_providers.get(scheme_name);
                let scheme = self.security_schemes.get(scheme_name);
                let (Some(provider), Some(scheme)) = (provider, scheme) else {
                    error!(scheme = %scheme_name, "No security provider for scheme");
                    if first_error.is_none() {
                        first_error = Some(ApiError::internal("Something went wrong!").bare());
                    }
                    failed = true;
                    break;
                };
                match provider.validate(scheme, scopes, req) {
                    Ok(value) => claims = value,
                    Err(err) => {
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                        failed = true;
                        break;
                    }
                }
            }
            if !failed {
                return Ok(claims);
            }
        }
        Err(first_error.unwrap_or_else(|| ApiError::unauthorized("Access token required")))
    }

    fn validate_body(
        &self,
        route_match: &RouteMatch,
        body: Option<&Value>,
    ) -> Result<(), ApiError> {
        let route = &route_match.route;
        let Some(body) = body else {
            if route.request_body_required {
                return Err(ApiError::bad_request("Request body is required"));
            }
            return Ok(());
        };
        let Some(validator) = self.validators.get(route.handler_name.as_ref()) else {
            return Ok(());
        };
        let details: Vec<String> = validator.iter_errors(body).map(|e| e.to_string()).collect();
        if details.is_empty() {
            return Ok(());
        }
        debug!(handler = %route.handler_name, errors = ?details, "Request body failed validation");
        Err(ApiError::bad_request("Request validation failed").with_details(json!(details)))
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed = parse_request(req);
        let request_id = RequestId::from_header_or_new(parsed.get_header("x-request-id"));
        let origin = parsed.get_header("origin").map(str::to_owned);
        let is_preflight = parsed.method == "OPTIONS";

        match self.handle(request_id, parsed) {
            Reply::Handler(mut hr) => {
                if !is_preflight {
                    self.cors.decorate(origin.as_deref(), &mut hr);
                }
                write_handler_response(res, hr);
            }
            Reply::File {
                content_type,
                bytes,
            } => {
                let mut carrier = HandlerResponse::new(200, HeaderVec::new(), Value::Null);
                carrier.set_header("content-type", content_type.to_string());
                self.cors.decorate(origin.as_deref(), &mut carrier);
                write_bytes(res, carrier.status, &carrier.headers, bytes);
            }
        }
        Ok(())
    }
}

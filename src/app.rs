//! Application wiring: shared state, the service and server startup.

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dispatcher::Dispatcher;
use crate::messaging::{EvolutionClient, MessagingClient, MessagingService};
use crate::middleware::{MetricsMiddleware, Middleware, TracingMiddleware};
use crate::registry;
use crate::router::Router;
use crate::runtime_config::RuntimeConfig;
use crate::security::{is_bearer, MockTokenProvider};
use crate::server::{AppService, HttpServer, ServerHandle};
use crate::spec::{load_spec, SpecBundle};
use crate::static_files::StaticFiles;
use crate::store::{Catalog, UserDirectory};

/// State shared by the handler coroutines.
pub struct AppState {
    pub config: AppConfig,
    pub catalog: Arc<Catalog>,
    pub users: Arc<UserDirectory>,
    pub messaging: Arc<MessagingService>,
}

impl AppState {
    /// Seeded stores and a messaging service over `client`.
    pub fn new(config: AppConfig, client: Arc<dyn MessagingClient>) -> Self {
        let messaging = MessagingService::new(client, config.messaging.reconnect_delay());
        Self {
            catalog: Arc::new(Catalog::seeded()),
            users: Arc::new(UserDirectory::seeded()),
            messaging,
            config,
        }
    }

    /// State talking to the configured gateway. Without an explicit
    /// `webhook_url` the gateway is pointed at this server's webhook route.
    pub fn from_config(mut config: AppConfig) -> anyhow::Result<Self> {
        if config.messaging.webhook_url.is_none() {
            config.messaging.webhook_url = Some(format!("{}/webhook", local_api_base(&config)));
        }
        let client = EvolutionClient::new(&config.messaging)
            .context("failed to build the messaging gateway client")?;
        Ok(Self::new(config, Arc::new(client)))
    }

    /// `http://localhost:<port>/api/whatsapp`
    pub fn public_api_base(&self) -> String {
        local_api_base(&self.config)
    }
}

fn local_api_base(config: &AppConfig) -> String {
    let port = config
        .socket_addr()
        .map(|addr| addr.port())
        .unwrap_or(3060);
    format!("http://localhost:{port}/api/whatsapp")
}

/// Apply the coroutine stack size from `STORE_STACK_SIZE`.
pub fn configure_runtime() {
    let runtime = RuntimeConfig::from_env();
    may::config().set_stack_size(runtime.stack_size);
}

/// Build the HTTP service for `spec`: handlers, middleware, the mock bearer
/// provider, CORS and the storefront.
///
/// # Errors
///
/// Invalid request schemas in the document or an invalid CORS section.
pub fn build_service(state: &AppState, spec: SpecBundle) -> anyhow::Result<AppService> {
    let router = Router::new(spec.routes);

    let mut dispatcher = Dispatcher::new();
    // SAFETY: configure_runtime has set the coroutine stack size.
    unsafe {
        registry::register_all(&mut dispatcher, state);
    }
    for route in router.routes() {
        if !dispatcher.has_handler(&route.handler_name) {
            warn!(
                handler = %route.handler_name,
                path = %route.full_path(),
                "Operation has no handler and will answer 500"
            );
        }
    }

    let metrics = Arc::new(MetricsMiddleware::new());
    dispatcher.add_middleware(Arc::clone(&metrics) as Arc<dyn Middleware>);
    dispatcher.add_middleware(Arc::new(TracingMiddleware));

    let mut service = AppService::new(router, dispatcher, spec.security_schemes)?;
    service.set_metrics_middleware(metrics);

    let bearer_schemes: Vec<String> = service
        .security_schemes
        .iter()
        .filter(|(_, scheme)| is_bearer(scheme))
        .map(|(name, _)| name.clone())
        .collect();
    for name in bearer_schemes {
        service.register_security_provider(&name, Arc::new(MockTokenProvider::new()));
    }

    service.set_cors(
        state
            .config
            .cors
            .build()
            .context("invalid cors section in the configuration")?,
    );

    let static_dir = &state.config.static_dir;
    if static_dir.is_dir() {
        service.set_static_files(
            StaticFiles::new(static_dir.clone()),
            json!({
                "api_base": "/api",
                "store_name": state.config.store_name,
            }),
        );
    } else {
        info!(dir = %static_dir.display(), "No storefront directory, serving the API only");
    }
    Ok(service)
}

/// Load the OpenAPI document, start the server on the configured address
/// and schedule the messaging auto-start.
///
/// # Errors
///
/// An unreadable document, an invalid configuration or a failed bind.
pub fn start(state: &AppState) -> anyhow::Result<ServerHandle> {
    let spec = load_spec(&state.config.spec_path)?;
    info!(
        title = %spec.title,
        version = %spec.version,
        routes = spec.routes.len(),
        "OpenAPI document loaded"
    );
    let addr = state.config.socket_addr()?;
    let service = build_service(state, spec)?;
    let handle = HttpServer(service)
        .start(addr)
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(api = %format!("http://localhost:{}/api", addr.port()), "Server is running");

    if state.config.messaging.auto_start {
        state
            .messaging
            .schedule_auto_start(state.config.messaging.startup_delay());
    }
    Ok(handle)
}

//! Application configuration.
//!
//! Read from `config/config.yaml`; a missing file means defaults. A handful
//! of environment variables override the file so deployments can adjust the
//! port and messaging gateway without editing YAML:
//!
//! | variable                  | overrides                 |
//! |---------------------------|---------------------------|
//! | `PORT`                    | port of `http.addr`       |
//! | `STORE_MESSAGING_API_URL` | `messaging.api_url`       |
//! | `STORE_MESSAGING_API_KEY` | `messaging.api_key`       |
//! | `STORE_MESSAGING_INSTANCE`| `messaging.instance_name` |
//! | `STORE_NOTIFY_NUMBER`     | `messaging.notify_number` |
//! | `STORE_AUTO_START`        | `messaging.auto_start`    |

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use http::Method;
use serde::{Deserialize, Serialize};

use crate::middleware::{CorsConfigError, CorsMiddleware, CorsMiddlewareBuilder};

/// Configuration file read by `serve` unless `--config` says otherwise.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Failures while loading or applying the configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_yaml::Error },
    InvalidAddr(String),
    InvalidEnv { name: &'static str, value: String },
    InvalidMethod(String),
    Cors(CorsConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
            ConfigError::InvalidAddr(addr) => write!(f, "invalid listen address '{addr}'"),
            ConfigError::InvalidEnv { name, value } => {
                write!(f, "invalid value '{value}' for {name}")
            }
            ConfigError::InvalidMethod(m) => write!(f, "invalid CORS method '{m}'"),
            ConfigError::Cors(e) => write!(f, "invalid CORS configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Cors(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CorsConfigError> for ConfigError {
    fn from(err: CorsConfigError) -> Self {
        ConfigError::Cors(err)
    }
}

/// `http` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3060".to_string(),
        }
    }
}

/// CORS section. Left at its defaults it yields the permissive policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    /// Regular expressions matched against the whole origin
    pub origin_patterns: Vec<String>,
    pub allowed_methods: Option<Vec<String>>,
    pub allowed_headers: Option<Vec<String>>,
    pub allow_credentials: bool,
    pub expose_headers: Vec<String>,
    pub max_age: Option<u32>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            origin_patterns: vec![],
            allowed_methods: None,
            allowed_headers: None,
            allow_credentials: false,
            expose_headers: vec![],
            max_age: None,
        }
    }
}

impl CorsConfig {
    /// Build the CORS middleware; `*` among the origins means any origin.
    ///
    /// # Errors
    ///
    /// An unknown method name or an origin list the builder rejects.
    pub fn build(&self) -> Result<CorsMiddleware, ConfigError> {
        if *self == CorsConfig::default() {
            return Ok(CorsMiddleware::permissive());
        }
        let mut builder = CorsMiddlewareBuilder::new()
            .allowed_origins(&self.allowed_origins)
            .origin_patterns(&self.origin_patterns)
            .allow_credentials(self.allow_credentials)
            .expose_headers(&self.expose_headers);
        if let Some(methods) = &self.allowed_methods {
            let methods = methods
                .iter()
                .map(|m| {
                    Method::from_bytes(m.to_uppercase().as_bytes())
                        .map_err(|_| ConfigError::InvalidMethod(m.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.allowed_methods(&methods);
        }
        if let Some(headers) = &self.allowed_headers {
            builder = builder.allowed_headers(headers);
        }
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(max_age);
        }
        Ok(builder.build()?)
    }
}

/// Messaging gateway and order notification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Base URL of the Evolution API style gateway
    pub api_url: String,
    pub api_key: Option<String>,
    pub instance_name: String,
    /// URL the gateway posts events to; defaults to this server's webhook route
    pub webhook_url: Option<String>,
    /// Recipient of order notifications
    pub notify_number: String,
    pub auto_start: bool,
    pub startup_delay_ms: u64,
    pub reconnect_delay_secs: u64,
    /// Timeout of each gateway call
    pub request_timeout_secs: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8085".to_string(),
            api_key: None,
            instance_name: "computer-store-whatsapp".to_string(),
            webhook_url: None,
            notify_number: "+94771461925".to_string(),
            auto_start: true,
            startup_delay_ms: 2000,
            reconnect_delay_secs: 5,
            request_timeout_secs: 30,
        }
    }
}

impl MessagingConfig {
    /// Wait before the auto-start call at boot.
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    /// Wait before reconnecting after a disconnect.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Everything `serve` needs, as read from `config/config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub spec_path: PathBuf,
    pub static_dir: PathBuf,
    /// Shown in the rendered pages
    pub store_name: String,
    pub cors: CorsConfig,
    pub messaging: MessagingConfig,
}

impl AppConfig {
    /// Defaults with `spec_path`/`static_dir`/`store_name` filled in.
    pub fn defaults() -> Self {
        Self {
            spec_path: PathBuf::from("doc/openapi.yaml"),
            static_dir: PathBuf::from("static_site"),
            store_name: "Computer Item Store".to_string(),
            ..Self::default()
        }
    }

    /// Parse YAML; keys left out keep their defaults.
    pub fn from_yaml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let parsed: AppConfig =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(parsed.fill_defaults())
    }

    fn fill_defaults(mut self) -> Self {
        let defaults = Self::defaults();
        if self.spec_path.as_os_str().is_empty() {
            self.spec_path = defaults.spec_path;
        }
        if self.static_dir.as_os_str().is_empty() {
            self.static_dir = defaults.static_dir;
        }
        if self.store_name.is_empty() {
            self.store_name = defaults.store_name;
        }
        self
    }

    /// Load `path` and apply environment overrides.
    ///
    /// # Errors
    ///
    /// An unreadable or malformed file, or an invalid override.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml(path, &content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                Self::defaults()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            let port: u16 = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PORT",
                value: port.clone(),
            })?;
            let host = self
                .http
                .addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.http.addr = format!("{host}:{port}");
        }
        if let Some(url) = lookup("STORE_MESSAGING_API_URL") {
            self.messaging.api_url = url;
        }
        if let Some(key) = lookup("STORE_MESSAGING_API_KEY") {
            self.messaging.api_key = Some(key);
        }
        if let Some(instance) = lookup("STORE_MESSAGING_INSTANCE") {
            self.messaging.instance_name = instance;
        }
        if let Some(number) = lookup("STORE_NOTIFY_NUMBER") {
            self.messaging.notify_number = number;
        }
        if let Some(flag) = lookup("STORE_AUTO_START") {
            self.messaging.auto_start = match flag.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: "STORE_AUTO_START",
                        value: flag,
                    })
                }
            };
        }
        Ok(())
    }

    /// Parsed `http.addr`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidAddr`] when it is not `host:port`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http
            .addr
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(self.http.addr.clone()))
    }
}

//! Structured logging setup.
//!
//! Configured from `STORE_LOG_*` environment variables; `RUST_LOG`, when set,
//! replaces the level filter.
//!
//! | variable                    | values                       | default   |
//! |-----------------------------|------------------------------|-----------|
//! | `STORE_LOG_LEVEL`           | trace/debug/info/warn/error  | `info`    |
//! | `STORE_LOG_FORMAT`          | json/pretty                  | `json`    |
//! | `STORE_LOG_REDACT_LEVEL`    | none/credentials/full        | `credentials` |
//! | `STORE_LOG_SAMPLING_MODE`   | all/error-only/sampled       | `all`     |
//! | `STORE_LOG_SAMPLING_RATE`   | 0.0 - 1.0                    | `1.0`     |
//! | `STORE_LOG_ASYNC`           | true/false                   | `true`    |
//! | `STORE_LOG_BUFFER_SIZE`     | lines                        | `8192`    |
//! | `STORE_LOG_TARGET_FILTER`   | extra `EnvFilter` directives |           |
//! | `STORE_LOG_INCLUDE_LOCATION`| true/false                   | `false`   |
//!
//! Values that may carry credentials or personal data go through
//! [`redacted`] before being logged.

use std::env;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing::{Level, Metadata, Subscriber};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output format of the log lines (`STORE_LOG_FORMAT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// `pretty` or anything else for JSON.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// How much of a sensitive value survives in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionLevel {
    /// Log values as they are (development only)
    None,
    /// Mask passwords, tokens, API keys and authorization headers
    Credentials,
    /// Also mask e-mail addresses, phone numbers and names
    Full,
}

impl RedactionLevel {
    /// Unknown values fall back to `Credentials`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => RedactionLevel::None,
            "full" => RedactionLevel::Full,
            _ => RedactionLevel::Credentials,
        }
    }

    /// Whether a field with this name is masked at this level.
    pub fn should_redact(&self, field_name: &str) -> bool {
        const CREDENTIALS: [&str; 10] = [
            "password",
            "passwd",
            "secret",
            "api_key",
            "apikey",
            "token",
            "authorization",
            "credentials",
            "cookie",
            "qr",
        ];
        const PII: [&str; 6] = ["email", "phone", "number", "name", "address", "to"];

        let field = field_name.to_lowercase();
        match self {
            RedactionLevel::None => false,
            RedactionLevel::Credentials => CREDENTIALS.iter().any(|p| field.contains(p)),
            RedactionLevel::Full => {
                CREDENTIALS.iter().any(|p| field.contains(p))
                    || PII.iter().any(|p| field == *p || field.contains(p) && p.len() > 2)
            }
        }
    }

    /// Mask `value` if `field_name` is sensitive at this level.
    ///
    /// Keys and tokens keep their first four characters, phone numbers their
    /// last three; everything else becomes `<REDACTED>`.
    pub fn redact(&self, field_name: &str, value: &str) -> String {
        if !self.should_redact(field_name) {
            return value.to_string();
        }
        let field = field_name.to_lowercase();
        let chars: Vec<char> = value.chars().collect();
        if chars.len() > 4 && (field.contains("key") || field.contains("token")) {
            format!("{}***", chars[..4].iter().collect::<String>())
        } else if chars.len() > 3
            && (field.contains("phone") || field.contains("number") || field == "to")
        {
            format!("***{}", chars[chars.len() - 3..].iter().collect::<String>())
        } else {
            "<REDACTED>".to_string()
        }
    }
}

static REDACTION: OnceCell<RedactionLevel> = OnceCell::new();

/// Redact `value` with the level configured at startup (`credentials`
/// before logging is initialised).
pub fn redacted(field_name: &str, value: &str) -> String {
    REDACTION
        .get()
        .copied()
        .unwrap_or(RedactionLevel::Credentials)
        .redact(field_name, value)
}

/// Which events reach the subscriber (`STORE_LOG_SAMPLING_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    All,
    /// Only WARN and ERROR
    ErrorOnly,
    /// Every WARN and ERROR, a fraction of the rest
    Sampled,
}

impl SamplingMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error-only" | "error_only" => SamplingMode::ErrorOnly,
            "sampled" => SamplingMode::Sampled,
            _ => SamplingMode::All,
        }
    }
}

/// Logging settings, read from `STORE_LOG_*` variables.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub format: LogFormat,
    pub redact_level: RedactionLevel,
    pub sampling_mode: SamplingMode,
    /// Fraction of INFO and below kept in `Sampled` mode
    pub sampling_rate: f64,
    pub async_logging: bool,
    /// Lines buffered by the non-blocking writer
    pub buffer_size: usize,
    /// Comma-separated `EnvFilter` directives
    pub target_filter: Option<String>,
    pub include_location: bool,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl LogConfig {
    /// Read every setting from the environment; unset or invalid values keep
    /// their defaults.
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("STORE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(&env::var("STORE_LOG_FORMAT").unwrap_or_default()),
            redact_level: RedactionLevel::parse(
                &env::var("STORE_LOG_REDACT_LEVEL").unwrap_or_default(),
            ),
            sampling_mode: SamplingMode::parse(
                &env::var("STORE_LOG_SAMPLING_MODE").unwrap_or_default(),
            ),
            sampling_rate: env_parse("STORE_LOG_SAMPLING_RATE", 1.0),
            async_logging: env_parse("STORE_LOG_ASYNC", true),
            buffer_size: env_parse("STORE_LOG_BUFFER_SIZE", 8192),
            target_filter: env::var("STORE_LOG_TARGET_FILTER").ok(),
            include_location: env_parse("STORE_LOG_INCLUDE_LOCATION", false),
        }
    }

    /// Verbose, unredacted, synchronous.
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            redact_level: RedactionLevel::None,
            sampling_mode: SamplingMode::All,
            sampling_rate: 1.0,
            async_logging: false,
            buffer_size: 1024,
            target_filter: None,
            include_location: true,
        }
    }
}

/// Drops a share of low-severity events.
pub struct SamplingLayer {
    mode: SamplingMode,
    sampling_rate: f64,
    counter: AtomicU64,
}

impl SamplingLayer {
    /// `sampling_rate` is clamped to `0.0..=1.0`.
    pub fn new(mode: SamplingMode, sampling_rate: f64) -> Self {
        Self {
            mode,
            sampling_rate: sampling_rate.clamp(0.0, 1.0),
            counter: AtomicU64::new(0),
        }
    }

    fn should_sample(&self, metadata: &Metadata<'_>) -> bool {
        let severe = matches!(*metadata.level(), Level::WARN | Level::ERROR);
        match self.mode {
            SamplingMode::All => true,
            SamplingMode::ErrorOnly => severe,
            SamplingMode::Sampled => {
                if severe || metadata.is_span() {
                    return true;
                }
                if self.sampling_rate <= 0.0 {
                    return false;
                }
                let interval = (1.0 / self.sampling_rate).round().max(1.0) as u64;
                self.counter.fetch_add(1, Ordering::Relaxed) % interval == 0
            }
        }
    }
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: LayerContext<'_, S>) -> bool {
        self.should_sample(metadata)
    }
}

fn build_filter(config: &LogConfig) -> Result<EnvFilter> {
    let mut filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log_level.to_lowercase())
            .with_context(|| format!("invalid log level '{}'", config.log_level))?,
    };
    filter = filter.add_directive(
        "may_minihttp=warn"
            .parse()
            .context("invalid may_minihttp directive")?,
    );
    if let Some(targets) = &config.target_filter {
        for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            filter = filter.add_directive(
                directive
                    .parse()
                    .with_context(|| format!("invalid log filter directive '{directive}'"))?,
            );
        }
    }
    Ok(filter)
}

/// Install the global subscriber.
///
/// With async logging the returned guard owns the writer thread; keep it
/// alive until exit so buffered lines are flushed.
///
/// # Errors
///
/// Invalid filter directives, or a subscriber that is already installed.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    if REDACTION.set(config.redact_level).is_err() {
        tracing::debug!("Redaction level already set");
    }

    let registry = tracing_subscriber::registry()
        .with(build_filter(config)?)
        .with(SamplingLayer::new(config.sampling_mode, config.sampling_rate));

    let (writer, guard) = if config.async_logging {
        let (writer, guard) = NonBlockingBuilder::default()
            .buffered_lines_limit(config.buffer_size)
            .finish(std::io::stdout());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer), Some(guard))
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    registry
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(guard)
}

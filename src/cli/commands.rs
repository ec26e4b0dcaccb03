use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use super::operator::{OperatorClient, DEFAULT_BASE_URL};
use crate::app::{self, AppState};
use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::router::Router;
use crate::server::ServerHandle;
use crate::spec::load_spec;

/// Command-line interface of the computer store
#[derive(Parser)]
#[command(name = "computer-store")]
#[command(about = "Computer Item Store API", long_about = None, version)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// YAML configuration file; defaults apply when it does not exist
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Listen address, e.g. 0.0.0.0:3060
        #[arg(long)]
        addr: Option<String>,

        /// OpenAPI document describing the API
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Directory holding the storefront
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Do not start the messaging client after boot
        #[arg(long, default_value_t = false)]
        no_auto_start: bool,
    },
    /// Print the routes declared by the OpenAPI document
    Routes {
        #[arg(short, long, default_value = "doc/openapi.yaml")]
        spec: PathBuf,
    },
    /// Drive the messaging adapter of a running server
    Messaging {
        /// Base URL of the messaging routes
        #[arg(long, env = "STORE_MESSAGING_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,

        #[command(subcommand)]
        action: MessagingAction,
    },
}

/// Actions of the `messaging` command
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum MessagingAction {
    /// Start the messaging client
    Start,
    /// Stop the messaging client
    Stop,
    /// Start the client unless it is already connected
    AutoStart,
    /// Flip the auto-start flag
    ToggleAutoStart,
    /// Print the pairing QR code
    Qr,
    /// Print the connection status
    Status,
    /// Send a text message
    Send {
        /// Phone number with country code, e.g. +1234567890
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        message: String,
    },
    /// Check whether a number is registered
    Check {
        #[arg(long)]
        number: String,
    },
    /// List recent chats
    Chats,
}

/// Run the parsed command line.
///
/// # Errors
///
/// Startup failures of `serve`, an unreadable document for `routes` and
/// failed actions of `messaging`.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            config,
            addr,
            spec,
            static_dir,
            no_auto_start,
        } => {
            let mut config = AppConfig::load(&config)
                .with_context(|| format!("failed to load {}", config.display()))?;
            if let Some(addr) = addr {
                config.http.addr = addr;
            }
            if let Some(spec) = spec {
                config.spec_path = spec;
            }
            if let Some(dir) = static_dir {
                config.static_dir = dir;
            }
            if no_auto_start {
                config.messaging.auto_start = false;
            }
            serve(config)
        }
        Commands::Routes { spec } => {
            let bundle = load_spec(&spec)?;
            println!("{} {}", bundle.title, bundle.version);
            let router = Router::new(bundle.routes);
            for line in router.describe_routes() {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Messaging { base_url, action } => {
            let client = OperatorClient::new(&base_url)?;
            run_messaging(&client, &action)
        }
    }
}

fn serve(config: AppConfig) -> anyhow::Result<()> {
    app::configure_runtime();
    let state = AppState::from_config(config)?;
    let handle = app::start(&state)?;
    wait_for_shutdown(handle)?;

    if state.messaging.is_ready() {
        if let Err(e) = state.messaging.stop() {
            warn!(error = %e, "Messaging client did not stop cleanly");
        }
    }
    info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutdown signal received");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("server coroutine panicked"))
}

fn run_messaging(client: &OperatorClient, action: &MessagingAction) -> anyhow::Result<()> {
    if client.check_server().is_err() {
        println!("❌ Server is not running! Please start the store server first.");
        println!("ℹ️  Run: computer-store serve");
        anyhow::bail!("server unreachable at {}", client.health_url());
    }
    println!("✅ Server is running! 🚀");

    match action {
        MessagingAction::Start => {
            println!("ℹ️  Starting WhatsApp client...");
            client
                .post("/start", None)
                .context("Failed to start WhatsApp")?;
            println!("✅ WhatsApp client started successfully!");
            println!("ℹ️  Now get the QR code to scan...");
        }
        MessagingAction::Stop => {
            println!("ℹ️  Stopping WhatsApp client...");
            client.post("/stop", None).context("Failed to stop WhatsApp")?;
            println!("✅ WhatsApp client stopped successfully!");
        }
        MessagingAction::AutoStart => {
            println!("ℹ️  Auto-starting WhatsApp client...");
            let reply = client
                .post("/auto-start", None)
                .context("Failed to auto-start WhatsApp")?;
            let body = reply.json();
            if body["success"].as_bool() == Some(true) {
                println!("✅ WhatsApp auto-start completed!");
                println!("ℹ️  Status: {}", body["message"].as_str().unwrap_or_default());
                if body["status"] == "connected" {
                    println!("✅ WhatsApp is already connected and ready!");
                } else {
                    println!("ℹ️  QR code should be generated - scan it with your phone");
                }
            } else {
                println!(
                    "⚠️  Auto-start completed with warning: {}",
                    body["error"].as_str().unwrap_or_default()
                );
            }
        }
        MessagingAction::ToggleAutoStart => {
            let status = client
                .get("/status")
                .context("Failed to toggle auto-start")?;
            if status.json()["data"]["autoStartEnabled"].as_bool() == Some(true) {
                println!("ℹ️  Disabling auto-start...");
                client
                    .post("/auto-start/disable", None)
                    .context("Failed to toggle auto-start")?;
                println!("✅ Auto-start disabled successfully!");
            } else {
                println!("ℹ️  Enabling auto-start...");
                client
                    .post("/auto-start/enable", None)
                    .context("Failed to toggle auto-start")?;
                println!("✅ Auto-start enabled successfully!");
            }
        }
        MessagingAction::Qr => {
            println!("ℹ️  Getting QR code...");
            let reply = client.get("/qr/terminal").context("Failed to get QR code")?;
            println!("{}", reply.text());
        }
        MessagingAction::Status => {
            println!("ℹ️  Getting WhatsApp status...");
            let reply = client
                .get("/status/terminal")
                .context("Failed to get status")?;
            println!("{}", reply.text());
        }
        MessagingAction::Send { to, message } => {
            println!("ℹ️  Sending message...");
            let reply = client
                .post(
                    "/send-message",
                    Some(serde_json::json!({ "to": to, "message": message })),
                )
                .context("Failed to send message")?;
            println!("✅ Message sent successfully!");
            println!(
                "ℹ️  Message ID: {}",
                reply.json()["messageId"].as_str().unwrap_or_default()
            );
        }
        MessagingAction::Check { number } => {
            println!("ℹ️  Checking number...");
            let reply = client
                .post("/check-number", Some(serde_json::json!({ "number": number })))
                .context("Failed to check number")?;
            if reply.json()["data"]["isRegistered"].as_bool() == Some(true) {
                println!("✅ {number} is registered on WhatsApp");
            } else {
                println!("⚠️  {number} is not registered on WhatsApp");
            }
        }
        MessagingAction::Chats => {
            println!("ℹ️  Getting chats...");
            let reply = client.get("/chats/terminal").context("Failed to get chats")?;
            println!("{}", reply.text());
        }
    }
    Ok(())
}

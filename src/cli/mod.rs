//! # CLI Module
//!
//! Command-line entry points of the `computer-store` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Run the API, the storefront and the messaging adapter:
//!
//! ```bash
//! computer-store serve --config config/config.yaml --addr 0.0.0.0:3060
//! ```
//!
//! Options:
//! - `--config <FILE>` - YAML configuration (default `config/config.yaml`, optional)
//! - `--addr <ADDR>` - Listen address, overrides `http.addr`
//! - `--spec <FILE>` - OpenAPI document, overrides `spec_path`
//! - `--static-dir <DIR>` - Storefront directory, overrides `static_dir`
//! - `--no-auto-start` - Skip the messaging start scheduled after boot
//!
//! `SIGINT`/`SIGTERM` stop the server.
//!
//! ### `routes`
//!
//! Print the operations the OpenAPI document declares:
//!
//! ```bash
//! computer-store routes --spec doc/openapi.yaml
//! ```
//!
//! ### `messaging`
//!
//! Operator tool for a running server's messaging adapter:
//!
//! ```bash
//! computer-store messaging status
//! computer-store messaging send --to +94771234567 --message "hello"
//! computer-store messaging --base-url http://store:3060/api/whatsapp qr
//! ```
//!
//! The server's `/api/health` is checked before the action runs.

mod commands;
mod operator;


pub use commands::{run_cli, Cli, Commands, MessagingAction};
pub use operator::{OperatorClient, Reply, DEFAULT_BASE_URL};

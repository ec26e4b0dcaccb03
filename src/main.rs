use clap::Parser;
use computer_store::cli::{run_cli, Cli};
use computer_store::logging::{init_logging, LogConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&LogConfig::from_env())?;
    run_cli(cli)
}

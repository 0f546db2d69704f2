use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ratewatch::application::{Cli, CommandExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --log-level wins over RUST_LOG; default is info
    let filter = match &cli.log_level {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid --log-level directive: {}", directive))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    CommandExecutor::execute(cli.command)
        .await
        .context("ratewatch command failed")?;
    Ok(())
}

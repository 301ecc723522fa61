use anyhow::Result;
use clap::Parser;
use tracing_subscriber::prelude::*;

use translator_adapters::{AppConfig, AppContext};
use translator_cli::{commands, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,translator_core=info,translator_cli=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = AppContext::from_config(config)?;
    let output = commands::execute(&ctx, cli.command).await?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

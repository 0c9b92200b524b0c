use std::path::PathBuf;

use clap::Parser;

mod auth;
mod config;
mod logging;
mod resources;
mod server;

use config::AppConfig;

/// Serve the demo `users` and `foods` resources.
#[derive(Debug, Parser)]
#[command(name = "resource-server", version, about)]
struct Cli {
    /// YAML configuration file; defaults and `RESOURCE_SERVER__*` variables
    /// apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    logging::init(&config.logging)?;
    tracing::info!(
        bind_addr = %config.server.bind_addr,
        default_limit = config.router.default_limit,
        max_limit = config.router.max_limit,
        "Starting resource server"
    );
    server::run(&config).await
}

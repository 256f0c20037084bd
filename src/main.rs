use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tubechan::app::AppContext;
use tubechan::cli::{commands, Cli, Commands};
use tubechan::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tubechan=info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let ctx = AppContext::from_config(config)?;

    match cli.command() {
        Commands::Run => commands::run(&ctx).await?,
        Commands::Once => commands::run_once(&ctx).await?,
        Commands::Feeds => commands::list_feeds(&ctx).await?,
    }

    Ok(())
}

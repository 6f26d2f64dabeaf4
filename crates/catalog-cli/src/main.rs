//! CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use catalog_cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run(args) => handlers::run::execute(args).await?,
        Commands::Validate(args) => handlers::validate::execute(&args)?,
        Commands::Status { db } => handlers::status::execute(&db).await?,
    }
    Ok(())
}

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sellerguard::app;
use sellerguard::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat(args) => app::chat::run(args).await,
        Commands::Check(args) => app::check::run(args).await,
        Commands::Intel(args) => app::intel::run(args),
    }
}

mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pantry", version, about = "Wishlist & cart client for the snacks storefront")]
struct Cli {
    /// Log store and session activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: commands::Command,
}

/// `RUST_LOG` wins; otherwise only warnings, or pantry debug output with `-v`.
fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,pantry_store=debug,pantry_api=debug,pantry_auth=info")
        } else {
            EnvFilter::new("warn")
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    commands::run(cli.command).await
}

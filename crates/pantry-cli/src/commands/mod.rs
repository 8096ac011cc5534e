pub mod auth;
pub mod cart;
pub mod config;
pub mod wishlist;

use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use pantry_api::AuthApi;
use pantry_auth::KeyringStore;
use pantry_core::config::PantryConfig;
use pantry_store::Storefront;

#[derive(Subcommand)]
pub enum Command {
    /// Initialize and inspect Pantry configuration
    Config {
        #[command(subcommand)]
        action: config::ConfigAction,
    },
    /// Sign in to the storefront
    Login(auth::LoginArgs),
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: wishlist::WishlistAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: cart::CartAction,
    },
}

pub async fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Config { action } => config::run(action),
        Command::Login(args) => auth::login(args).await,
        Command::Logout => auth::logout().await,
        Command::Whoami => auth::whoami().await,
        Command::Wishlist { action } => wishlist::run(action).await,
        Command::Cart { action } => cart::run(action).await,
    }
}

/// Build the storefront from the config file and the OS keychain.
pub fn connect() -> anyhow::Result<(Storefront, AuthApi)> {
    let config = PantryConfig::load()?;
    tracing::debug!(api_url = %config.api_url, "connecting");
    let (storefront, auth) = Storefront::connect(&config, Arc::new(KeyringStore::new()))?;
    Ok((storefront, auth))
}

/// Restore the stored session and wait for both collections to load.
pub async fn signed_in() -> anyhow::Result<Storefront> {
    let (storefront, auth) = connect()?;
    if !auth.restore().await? {
        anyhow::bail!("Not logged in. Use `pantry login` first.");
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message("loading wishlist and cart");
    pb.enable_steady_tick(Duration::from_millis(80));
    storefront.wait_until_loaded().await;
    pb.finish_and_clear();

    Ok(storefront)
}

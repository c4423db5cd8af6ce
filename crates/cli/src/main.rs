//! Bazaar CLI - database tools and a terminal shopper session.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! bazaar migrate
//!
//! # Seed stores and products
//! bazaar seed fixtures/stores.yaml
//!
//! # Shop as a guest, then log in and keep the cart
//! bazaar cart acme-coffee add 12 --quantity 2
//! bazaar login -e ann@example.com --store acme-coffee
//! bazaar cart acme-coffee show
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Upsert stores and products from YAML
//! - `register`, `login`, `logout`, `whoami` - Account session
//! - `cart` - Show or change the cart for a store

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bazaar_core::StoreSlug;

mod commands;

use commands::shopper::CartCommand;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed stores and products from a YAML file
    Seed {
        /// Path to the seed file
        file: PathBuf,
    },
    /// Create a shopper account
    Register {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "BAZAAR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in and keep the token for later commands
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "BAZAAR_PASSWORD", hide_env_values = true)]
        password: String,

        /// Merge the guest cart for this store immediately
        #[arg(short, long)]
        store: Option<StoreSlug>,
    },
    /// Log out and forget the stored token
    Logout,
    /// Show the logged-in account
    Whoami,
    /// Show or change the cart for a store
    Cart {
        /// Store slug
        store: StoreSlug,

        #[command(subcommand)]
        action: Option<CartAction>,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart (default)
    Show,
    /// Add a product
    Add {
        product_id: i32,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a line
    Update { item_id: i32, quantity: u32 },
    /// Remove a line
    Remove { item_id: i32 },
    /// Empty the cart
    Clear,
}

impl From<CartAction> for CartCommand {
    fn from(action: CartAction) -> Self {
        match action {
            CartAction::Show => Self::Show,
            CartAction::Add {
                product_id,
                quantity,
            } => Self::Add {
                product_id,
                quantity,
            },
            CartAction::Update { item_id, quantity } => Self::Update { item_id, quantity },
            CartAction::Remove { item_id } => Self::Remove { item_id },
            CartAction::Clear => Self::Clear,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bazaar=info,bazaar_client=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { file } => commands::seed::stores(&file).await?,
        Commands::Register { email, password } => {
            commands::shopper::register(&email, &password).await?;
        }
        Commands::Login {
            email,
            password,
            store,
        } => commands::shopper::login(&email, &password, store).await?,
        Commands::Logout => commands::shopper::logout().await?,
        Commands::Whoami => commands::shopper::whoami().await?,
        Commands::Cart { store, action } => {
            let command = action.map_or(CartCommand::Show, CartCommand::from);
            commands::shopper::cart(store, command).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cart_defaults_to_show() {
        let cli = Cli::try_parse_from(["bazaar", "cart", "acme"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cart { action: None, .. }
        ));

        let cli = Cli::try_parse_from(["bazaar", "cart", "acme", "add", "4"]).unwrap();
        let Commands::Cart {
            action: Some(action),
            ..
        } = cli.command
        else {
            panic!("expected cart command");
        };
        assert!(matches!(
            CartCommand::from(action),
            CartCommand::Add {
                product_id: 4,
                quantity: 1
            }
        ));
    }

    #[test]
    fn test_reserved_store_slug_is_rejected() {
        assert!(Cli::try_parse_from(["bazaar", "cart", "api"]).is_err());
    }
}

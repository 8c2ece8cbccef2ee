use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trolley::{CartItem, CdpDriver, Config, Credentials, LogObserver};

#[derive(Parser)]
#[command(name = "trolley", about = "Purchase automation for Lulu Hypermarket", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up items and print the matches as JSON
    Fetch {
        /// Search queries, one per item
        queries: Vec<String>,
    },
    /// Sign in once to verify credentials
    SignIn,
    /// Remove everything from the cart
    ClearCart,
    /// Clear the cart, then add the items from a JSON file
    Add {
        /// Path to a JSON array of `{name, url}` items
        #[arg(long)]
        items: PathBuf,
    },
    /// Complete payment for the current cart
    Checkout {
        /// UPI ID to pay with
        #[arg(long)]
        upi_id: String,
    },
}

fn credentials_from_env() -> Result<Credentials> {
    let email = std::env::var("TROLLEY_EMAIL").context("TROLLEY_EMAIL is not set")?;
    let password = std::env::var("TROLLEY_PASSWORD").context("TROLLEY_PASSWORD is not set")?;
    Ok(Credentials::new(email, password))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load config.yaml")?;
    let driver = CdpDriver::new(config.browser);
    let observer = LogObserver;

    match cli.command {
        Command::Fetch { queries } => {
            anyhow::ensure!(!queries.is_empty(), "at least one query is required");
            let results = trolley::fetch_items(&driver, &queries, &observer).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::SignIn => {
            let credentials = credentials_from_env()?;
            trolley::sign_in(&driver, &credentials, &observer).await?;
        }
        Command::ClearCart => {
            let credentials = credentials_from_env()?;
            trolley::clear_cart(&driver, &credentials, &observer).await;
        }
        Command::Add { items } => {
            let credentials = credentials_from_env()?;
            let contents = std::fs::read_to_string(&items)
                .with_context(|| format!("failed to read {}", items.display()))?;
            let items: Vec<CartItem> =
                serde_json::from_str(&contents).context("items file must be a JSON array")?;
            trolley::add_filtered_items_to_cart(&driver, &credentials, &items, &observer).await?;
        }
        Command::Checkout { upi_id } => {
            let credentials = credentials_from_env()?;
            trolley::checkout(&driver, &credentials, &upi_id, &observer).await?;
        }
    }

    Ok(())
}

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dominos::api::FulfilmentMethod;
use dominos::{Client, ClientConfig};

/// dominos - Dominos Pizza UK client
///
/// Search stores, read menus and inspect the basket through the same
/// session-based API the website uses.
///
/// Examples:
///   dominos stores camden        # Stores matching "camden"
///   dominos menu "NW1 2AS"       # Menu of the store delivering to NW1 2AS
#[derive(Parser, Debug)]
#[command(author, version = env!("DOMINOS_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL (defaults to https://www.dominos.co.uk)
    #[arg(long = "base-url", env = "DOMINOS_BASE_URL", value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Attempts per call before giving up
    #[arg(long = "max-attempts", value_name = "N", global = true)]
    pub max_attempts: Option<u32>,

    /// Calls allowed per second
    #[arg(long = "rate", value_name = "CALLS", global = true)]
    pub rate: Option<usize>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Search stores by town, street or postcode
    Stores(StoresArgs),

    /// Show the menu of the store serving a postcode
    Menu(MenuArgs),

    /// Show the current basket
    Basket,
}

#[derive(clap::Args, Debug)]
pub struct StoresArgs {
    #[arg(value_name = "TERM")]
    pub term: String,
}

#[derive(clap::Args, Debug)]
pub struct MenuArgs {
    #[arg(value_name = "POSTCODE")]
    pub postcode: String,

    /// Use the collection menu even where the store delivers
    #[arg(long)]
    pub collection: bool,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.as_str());
        }
        if let Some(attempts) = self.max_attempts {
            config = config.with_max_attempts(attempts);
        }
        if let Some(rate) = self.rate {
            config = config.with_rate_limit(rate, Duration::from_secs(1));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let client = Client::new(cli.config()).context("Invalid client configuration")?;

    match cli.command {
        Commands::Stores(args) => {
            let stores = client.get_stores(&args.term).await?;
            if stores.is_empty() {
                println!("No stores found for '{}'", args.term);
            }
            for store in stores.iter() {
                println!("{}: {}", store.id, store);
            }
        }
        Commands::Menu(args) => {
            let mut store = client
                .get_nearest_store(&args.postcode)
                .await?
                .with_context(|| format!("No store serves {}", args.postcode))?;
            let fulfilment = if args.collection || !store.delivery_available {
                store.delivery_available = false;
                FulfilmentMethod::Collection
            } else {
                FulfilmentMethod::Delivery
            };

            client.ensure_store_context().await?;
            client.set_delivery_system(&store, &args.postcode, fulfilment).await?;
            let menu = client.get_menu(&store).await?;
            println!("{}", store);
            print!("{}", menu);
        }
        Commands::Basket => {
            client.ensure_store_context().await?;
            let basket = client.get_basket().await?;
            for item in &basket.items {
                println!(
                    "{} x{} {}",
                    item.name.as_deref().unwrap_or("?"),
                    item.quantity.unwrap_or(1),
                    item.price.as_ref().map(|p| p.0.as_str()).unwrap_or("")
                );
            }
            println!("Total: {}", basket.total_price);
        }
    }
    Ok(())
}

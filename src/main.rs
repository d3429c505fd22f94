use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use herdline::api::ListingFilters;
use herdline::auth::{FileTokenStore, SessionEvents};
use herdline::config::ConfigManager;
use herdline::{ApiClient, AuthService, AuthenticatedHttpClient};

#[derive(Parser)]
#[command(name = "herdline", version, about = "Command-line client for the herdline marketplace")]
struct Cli {
    /// Override the configured API origin
    #[arg(long, global = true, env = "HERDLINE_API_URL")]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the token pair
    Login(LoginArgs),
    /// Forget the stored tokens
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show one listing with its images
    Listing(ListingArgs),
    /// Search listings
    Listings(ListingsArgs),
    /// GET any API path and print the JSON
    Get(GetArgs),
}

#[derive(Args)]
struct LoginArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "HERDLINE_PASSWORD")]
    password: String,
}

#[derive(Args)]
struct ListingArgs {
    id: i64,
}

#[derive(Args)]
struct ListingsArgs {
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    animal_type: Option<String>,
}

#[derive(Args)]
struct GetArgs {
    path: String,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "herdline=debug,warn".into()
            } else {
                "herdline=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();

    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => debug!("No .env file found. Using existing environment variables."),
    };

    let cli = Cli::parse();

    let mut config = ConfigManager::new().await?.get_config().await;
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }

    let store = Arc::new(FileTokenStore::open(&config.auth.token_store_path)?);
    let events = SessionEvents::default();
    let http = AuthenticatedHttpClient::from_config(&config, store, Arc::new(events))?;
    let auth = AuthService::new(ApiClient::new(Arc::new(http)), &config.auth);

    match cli.command {
        Command::Login(args) => {
            let user = auth.login(&args.email, &args.password).await?;
            print_json(&user)?;
        }
        Command::Logout => {
            auth.logout()?;
            println!("Signed out");
        }
        Command::Whoami => match auth.restore().await? {
            Some(user) => print_json(&user)?,
            None => println!("Not signed in"),
        },
        Command::Listing(args) => {
            let detail = auth.api().listing_detail(args.id).await?;
            print_json(&detail)?;
        }
        Command::Listings(args) => {
            let filters = ListingFilters {
                city: args.city,
                animal_type: args.animal_type,
                ..Default::default()
            };
            let listings = auth.api().list_listings(&filters).await?;
            print_json(&listings)?;
        }
        Command::Get(args) => {
            let value = auth.api().get_value(&args.path).await?;
            print_json(&value)?;
        }
    }

    Ok(())
}

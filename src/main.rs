mod account;
mod assets;
mod crypto;
mod database;
mod profiles;
mod registration;
mod settings;
mod startup;
mod webserver;

use anyhow::Result;
use clap::Parser;
use settings::Settings;
use std::path::PathBuf;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(version, about = "Storefront user registration server")]
struct Cli {
    /// Settings file, defaults to `settings.toml` in the working directory
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_env("RUST_LOG"))
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load_from_path(path)?,
        None => Settings::load()?,
    };
    debug!(?settings.database.core, "settings loaded");

    let context = startup::start_application(&settings).await?;

    if let Err(e) = webserver::start(&settings.webserver, context).await {
        error!("Webserver stopped with error: {:?}", e);
        return Err(e);
    }

    Ok(())
}

//! Seed utility
//!
//! Resets the store to the canonical three-lot deployment. Destructive:
//! existing lots are removed first.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for the seed utility
#[derive(Parser, Debug)]
#[command(name = "seed")]
#[command(about = "Reset the parkwatch store to the default lots")]
struct Args {
    /// Path to the sqlite database
    #[arg(short, long, env = "PARKWATCH_DB")]
    db_path: Option<String>,
}

const DEFAULT_LOTS: [(&str, i64); 3] = [("Lot A", 120), ("Lot B", 80), ("Lot C", 40)];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let db_path =
        parkwatch_common::config::resolve_database_path(args.db_path.as_deref(), "PARKWATCH_DB");
    info!("Database: {}", db_path.display());

    let db = parkwatch_api::db::init_database_pool(&db_path)
        .await
        .context("Failed to initialize database")?;

    parkwatch_api::db::lots::delete_all(&db).await?;

    for (name, capacity) in DEFAULT_LOTS {
        let lot = parkwatch_api::db::lots::create(&db, name, capacity, 0).await?;
        info!(name = %lot.name, capacity = lot.capacity, "Seeded parking lot");
    }

    info!("Seed complete");
    Ok(())
}

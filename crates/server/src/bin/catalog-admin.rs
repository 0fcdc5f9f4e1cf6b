// Maintenance commands for the product container: bulk seeding and stats

use anyhow::{Context, Result};
use catalog_core::config::CatalogConfig;
use catalog_core::storage::{
    container_stats, open_store, seed_documents, seed_products, ProductStore,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "catalog-admin")]
#[command(about = "Seed and inspect the product container", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert products from a JSON file, then print container statistics
    Seed {
        /// JSON array of products, or an object with a `products` array
        #[arg(short, long, default_value = "db.json")]
        file: PathBuf,
    },
    /// Print container statistics
    Stats,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = CatalogConfig::from_env().context("Failed to load configuration")?;
    let store = open_store(&config.store).context("Failed to connect to product store")?;

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Seed { file } => seed(store.as_ref(), &file, &mut stdout),
        Command::Stats => stats(store.as_ref(), &mut stdout),
    }
}

fn seed(store: &dyn ProductStore, file: &Path, out: &mut impl Write) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let document: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    let documents = seed_documents(document)?;
    writeln!(out, "Loaded {} products from {}", documents.len(), file.display())?;

    let report = seed_products(store, documents, Utc::now());

    writeln!(out, "\n=== Insertion Results ===")?;
    writeln!(out, "Successful: {}", report.succeeded)?;
    writeln!(out, "Failed: {}", report.failed())?;
    if !report.failures.is_empty() {
        writeln!(out, "\nErrors:")?;
        for failure in &report.failures {
            writeln!(out, "  - {}", failure)?;
        }
    }

    writeln!(out)?;
    stats(store, out)
}

fn stats(store: &dyn ProductStore, out: &mut impl Write) -> Result<()> {
    let stats = container_stats(store)?;
    writeln!(out, "=== Container Statistics ===")?;
    writeln!(out, "backend: {}", stats.backend)?;
    writeln!(out, "database: {}", stats.database)?;
    writeln!(out, "container: {}", stats.container)?;
    writeln!(out, "partition_key: {}", stats.partition_key.join(", "))?;
    writeln!(out, "item_count: {}", stats.item_count)?;
    Ok(())
}

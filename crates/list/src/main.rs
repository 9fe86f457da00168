//! Helios record listing CLI (`hlist`).
//!
//! Loads an entity schema document, opens a SQLite database and prints one
//! page of a listing as JSON.

mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use helios_listing::backends::sqlite::SqliteBackend;
use helios_listing::{ResourcesGetter, SchemaLoader};
use tracing::info;

use crate::config::ListConfig;

fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helios_listing={},hlist={}", level, level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ListConfig::parse();
    init_logging(&config.log_level);

    let registry = SchemaLoader::new()
        .load_registry(&config.schema)
        .with_context(|| format!("cannot load schema {}", config.schema.display()))?;
    info!(entities = registry.len(), schema = %config.schema.display(), "Schema loaded");

    let backend = SqliteBackend::with_config(&config.database, config.backend_config())
        .with_context(|| format!("cannot open database {}", config.database))?;

    let getter = ResourcesGetter::new(
        Arc::new(registry),
        Arc::new(backend),
        config.listing_config(),
    );

    let listing = getter
        .perform(&config.entity, &config.list_params())
        .await
        .map_err(|e| anyhow::anyhow!("listing failed ({}): {}", e.status_code(), e))?;

    info!(count = listing.count, returned = listing.records.len(), "Listing complete");
    println!("{}", serde_json::to_string_pretty(&listing)?);

    Ok(())
}

#[cfg(not(feature = "sqlite"))]
compile_error!("hlist requires the 'sqlite' feature");

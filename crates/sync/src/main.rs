//! `crossmap-sweep` -- one repair pass over a fixture of entity views.
//!
//! Loads both views of every entity from a JSON fixture into an in-memory
//! store, repairs all entities concurrently, and prints the resulting
//! statistics snapshot to stdout.
//!
//! # Environment variables
//!
//! | Variable           | Required | Default | Description                          |
//! |--------------------|----------|---------|--------------------------------------|
//! | `SWEEP_VIEWS_PATH` | yes      | --      | JSON array of `{entity_id, authoritative, replica}` |
//!
//! Mapping and repair settings are read as documented on
//! [`SyncSettings::from_env`].

use std::sync::Arc;

use crossmap_sync::store::InMemoryStore;
use crossmap_sync::{sweep, SyncContext, SyncSettings};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crossmap_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let views_path = std::env::var("SWEEP_VIEWS_PATH").unwrap_or_else(|_| {
        tracing::error!("SWEEP_VIEWS_PATH environment variable is required");
        std::process::exit(1);
    });

    let settings = SyncSettings::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid sync settings");
        std::process::exit(1);
    });

    let raw = tokio::fs::read_to_string(&views_path)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(path = %views_path, error = %e, "Failed to read fixture");
            std::process::exit(1);
        });
    let entries = sweep::parse_fixture(&raw).unwrap_or_else(|e| {
        tracing::error!(path = %views_path, error = %e, "Malformed fixture");
        std::process::exit(1);
    });

    let store = InMemoryStore::new();
    let entity_ids = sweep::seed(&store, entries).await;

    let ctx = SyncContext::new(settings, Arc::new(store)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build sync context");
        std::process::exit(1);
    });

    tracing::info!(
        path = %views_path,
        entities = entity_ids.len(),
        "Starting crossmap-sweep",
    );

    let outcomes = sweep::run(&ctx, &entity_ids).await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    let unrepaired = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .filter(|r| !r.repair_success)
        .count();

    if !ctx.repair.verify_ledger().await {
        std::process::exit(1);
    }

    tracing::info!(failed, unrepaired, "Sweep complete");

    match serde_json::to_string_pretty(&ctx.snapshot().await) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize snapshot");
            std::process::exit(1);
        }
    }
}

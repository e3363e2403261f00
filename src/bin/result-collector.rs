//! # Result Collector
//!
//! Long-running service that listens on the configured brokers and persists
//! every per-site outcome they report.
//!
//! Configuration is read from the file named by `FEASIBILITY_CONFIG` (if set)
//! and from `FEASIBILITY__*` environment variables.

use anyhow::{Context, Result};
use feasibility_core::broker::dsf::PgNotificationSource;
use feasibility_core::broker::{BrokerClient, DirectBrokerClient, DsfBrokerClient};
use feasibility_core::collect::QueryStatusCollector;
use feasibility_core::config::FeasibilityConfig;
use feasibility_core::database::{DatabaseConnection, PgFeasibilityRepository};
use feasibility_core::logging::init_structured_logging;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var_os("FEASIBILITY_CONFIG").map(PathBuf::from);
    let config = FeasibilityConfig::load(config_path.as_deref())
        .context("Failed to load configuration")?;

    init_structured_logging(&config.environment, &config.logging);
    info!(environment = %config.environment, "Starting result collector");

    let database = DatabaseConnection::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    if config.database.run_migrations {
        database
            .run_migrations()
            .await
            .context("Failed to run migrations")?;
    }

    let repository = Arc::new(PgFeasibilityRepository::new(database.pool().clone()));
    let collector = Arc::new(QueryStatusCollector::new(repository));

    let mut brokers: Vec<Arc<dyn BrokerClient>> = Vec::new();
    if let Some(direct) = config.direct.clone() {
        brokers.push(Arc::new(
            DirectBrokerClient::new(direct).context("Failed to create direct broker client")?,
        ));
    }
    if let Some(dsf) = config.dsf.clone() {
        let source = PgNotificationSource::new(
            database.pool().clone(),
            dsf.notification_channel.clone(),
            dsf.buffer_size,
        );
        brokers.push(Arc::new(DsfBrokerClient::new(dsf, Arc::new(source))));
    }

    if brokers.is_empty() {
        warn!("No brokers configured, nothing will be collected");
    }

    for broker in &brokers {
        broker
            .add_query_status_listener(collector.clone())
            .await
            .with_context(|| format!("Failed to register collector on {}", broker.broker_type()))?;
        info!(broker_type = %broker.broker_type(), "Collector registered");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    let stats = collector.stats();
    info!(
        events_received = stats.events_received,
        results_persisted = stats.results_persisted,
        duplicates_dropped = stats.duplicates_dropped,
        errors_dropped = stats.errors_dropped,
        "Shutting down result collector"
    );

    database.close().await;
    Ok(())
}

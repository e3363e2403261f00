//! # Query Status Collector
//!
//! The listener every broker client reports to. For each terminal update it
//! asks the originating client for the outcome, resolves the internal query
//! and site, and persists one result.
//!
//! Nothing is ever reported back to the broker. Failures are logged, counted
//! in [`CollectorStats`] and the event is considered consumed. In particular a
//! second terminal update for an already persisted (query, site) pair is
//! dropped as a duplicate, so the first result always wins.

use super::{CollectorStats, CollectorStatsSnapshot, IdentityResolver};
use crate::broker::{BrokerClient, QueryStatusListener, QueryStatusUpdate};
use crate::constants::QueryStatus;
use crate::database::FeasibilityRepository;
use crate::error::{CollectError, CollectResult, PersistenceError};
use crate::logging::log_status_change;
use crate::models::{NewQueryResult, QueryResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct QueryStatusCollector {
    repository: Arc<dyn FeasibilityRepository>,
    identities: IdentityResolver,
    stats: CollectorStats,
}

impl std::fmt::Debug for QueryStatusCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryStatusCollector")
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

impl QueryStatusCollector {
    pub fn new(repository: Arc<dyn FeasibilityRepository>) -> Self {
        Self {
            identities: IdentityResolver::new(repository.clone()),
            repository,
            stats: CollectorStats::default(),
        }
    }

    pub fn stats(&self) -> CollectorStatsSnapshot {
        self.stats.snapshot()
    }

    async fn collect(
        &self,
        client: &dyn BrokerClient,
        update: &QueryStatusUpdate,
    ) -> CollectResult<QueryResult> {
        let broker_type = client.broker_type();

        let matches_in_population = if update.status == QueryStatus::Completed {
            let count = client
                .get_result_feasibility(&update.broker_query_id, &update.site_id)
                .await
                .map_err(|e| CollectError::broker(broker_type, e))?;
            Some(count)
        } else {
            None
        };

        let query = self
            .identities
            .resolve_query(&update.broker_query_id, broker_type)
            .await?;
        let site_name = client
            .get_site_name(&update.site_id)
            .await
            .map_err(|e| CollectError::broker(broker_type, e))?;
        let site = self.identities.resolve_or_create_site(&site_name).await?;

        let result = NewQueryResult::from_outcome(query.id, site.id, matches_in_population);
        match self.repository.save_result(result).await {
            Ok(stored) => Ok(stored),
            Err(PersistenceError::DuplicateResult { query_id, .. }) => {
                Err(CollectError::DuplicateResult {
                    query_id,
                    site_name: site.site_name,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl QueryStatusListener for QueryStatusCollector {
    async fn on_client_update(&self, client: &dyn BrokerClient, update: &QueryStatusUpdate) {
        self.stats.record_event();
        log_status_change(
            client.broker_type(),
            &update.broker_query_id,
            &update.site_id,
            update.status,
        );

        if !update.status.is_terminal() {
            self.stats.record_informational();
            return;
        }

        match self.collect(client, update).await {
            Ok(stored) => {
                self.stats.record_persisted();
                debug!(
                    result_id = stored.id,
                    query_id = stored.query_id,
                    site_id = stored.site_id,
                    result_type = %stored.result_type,
                    "Persisted query result"
                );
            }
            Err(e @ CollectError::DuplicateResult { .. }) => {
                self.stats.record_duplicate();
                warn!("{}", e);
            }
            Err(e) => {
                self.stats.record_error();
                error!(
                    broker_query_id = %update.broker_query_id,
                    site_id = %update.site_id,
                    status = %update.status,
                    "Could not persist query result: {}", e
                );
            }
        }
    }
}

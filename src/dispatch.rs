//! # Query Dispatch
//!
//! Hands a structured query to every configured broker.
//!
//! Per broker the order is: create the broker query, attach the structured
//! query definition, record the dispatch, publish. The dispatch is recorded
//! before publishing so that an update arriving immediately after the publish
//! can already be resolved to its internal query.
//!
//! A direct broker has delivered its outcome to the listeners by the time its
//! publish returns, so its broker-side results are discarded right away.
//! Results of asynchronous brokers keep arriving after dispatch; the caller
//! releases them with [`QueryDispatcher::remove_results`] when done.

use crate::broker::{BrokerClient, QueryStatusListener};
use crate::constants::{media_types, BrokerType};
use crate::database::FeasibilityRepository;
use crate::error::{BrokerResult, DispatchError, DispatchResult};
use crate::models::{NewQuery, NewQueryDispatch};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of dispatching to a single broker
#[derive(Debug)]
pub struct BrokerDispatch {
    pub broker_type: BrokerType,
    /// External id, present once the broker query was created
    pub broker_query_id: Option<String>,
    pub error: Option<DispatchError>,
}

impl BrokerDispatch {
    pub fn is_published(&self) -> bool {
        self.broker_query_id.is_some() && self.error.is_none()
    }
}

#[derive(Debug)]
pub struct DispatchReport {
    pub query_id: i64,
    pub brokers: Vec<BrokerDispatch>,
}

impl DispatchReport {
    pub fn published_count(&self) -> usize {
        self.brokers.iter().filter(|b| b.is_published()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BrokerDispatch> {
        self.brokers.iter().filter(|b| b.error.is_some())
    }
}

pub struct QueryDispatcher {
    repository: Arc<dyn FeasibilityRepository>,
    brokers: Vec<Arc<dyn BrokerClient>>,
}

impl std::fmt::Debug for QueryDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let brokers: Vec<BrokerType> = self.brokers.iter().map(|b| b.broker_type()).collect();
        f.debug_struct("QueryDispatcher")
            .field("brokers", &brokers)
            .finish()
    }
}

impl QueryDispatcher {
    /// Register `listener` on every broker, then accept dispatches
    pub async fn new(
        repository: Arc<dyn FeasibilityRepository>,
        brokers: Vec<Arc<dyn BrokerClient>>,
        listener: Arc<dyn QueryStatusListener>,
    ) -> BrokerResult<Self> {
        for broker in &brokers {
            broker.add_query_status_listener(listener.clone()).await?;
        }

        info!(brokers = brokers.len(), "Query dispatcher ready");
        Ok(Self {
            repository,
            brokers,
        })
    }

    pub fn brokers(&self) -> &[Arc<dyn BrokerClient>] {
        &self.brokers
    }

    /// Persist the query and publish it on every broker.
    ///
    /// Only a failure to persist the query itself is returned as an error;
    /// per-broker failures are reported in the [`DispatchReport`].
    pub async fn dispatch(&self, structured_query: &str) -> DispatchResult<DispatchReport> {
        let query = self
            .repository
            .save_query(NewQuery::new(structured_query))
            .await?;

        let mut report = DispatchReport {
            query_id: query.id,
            brokers: Vec::with_capacity(self.brokers.len()),
        };

        for broker in &self.brokers {
            let broker_type = broker.broker_type();
            let mut created = None;
            let outcome = self
                .dispatch_to(broker.as_ref(), query.id, structured_query, &mut created)
                .await;

            if let Err(e) = &outcome {
                error!(
                    query_id = query.id,
                    broker_type = %broker_type,
                    "Failed to dispatch query: {}", e
                );
            }

            report.brokers.push(BrokerDispatch {
                broker_type,
                broker_query_id: created,
                error: outcome.err(),
            });
        }

        info!(
            query_id = query.id,
            published = report.published_count(),
            brokers = report.brokers.len(),
            "Dispatched query"
        );
        Ok(report)
    }

    async fn dispatch_to(
        &self,
        broker: &dyn BrokerClient,
        query_id: i64,
        structured_query: &str,
        created: &mut Option<String>,
    ) -> DispatchResult<()> {
        let broker_query_id = broker.create_query(query_id).await?;
        *created = Some(broker_query_id.clone());

        broker
            .add_query_definition(
                &broker_query_id,
                media_types::STRUCTURED_QUERY,
                structured_query,
            )
            .await?;

        self.repository
            .save_dispatch(NewQueryDispatch::new(
                query_id,
                broker_query_id.clone(),
                broker.broker_type(),
            ))
            .await?;

        broker.publish_query(&broker_query_id).await?;

        if broker.broker_type() == BrokerType::Direct {
            if let Err(e) = broker.remove_results(&broker_query_id).await {
                warn!(
                    broker_query_id = %broker_query_id,
                    "Failed to discard direct broker results: {}", e
                );
            }
        }
        Ok(())
    }

    /// Discard the broker-side results of every broker query in `report`.
    ///
    /// Returns how many broker queries were released. Brokers that no longer
    /// know a query are skipped.
    pub async fn remove_results(&self, report: &DispatchReport) -> usize {
        let mut removed = 0;
        for dispatch in &report.brokers {
            let Some(broker_query_id) = dispatch.broker_query_id.as_deref() else {
                continue;
            };
            let Some(broker) = self
                .brokers
                .iter()
                .find(|b| b.broker_type() == dispatch.broker_type)
            else {
                continue;
            };

            match broker.remove_results(broker_query_id).await {
                Ok(()) => removed += 1,
                Err(e) => debug!(
                    query_id = report.query_id,
                    broker_type = %dispatch.broker_type,
                    "Broker results already discarded: {}", e
                ),
            }
        }
        removed
    }
}

//! Broker-scoped cache of the latest known outcome per (query, site).
//!
//! Entries live until the owning query's results are removed; the store is
//! never shared between broker clients.

use crate::error::{BrokerError, BrokerResult};
use dashmap::DashMap;

/// What a site reported for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteOutcome {
    /// Matches in population
    Feasibility(i32),
    Failed,
}

#[derive(Debug, Default)]
struct QueryResults {
    /// Insertion ordered; a site keeps its first position when updated
    sites: Vec<(String, SiteOutcome)>,
}

#[derive(Debug, Default)]
pub struct QueryResultStore {
    results: DashMap<String, QueryResults>,
}

impl QueryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a query known without any site outcome yet
    pub fn register_query(&self, broker_query_id: &str) {
        self.results
            .entry(broker_query_id.to_string())
            .or_default();
    }

    pub fn contains_query(&self, broker_query_id: &str) -> bool {
        self.results.contains_key(broker_query_id)
    }

    /// Record the most recent outcome of a site
    pub fn store_result(&self, broker_query_id: &str, site_id: &str, outcome: SiteOutcome) {
        let mut entry = self
            .results
            .entry(broker_query_id.to_string())
            .or_default();

        match entry.sites.iter_mut().find(|(id, _)| id == site_id) {
            Some((_, existing)) => *existing = outcome,
            None => entry.sites.push((site_id.to_string(), outcome)),
        }
    }

    pub fn outcome(&self, broker_query_id: &str, site_id: &str) -> BrokerResult<SiteOutcome> {
        let entry = self
            .results
            .get(broker_query_id)
            .ok_or_else(|| BrokerError::query_not_found(broker_query_id))?;

        let outcome = entry
            .sites
            .iter()
            .find(|(id, _)| id == site_id)
            .map(|(_, outcome)| *outcome);

        outcome.ok_or_else(|| BrokerError::site_not_found(site_id))
    }

    /// Matches in population; a failed site has none
    pub fn measure_count(&self, broker_query_id: &str, site_id: &str) -> BrokerResult<i32> {
        match self.outcome(broker_query_id, site_id)? {
            SiteOutcome::Feasibility(count) => Ok(count),
            SiteOutcome::Failed => Err(BrokerError::result_unavailable(broker_query_id, site_id)),
        }
    }

    pub fn site_ids_with_result(&self, broker_query_id: &str) -> BrokerResult<Vec<String>> {
        self.results
            .get(broker_query_id)
            .map(|entry| entry.sites.iter().map(|(id, _)| id.clone()).collect())
            .ok_or_else(|| BrokerError::query_not_found(broker_query_id))
    }

    pub fn remove_results(&self, broker_query_id: &str) -> BrokerResult<()> {
        self.results
            .remove(broker_query_id)
            .map(|_| ())
            .ok_or_else(|| BrokerError::query_not_found(broker_query_id))
    }
}

//! Process-local implementation of the persistence boundary.
//!
//! Enforces the same uniqueness rules as the PostgreSQL schema. All state sits
//! behind one mutex so each operation is atomic with respect to the others.

use super::FeasibilityRepository;
use crate::constants::BrokerType;
use crate::error::{PersistenceError, PersistenceResult};
use crate::models::{
    NewQuery, NewQueryDispatch, NewQueryResult, Query, QueryDispatch, QueryResult, Site,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct State {
    queries: HashMap<i64, Query>,
    dispatches: HashMap<(String, BrokerType), QueryDispatch>,
    sites: Vec<Site>,
    results: Vec<QueryResult>,
    next_query_id: i64,
    next_site_id: i64,
    next_result_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryFeasibilityRepository {
    state: Mutex<State>,
}

impl InMemoryFeasibilityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored result
    pub fn all_results(&self) -> Vec<QueryResult> {
        self.state.lock().results.clone()
    }

    /// Snapshot of every stored site
    pub fn all_sites(&self) -> Vec<Site> {
        self.state.lock().sites.clone()
    }
}

#[async_trait]
impl FeasibilityRepository for InMemoryFeasibilityRepository {
    async fn save_query(&self, new_query: NewQuery) -> PersistenceResult<Query> {
        let mut state = self.state.lock();
        state.next_query_id += 1;
        let query = Query {
            id: state.next_query_id,
            query_content: new_query.query_content,
            created_at: Utc::now(),
        };
        state.queries.insert(query.id, query.clone());
        Ok(query)
    }

    async fn find_query(&self, query_id: i64) -> PersistenceResult<Option<Query>> {
        Ok(self.state.lock().queries.get(&query_id).cloned())
    }

    async fn save_dispatch(&self, dispatch: NewQueryDispatch) -> PersistenceResult<QueryDispatch> {
        let mut state = self.state.lock();

        let query = state
            .queries
            .get(&dispatch.query_id)
            .cloned()
            .ok_or_else(|| {
                PersistenceError::database(
                    "save_dispatch",
                    format!("query {} does not exist", dispatch.query_id),
                )
            })?;

        let key = (dispatch.external_query_id.clone(), dispatch.broker_type);
        if state.dispatches.contains_key(&key) {
            return Err(PersistenceError::DuplicateDispatch {
                broker_query_id: dispatch.external_query_id,
                broker_type: dispatch.broker_type,
            });
        }

        let stored = QueryDispatch {
            query,
            external_query_id: dispatch.external_query_id,
            broker_type: dispatch.broker_type,
            dispatched_at: Utc::now(),
        };
        state.dispatches.insert(key, stored.clone());
        Ok(stored)
    }

    async fn find_dispatch_by_external_id_and_broker_type(
        &self,
        external_query_id: &str,
        broker_type: BrokerType,
    ) -> PersistenceResult<Option<QueryDispatch>> {
        let key = (external_query_id.to_string(), broker_type);
        Ok(self.state.lock().dispatches.get(&key).cloned())
    }

    async fn find_site_by_name(&self, site_name: &str) -> PersistenceResult<Option<Site>> {
        Ok(self
            .state
            .lock()
            .sites
            .iter()
            .find(|site| site.site_name == site_name)
            .cloned())
    }

    async fn find_site_by_id(&self, site_id: i64) -> PersistenceResult<Option<Site>> {
        Ok(self
            .state
            .lock()
            .sites
            .iter()
            .find(|site| site.id == site_id)
            .cloned())
    }

    async fn save_site(&self, site_name: &str) -> PersistenceResult<Site> {
        let mut state = self.state.lock();
        if state.sites.iter().any(|site| site.site_name == site_name) {
            return Err(PersistenceError::DuplicateSite {
                site_name: site_name.to_string(),
            });
        }

        state.next_site_id += 1;
        let site = Site {
            id: state.next_site_id,
            site_name: site_name.to_string(),
        };
        state.sites.push(site.clone());
        Ok(site)
    }

    async fn save_result(&self, result: NewQueryResult) -> PersistenceResult<QueryResult> {
        let mut state = self.state.lock();
        if state
            .results
            .iter()
            .any(|r| r.query_id == result.query_id && r.site_id == result.site_id)
        {
            return Err(PersistenceError::DuplicateResult {
                query_id: result.query_id,
                site_id: result.site_id,
            });
        }

        state.next_result_id += 1;
        let stored = QueryResult {
            id: state.next_result_id,
            query_id: result.query_id,
            site_id: result.site_id,
            result_type: result.result_type,
            result: result.result,
            received_at: result.received_at,
        };
        state.results.push(stored.clone());
        Ok(stored)
    }

    async fn find_results_for_query(&self, query_id: i64) -> PersistenceResult<Vec<QueryResult>> {
        Ok(self
            .state
            .lock()
            .results
            .iter()
            .filter(|r| r.query_id == query_id)
            .cloned()
            .collect())
    }
}

//! # Database Operations
//!
//! The persistence boundary of the aggregation core.
//!
//! ## Overview
//!
//! [`FeasibilityRepository`] is the read/write contract the collector and the
//! dispatch path need from durable storage. Two implementations exist:
//!
//! - [`PgFeasibilityRepository`] - PostgreSQL via SQLx
//! - [`InMemoryFeasibilityRepository`] - process-local, same uniqueness rules
//!
//! ## Uniqueness
//!
//! Every implementation must reject:
//! - a second result for the same (query, site) pair with [`PersistenceError::DuplicateResult`]
//! - a second site with the same name with [`PersistenceError::DuplicateSite`]
//! - a second dispatch for the same (external id, broker type) with
//!   [`PersistenceError::DuplicateDispatch`]
//!
//! [`PersistenceError::DuplicateResult`]: crate::error::PersistenceError::DuplicateResult
//! [`PersistenceError::DuplicateSite`]: crate::error::PersistenceError::DuplicateSite
//! [`PersistenceError::DuplicateDispatch`]: crate::error::PersistenceError::DuplicateDispatch

pub mod connection;
pub mod in_memory;
pub mod postgres;

pub use connection::DatabaseConnection;
pub use in_memory::InMemoryFeasibilityRepository;
pub use postgres::PgFeasibilityRepository;

use crate::constants::BrokerType;
use crate::error::PersistenceResult;
use crate::models::{NewQuery, NewQueryDispatch, NewQueryResult, Query, QueryDispatch, QueryResult, Site};
use async_trait::async_trait;

/// Durable storage for queries, dispatches, sites and results
#[async_trait]
pub trait FeasibilityRepository: Send + Sync {
    async fn save_query(&self, new_query: NewQuery) -> PersistenceResult<Query>;

    async fn find_query(&self, query_id: i64) -> PersistenceResult<Option<Query>>;

    async fn save_dispatch(&self, dispatch: NewQueryDispatch) -> PersistenceResult<QueryDispatch>;

    async fn find_dispatch_by_external_id_and_broker_type(
        &self,
        external_query_id: &str,
        broker_type: BrokerType,
    ) -> PersistenceResult<Option<QueryDispatch>>;

    async fn find_site_by_name(&self, site_name: &str) -> PersistenceResult<Option<Site>>;

    async fn find_site_by_id(&self, site_id: i64) -> PersistenceResult<Option<Site>>;

    /// Create a site. Fails with `DuplicateSite` if the name is taken.
    async fn save_site(&self, site_name: &str) -> PersistenceResult<Site>;

    /// Insert a result. Fails with `DuplicateResult` if the pair already has one.
    async fn save_result(&self, result: NewQueryResult) -> PersistenceResult<QueryResult>;

    async fn find_results_for_query(&self, query_id: i64) -> PersistenceResult<Vec<QueryResult>>;
}

//! # Broker Clients
//!
//! One [`BrokerClient`] per remote site-network. A client hides how a query
//! reaches the sites and how per-site outcomes come back, so the collector
//! works the same for every protocol.
//!
//! ## Variants
//!
//! - [`DirectBrokerClient`] - synchronous; one HTTP call per publish, outcome
//!   known when `publish_query` returns
//! - [`DsfBrokerClient`] - asynchronous; one long-lived push channel delivering
//!   site results for any number of in-flight queries, in arbitrary order
//!
//! ## Listener registration
//!
//! Listeners must be registered before the first `publish_query` on a client.
//! A later registration is rejected with
//! [`BrokerError::LateListenerRegistration`](crate::error::BrokerError::LateListenerRegistration).

pub mod direct;
pub mod dsf;
pub mod listener;
pub mod registry;
pub mod store;

pub use direct::DirectBrokerClient;
pub use dsf::{DsfBrokerClient, PushChannelStats, PushChannelStatsSnapshot};
pub use listener::{QueryStatusListener, QueryStatusUpdate};
pub use registry::ListenerRegistry;
pub use store::{QueryResultStore, SiteOutcome};

use crate::constants::BrokerType;
use crate::error::BrokerResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Capability set every broker protocol implementation provides:
/// dispatch, subscribe and resolve.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Identifies the protocol, used to disambiguate external query ids
    fn broker_type(&self) -> BrokerType;

    /// Register an observer for status updates of this client's queries
    async fn add_query_status_listener(
        &self,
        listener: Arc<dyn QueryStatusListener>,
    ) -> BrokerResult<()>;

    /// Open a dispatch context for an internal query and return its external id
    async fn create_query(&self, backend_query_id: i64) -> BrokerResult<String>;

    /// Attach a protocol-specific query payload of the given media type
    async fn add_query_definition(
        &self,
        broker_query_id: &str,
        media_type: &str,
        content: &str,
    ) -> BrokerResult<()>;

    /// Send the query to the sites of this broker
    async fn publish_query(&self, broker_query_id: &str) -> BrokerResult<()>;

    /// Matches in population reported by a site for a query
    async fn get_result_feasibility(&self, broker_query_id: &str, site_id: &str)
        -> BrokerResult<i32>;

    async fn get_site_name(&self, site_id: &str) -> BrokerResult<String>;

    /// Site ids with a recorded outcome, in the order first observed
    async fn get_result_site_ids(&self, broker_query_id: &str) -> BrokerResult<Vec<String>>;

    /// Discard the ephemeral results held for a query.
    ///
    /// Clients never discard results on their own. Whoever dispatched the
    /// query calls this once it no longer needs to read them.
    async fn remove_results(&self, broker_query_id: &str) -> BrokerResult<()>;
}

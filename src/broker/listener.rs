use super::BrokerClient;
use crate::constants::QueryStatus;
use async_trait::async_trait;

/// A status transition of one query at one site
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryStatusUpdate {
    pub broker_query_id: String,
    pub site_id: String,
    pub status: QueryStatus,
}

impl QueryStatusUpdate {
    pub fn new(
        broker_query_id: impl Into<String>,
        site_id: impl Into<String>,
        status: QueryStatus,
    ) -> Self {
        Self {
            broker_query_id: broker_query_id.into(),
            site_id: site_id.into(),
            status,
        }
    }
}

/// Observer of query status updates.
///
/// Called on the delivering broker's own execution context; a slow listener
/// delays every later update from the same broker. Implementations handle
/// their own errors, nothing is reported back to the broker.
#[async_trait]
pub trait QueryStatusListener: Send + Sync {
    async fn on_client_update(&self, client: &dyn BrokerClient, update: &QueryStatusUpdate);
}

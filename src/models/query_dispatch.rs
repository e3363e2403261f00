use crate::constants::BrokerType;
use crate::models::Query;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Records that a query was sent to a broker under an external id.
///
/// Unique per (`external_query_id`, `broker_type`). Written by the dispatch
/// path; the collector only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDispatch {
    pub query: Query,
    pub external_query_id: String,
    pub broker_type: BrokerType,
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueryDispatch {
    pub query_id: i64,
    pub external_query_id: String,
    pub broker_type: BrokerType,
}

impl NewQueryDispatch {
    pub fn new(query_id: i64, external_query_id: impl Into<String>, broker_type: BrokerType) -> Self {
        Self {
            query_id,
            external_query_id: external_query_id.into(),
            broker_type,
        }
    }
}

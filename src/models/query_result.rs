use crate::constants::ResultType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable outcome of one (query, site) pair.
///
/// At most one row exists per pair; `result` is present iff `result_type`
/// is [`ResultType::Success`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: i64,
    pub query_id: i64,
    pub site_id: i64,
    pub result_type: ResultType,
    pub result: Option<i32>,
    pub received_at: DateTime<Utc>,
}

/// New result for insertion. Construct through [`NewQueryResult::success`]
/// or [`NewQueryResult::error`] so the kind and count stay consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQueryResult {
    pub query_id: i64,
    pub site_id: i64,
    pub result_type: ResultType,
    pub result: Option<i32>,
    pub received_at: DateTime<Utc>,
}

impl NewQueryResult {
    pub fn success(query_id: i64, site_id: i64, matches_in_population: i32) -> Self {
        Self {
            query_id,
            site_id,
            result_type: ResultType::Success,
            result: Some(matches_in_population),
            received_at: Utc::now(),
        }
    }

    pub fn error(query_id: i64, site_id: i64) -> Self {
        Self {
            query_id,
            site_id,
            result_type: ResultType::Error,
            result: None,
            received_at: Utc::now(),
        }
    }

    /// Success when a count is known, error otherwise
    pub fn from_outcome(query_id: i64, site_id: i64, matches_in_population: Option<i32>) -> Self {
        match matches_in_population {
            Some(count) => Self::success(query_id, site_id, count),
            None => Self::error(query_id, site_id),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A submitted feasibility query. Immutable once created.
/// Maps to the `query` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Query {
    pub id: i64,
    /// Structured query body as submitted
    pub query_content: String,
    pub created_at: DateTime<Utc>,
}

/// New Query for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuery {
    pub query_content: String,
}

impl NewQuery {
    pub fn new(query_content: impl Into<String>) -> Self {
        Self {
            query_content: query_content.into(),
        }
    }
}

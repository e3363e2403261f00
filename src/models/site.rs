use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A remote data holder. Created on first result arrival, never mutated.
/// Maps to the `site` table; `site_name` is unique (case-sensitive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub id: i64,
    pub site_name: String,
}

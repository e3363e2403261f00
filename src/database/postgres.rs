//! PostgreSQL implementation of the persistence boundary.
//!
//! Uniqueness is enforced by the schema constraints in `migrations/`; unique
//! violations (SQLSTATE 23505) are mapped to the matching `Duplicate*` error
//! by the method that issued the insert.

use super::FeasibilityRepository;
use crate::constants::{BrokerType, ResultType};
use crate::error::{PersistenceError, PersistenceResult};
use crate::models::{
    NewQuery, NewQueryDispatch, NewQueryResult, Query, QueryDispatch, QueryResult, Site,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PgFeasibilityRepository {
    pool: PgPool,
}

impl PgFeasibilityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

fn database_error(operation: &str, err: sqlx::Error) -> PersistenceError {
    PersistenceError::database(operation, err.to_string())
}

fn decode_broker_type(raw: &str) -> PersistenceResult<BrokerType> {
    raw.parse()
        .map_err(|e: String| PersistenceError::database("decode broker_type", e))
}

fn decode_result_type(raw: &str) -> PersistenceResult<ResultType> {
    raw.parse()
        .map_err(|e: String| PersistenceError::database("decode result_type", e))
}

fn dispatch_from_row(row: &PgRow) -> PersistenceResult<QueryDispatch> {
    let read = |e: sqlx::Error| database_error("decode query_dispatch", e);
    let broker_type: String = row.try_get("broker_type").map_err(read)?;

    Ok(QueryDispatch {
        query: Query {
            id: row.try_get("query_id").map_err(read)?,
            query_content: row.try_get("query_content").map_err(read)?,
            created_at: row.try_get("created_at").map_err(read)?,
        },
        external_query_id: row.try_get("external_query_id").map_err(read)?,
        broker_type: decode_broker_type(&broker_type)?,
        dispatched_at: row.try_get::<DateTime<Utc>, _>("dispatched_at").map_err(read)?,
    })
}

fn result_from_row(row: &PgRow) -> PersistenceResult<QueryResult> {
    let read = |e: sqlx::Error| database_error("decode result", e);
    let result_type: String = row.try_get("result_type").map_err(read)?;

    Ok(QueryResult {
        id: row.try_get("id").map_err(read)?,
        query_id: row.try_get("query_id").map_err(read)?,
        site_id: row.try_get("site_id").map_err(read)?,
        result_type: decode_result_type(&result_type)?,
        result: row.try_get("result").map_err(read)?,
        received_at: row.try_get("received_at").map_err(read)?,
    })
}

#[async_trait]
impl FeasibilityRepository for PgFeasibilityRepository {
    async fn save_query(&self, new_query: NewQuery) -> PersistenceResult<Query> {
        sqlx::query_as::<_, Query>(
            r#"
            INSERT INTO query (query_content, created_at)
            VALUES ($1, NOW())
            RETURNING id, query_content, created_at
            "#,
        )
        .bind(&new_query.query_content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("save_query", e))
    }

    async fn find_query(&self, query_id: i64) -> PersistenceResult<Option<Query>> {
        sqlx::query_as::<_, Query>(
            r#"
            SELECT id, query_content, created_at
            FROM query
            WHERE id = $1
            "#,
        )
        .bind(query_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("find_query", e))
    }

    async fn save_dispatch(&self, dispatch: NewQueryDispatch) -> PersistenceResult<QueryDispatch> {
        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO query_dispatch (query_id, external_query_id, broker_type, dispatched_at)
                VALUES ($1, $2, $3, NOW())
                RETURNING query_id, external_query_id, broker_type, dispatched_at
            )
            SELECT i.query_id, i.external_query_id, i.broker_type, i.dispatched_at,
                   q.query_content, q.created_at
            FROM inserted i
            JOIN query q ON q.id = i.query_id
            "#,
        )
        .bind(dispatch.query_id)
        .bind(&dispatch.external_query_id)
        .bind(dispatch.broker_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PersistenceError::DuplicateDispatch {
                    broker_query_id: dispatch.external_query_id.clone(),
                    broker_type: dispatch.broker_type,
                }
            } else {
                database_error("save_dispatch", e)
            }
        })?;

        dispatch_from_row(&row)
    }

    async fn find_dispatch_by_external_id_and_broker_type(
        &self,
        external_query_id: &str,
        broker_type: BrokerType,
    ) -> PersistenceResult<Option<QueryDispatch>> {
        let row = sqlx::query(
            r#"
            SELECT d.query_id, d.external_query_id, d.broker_type, d.dispatched_at,
                   q.query_content, q.created_at
            FROM query_dispatch d
            JOIN query q ON q.id = d.query_id
            WHERE d.external_query_id = $1 AND d.broker_type = $2
            "#,
        )
        .bind(external_query_id)
        .bind(broker_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("find_dispatch", e))?;

        row.as_ref().map(dispatch_from_row).transpose()
    }

    async fn find_site_by_name(&self, site_name: &str) -> PersistenceResult<Option<Site>> {
        sqlx::query_as::<_, Site>(
            r#"
            SELECT id, site_name
            FROM site
            WHERE site_name = $1
            "#,
        )
        .bind(site_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("find_site_by_name", e))
    }

    async fn find_site_by_id(&self, site_id: i64) -> PersistenceResult<Option<Site>> {
        sqlx::query_as::<_, Site>(
            r#"
            SELECT id, site_name
            FROM site
            WHERE id = $1
            "#,
        )
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("find_site_by_id", e))
    }

    async fn save_site(&self, site_name: &str) -> PersistenceResult<Site> {
        debug!(site_name = %site_name, "Creating site");

        sqlx::query_as::<_, Site>(
            r#"
            INSERT INTO site (site_name)
            VALUES ($1)
            RETURNING id, site_name
            "#,
        )
        .bind(site_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PersistenceError::DuplicateSite {
                    site_name: site_name.to_string(),
                }
            } else {
                database_error("save_site", e)
            }
        })
    }

    async fn save_result(&self, result: NewQueryResult) -> PersistenceResult<QueryResult> {
        let row = sqlx::query(
            r#"
            INSERT INTO result (query_id, site_id, result_type, result, received_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, query_id, site_id, result_type, result, received_at
            "#,
        )
        .bind(result.query_id)
        .bind(result.site_id)
        .bind(result.result_type.as_str())
        .bind(result.result)
        .bind(result.received_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PersistenceError::DuplicateResult {
                    query_id: result.query_id,
                    site_id: result.site_id,
                }
            } else {
                database_error("save_result", e)
            }
        })?;

        result_from_row(&row)
    }

    async fn find_results_for_query(&self, query_id: i64) -> PersistenceResult<Vec<QueryResult>> {
        let rows = sqlx::query(
            r#"
            SELECT id, query_id, site_id, result_type, result, received_at
            FROM result
            WHERE query_id = $1
            ORDER BY received_at, id
            "#,
        )
        .bind(query_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error("find_results_for_query", e))?;

        rows.iter().map(result_from_row).collect()
    }
}

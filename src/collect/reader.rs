//! Read side over persisted results.

use crate::constants::ResultType;
use crate::database::FeasibilityRepository;
use crate::error::PersistenceResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of one site for a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteResultSummary {
    pub site_name: String,
    pub result_type: ResultType,
    pub matches_in_population: Option<i32>,
    pub received_at: DateTime<Utc>,
}

/// Aggregate view of everything persisted for a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResultSummary {
    pub query_id: i64,
    /// Sum over successful sites
    pub total_matches_in_population: i64,
    pub successful_sites: usize,
    pub failed_sites: usize,
    pub sites: Vec<SiteResultSummary>,
}

#[derive(Clone)]
pub struct QueryResultReader {
    repository: Arc<dyn FeasibilityRepository>,
}

impl std::fmt::Debug for QueryResultReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResultReader").finish_non_exhaustive()
    }
}

impl QueryResultReader {
    pub fn new(repository: Arc<dyn FeasibilityRepository>) -> Self {
        Self { repository }
    }

    pub async fn results_for_query(&self, query_id: i64) -> PersistenceResult<QueryResultSummary> {
        let results = self.repository.find_results_for_query(query_id).await?;

        let mut summary = QueryResultSummary {
            query_id,
            total_matches_in_population: 0,
            successful_sites: 0,
            failed_sites: 0,
            sites: Vec::with_capacity(results.len()),
        };

        for result in results {
            let site_name = match self.repository.find_site_by_id(result.site_id).await? {
                Some(site) => site.site_name,
                None => result.site_id.to_string(),
            };

            match (result.result_type, result.result) {
                (ResultType::Success, Some(count)) => {
                    summary.successful_sites += 1;
                    summary.total_matches_in_population += i64::from(count);
                }
                _ => summary.failed_sites += 1,
            }

            summary.sites.push(SiteResultSummary {
                site_name,
                result_type: result.result_type,
                matches_in_population: result.result,
                received_at: result.received_at,
            });
        }

        Ok(summary)
    }
}

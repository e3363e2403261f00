//! # Direct Broker Client
//!
//! Synchronous broker reaching a single site over HTTP.
//!
//! `publish_query` POSTs the structured query definition to the site's query
//! endpoint and waits for the answer on the caller's task. The outcome is
//! derived from the response alone:
//!
//! - 2xx with an integer body: COMPLETED with that integer as the match count
//! - any other status, a body that is not an integer, or a transport failure:
//!   FAILED without a count
//!
//! No background task is ever started.

use super::{
    BrokerClient, ListenerRegistry, QueryResultStore, QueryStatusListener, QueryStatusUpdate,
    SiteOutcome,
};
use crate::config::DirectBrokerConfig;
use crate::constants::{direct_site, media_types, BrokerType, QueryStatus};
use crate::error::{BrokerError, BrokerResult};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct DirectQuery {
    backend_query_id: i64,
    /// Definitions by media type
    definitions: HashMap<String, String>,
}

pub struct DirectBrokerClient {
    client: Client,
    endpoint: Url,
    queries: DashMap<String, DirectQuery>,
    store: QueryResultStore,
    registry: ListenerRegistry,
}

impl std::fmt::Debug for DirectBrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectBrokerClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("queries", &self.queries.len())
            .field("registry", &self.registry)
            .finish()
    }
}

impl DirectBrokerClient {
    pub fn new(config: DirectBrokerConfig) -> BrokerResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            BrokerError::configuration(
                "DirectBrokerClient",
                format!("Invalid base URL '{}': {e}", config.base_url),
            )
        })?;
        let endpoint = base_url.join(&config.query_path).map_err(|e| {
            BrokerError::configuration(
                "DirectBrokerClient",
                format!("Invalid query path '{}': {e}", config.query_path),
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(format!("feasibility-core/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BrokerError::configuration(
                    "DirectBrokerClient",
                    format!("Failed to create HTTP client: {e}"),
                )
            })?;

        info!(
            "Created DirectBrokerClient for endpoint: {}, timeout: {}ms",
            endpoint, config.timeout_ms
        );

        Ok(Self {
            client,
            endpoint,
            queries: DashMap::new(),
            store: QueryResultStore::new(),
            registry: ListenerRegistry::new(BrokerType::Direct),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Internal query id a broker query was created for
    pub fn backend_query_id(&self, broker_query_id: &str) -> BrokerResult<i64> {
        self.queries
            .get(broker_query_id)
            .map(|query| query.backend_query_id)
            .ok_or_else(|| BrokerError::query_not_found(broker_query_id))
    }

    fn ensure_query_known(&self, broker_query_id: &str) -> BrokerResult<()> {
        if self.queries.contains_key(broker_query_id) {
            Ok(())
        } else {
            Err(BrokerError::query_not_found(broker_query_id))
        }
    }

    /// Send the definition and turn the response into a site outcome
    async fn execute(&self, broker_query_id: &str, content: String) -> SiteOutcome {
        debug!(broker_query_id = %broker_query_id, endpoint = %self.endpoint, "Sending query to site");

        let response = match self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, media_types::STRUCTURED_QUERY)
            .body(content)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(broker_query_id = %broker_query_id, "Query request failed: {}", e);
                return SiteOutcome::Failed;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(broker_query_id = %broker_query_id, "Site answered with status {}", status);
            return SiteOutcome::Failed;
        }

        match response.text().await {
            Ok(body) => match parse_feasibility(&body) {
                Some(count) => SiteOutcome::Feasibility(count),
                None => {
                    warn!(
                        broker_query_id = %broker_query_id,
                        "Site answered with a body that is not a match count: {:?}", body
                    );
                    SiteOutcome::Failed
                }
            },
            Err(e) => {
                warn!(broker_query_id = %broker_query_id, "Failed to read response body: {}", e);
                SiteOutcome::Failed
            }
        }
    }
}

/// A match count is a bare integer, optionally surrounded by whitespace
fn parse_feasibility(body: &str) -> Option<i32> {
    body.trim().parse().ok()
}

#[async_trait]
impl BrokerClient for DirectBrokerClient {
    fn broker_type(&self) -> BrokerType {
        BrokerType::Direct
    }

    async fn add_query_status_listener(
        &self,
        listener: Arc<dyn QueryStatusListener>,
    ) -> BrokerResult<()> {
        self.registry.add_listener(listener)
    }

    async fn create_query(&self, backend_query_id: i64) -> BrokerResult<String> {
        let broker_query_id = Uuid::new_v4().to_string();
        self.queries.insert(
            broker_query_id.clone(),
            DirectQuery {
                backend_query_id,
                definitions: HashMap::new(),
            },
        );
        self.store.register_query(&broker_query_id);

        debug!(backend_query_id, broker_query_id = %broker_query_id, "Created direct broker query");
        Ok(broker_query_id)
    }

    async fn add_query_definition(
        &self,
        broker_query_id: &str,
        media_type: &str,
        content: &str,
    ) -> BrokerResult<()> {
        let mut query = self
            .queries
            .get_mut(broker_query_id)
            .ok_or_else(|| BrokerError::query_definition_not_found(broker_query_id, media_type))?;
        query
            .definitions
            .insert(media_type.to_string(), content.to_string());
        Ok(())
    }

    async fn publish_query(&self, broker_query_id: &str) -> BrokerResult<()> {
        self.registry.seal();

        let content = {
            let query = self
                .queries
                .get(broker_query_id)
                .ok_or_else(|| BrokerError::query_not_found(broker_query_id))?;
            query
                .definitions
                .get(media_types::STRUCTURED_QUERY)
                .cloned()
                .ok_or_else(|| {
                    BrokerError::query_definition_not_found(
                        broker_query_id,
                        media_types::STRUCTURED_QUERY,
                    )
                })?
        };

        let outcome = self.execute(broker_query_id, content).await;
        self.store
            .store_result(broker_query_id, direct_site::SITE_ID, outcome);

        let status = match outcome {
            SiteOutcome::Feasibility(_) => QueryStatus::Completed,
            SiteOutcome::Failed => QueryStatus::Failed,
        };
        let update = QueryStatusUpdate::new(broker_query_id, direct_site::SITE_ID, status);
        self.registry.notify(self, &update).await;

        Ok(())
    }

    async fn get_result_feasibility(
        &self,
        broker_query_id: &str,
        site_id: &str,
    ) -> BrokerResult<i32> {
        self.ensure_query_known(broker_query_id)?;
        self.store.measure_count(broker_query_id, site_id)
    }

    async fn get_site_name(&self, site_id: &str) -> BrokerResult<String> {
        if site_id == direct_site::SITE_ID {
            Ok(direct_site::SITE_NAME.to_string())
        } else {
            Err(BrokerError::site_not_found(site_id))
        }
    }

    async fn get_result_site_ids(&self, broker_query_id: &str) -> BrokerResult<Vec<String>> {
        self.ensure_query_known(broker_query_id)?;
        self.store.site_ids_with_result(broker_query_id)
    }

    async fn remove_results(&self, broker_query_id: &str) -> BrokerResult<()> {
        self.queries
            .remove(broker_query_id)
            .ok_or_else(|| BrokerError::query_not_found(broker_query_id))?;
        self.store.remove_results(broker_query_id)
    }
}

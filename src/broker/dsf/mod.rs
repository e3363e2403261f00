//! # DSF Broker Client
//!
//! Asynchronous broker receiving site results over one long-lived push
//! channel.
//!
//! ## Push channel lifecycle
//!
//! The channel is connected when the first listener is registered and is never
//! re-established afterwards. A single consuming task reads frames in arrival
//! order, parses them and forwards each result to the listeners before the
//! next frame is read. A slow listener therefore throttles the channel.
//!
//! Frames that do not parse into a completed task result are dropped and only
//! counted; they never become FAILED updates. Parsed results are stored and
//! forwarded whether or not this client created the query, so a collector
//! started after a restart still sees results for queries dispatched earlier.
//! Deciding whether a result belongs to a known query is up to the listener.

pub mod source;
pub mod task;

pub use source::{ChannelNotificationSource, NotificationSource, PgNotificationSource};
pub use task::{parse_task_result, DsfQueryResult};

use super::{
    BrokerClient, ListenerRegistry, QueryResultStore, QueryStatusListener, QueryStatusUpdate,
    SiteOutcome,
};
use crate::config::DsfBrokerConfig;
use crate::constants::{BrokerType, QueryStatus};
use crate::error::{BrokerError, BrokerResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Counters for the push channel
#[derive(Debug, Default)]
pub struct PushChannelStats {
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    results_recorded: AtomicU64,
}

/// Point-in-time copy of [`PushChannelStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushChannelStatsSnapshot {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub results_recorded: u64,
}

impl PushChannelStats {
    pub fn snapshot(&self) -> PushChannelStatsSnapshot {
        PushChannelStatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            results_recorded: self.results_recorded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
struct DsfQuery {
    backend_query_id: i64,
    definitions: HashMap<String, String>,
}

struct DsfInner {
    config: DsfBrokerConfig,
    source: Arc<dyn NotificationSource>,
    queries: DashMap<String, DsfQuery>,
    store: QueryResultStore,
    registry: ListenerRegistry,
    connection: OnceCell<()>,
    stats: PushChannelStats,
}

/// Cheap to clone; clones share all state including the push channel
#[derive(Clone)]
pub struct DsfBrokerClient {
    inner: Arc<DsfInner>,
}

impl std::fmt::Debug for DsfBrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DsfBrokerClient")
            .field("queries", &self.inner.queries.len())
            .field("connected", &self.is_listening())
            .field("registry", &self.inner.registry)
            .field("stats", &self.inner.stats.snapshot())
            .finish()
    }
}

impl DsfBrokerClient {
    pub fn new(config: DsfBrokerConfig, source: Arc<dyn NotificationSource>) -> Self {
        Self {
            inner: Arc::new(DsfInner {
                config,
                source,
                queries: DashMap::new(),
                store: QueryResultStore::new(),
                registry: ListenerRegistry::new(BrokerType::Dsf),
                connection: OnceCell::new(),
                stats: PushChannelStats::default(),
            }),
        }
    }

    pub fn stats(&self) -> PushChannelStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Whether the push channel has been established
    pub fn is_listening(&self) -> bool {
        self.inner.connection.initialized()
    }

    /// Internal query id a broker query was created for
    pub fn backend_query_id(&self, broker_query_id: &str) -> BrokerResult<i64> {
        self.inner
            .queries
            .get(broker_query_id)
            .map(|query| query.backend_query_id)
            .ok_or_else(|| BrokerError::query_not_found(broker_query_id))
    }

    pub fn listener_count(&self) -> usize {
        self.inner.registry.listener_count()
    }

    /// Connect the push channel if no earlier call did. Only the call that
    /// established the channel gets its frame queue back.
    async fn connect_push_channel(&self) -> BrokerResult<Option<mpsc::Receiver<String>>> {
        let mut established = None;
        let slot = &mut established;
        let source = self.inner.source.clone();

        self.inner
            .connection
            .get_or_try_init(|| async move {
                *slot = Some(source.connect().await?);
                info!("DSF push channel established");
                Ok::<(), BrokerError>(())
            })
            .await?;
        Ok(established)
    }

    fn spawn_consumer(&self, receiver: mpsc::Receiver<String>) {
        let client = self.clone();
        tokio::spawn(async move { client.consume(receiver).await });
    }

    /// Connect the push channel and start consuming it. Runs at most once.
    async fn listen_for_query_results(&self) -> BrokerResult<()> {
        if let Some(receiver) = self.connect_push_channel().await? {
            self.spawn_consumer(receiver);
        }
        Ok(())
    }

    async fn consume(self, mut receiver: mpsc::Receiver<String>) {
        while let Some(frame) = receiver.recv().await {
            self.handle_frame(&frame).await;
        }
        warn!("DSF push channel closed, no further results will be received");
    }

    async fn handle_frame(&self, frame: &str) {
        self.inner.stats.frames_received.fetch_add(1, Ordering::Relaxed);

        let result = match parse_task_result(frame) {
            Some(result) => result,
            None => {
                self.inner.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Dropping push frame that is not a completed task result");
                return;
            }
        };

        self.inner.store.store_result(
            &result.query_id,
            &result.site_id,
            SiteOutcome::Feasibility(result.measure_count),
        );
        self.inner.stats.results_recorded.fetch_add(1, Ordering::Relaxed);

        if !self.inner.queries.contains_key(&result.query_id) {
            debug!(
                broker_query_id = %result.query_id,
                site_id = %result.site_id,
                "Recorded task result for a query not created by this client"
            );
        }

        let update = QueryStatusUpdate::new(result.query_id, result.site_id, QueryStatus::Completed);
        self.inner.registry.notify(self, &update).await;
    }
}

#[async_trait]
impl BrokerClient for DsfBrokerClient {
    fn broker_type(&self) -> BrokerType {
        BrokerType::Dsf
    }

    async fn add_query_status_listener(
        &self,
        listener: Arc<dyn QueryStatusListener>,
    ) -> BrokerResult<()> {
        if self.inner.registry.is_sealed() {
            return Err(BrokerError::LateListenerRegistration {
                broker_type: BrokerType::Dsf,
            });
        }

        // register only once the channel is up
        let receiver = self.connect_push_channel().await?;
        let registered = self.inner.registry.add_listener(listener);
        if let Some(receiver) = receiver {
            self.spawn_consumer(receiver);
        }
        registered
    }

    async fn create_query(&self, backend_query_id: i64) -> BrokerResult<String> {
        let broker_query_id = Uuid::new_v4().to_string();
        self.inner.queries.insert(
            broker_query_id.clone(),
            DsfQuery {
                backend_query_id,
                definitions: HashMap::new(),
            },
        );
        self.inner.store.register_query(&broker_query_id);

        debug!(backend_query_id, broker_query_id = %broker_query_id, "Created DSF broker query");
        Ok(broker_query_id)
    }

    async fn add_query_definition(
        &self,
        broker_query_id: &str,
        media_type: &str,
        content: &str,
    ) -> BrokerResult<()> {
        let mut query = self
            .inner
            .queries
            .get_mut(broker_query_id)
            .ok_or_else(|| BrokerError::query_definition_not_found(broker_query_id, media_type))?;
        query
            .definitions
            .insert(media_type.to_string(), content.to_string());
        Ok(())
    }

    async fn publish_query(&self, broker_query_id: &str) -> BrokerResult<()> {
        self.inner.registry.seal();

        let definitions = {
            let query = self
                .inner
                .queries
                .get(broker_query_id)
                .ok_or_else(|| BrokerError::query_not_found(broker_query_id))?;
            if query.definitions.is_empty() {
                return Err(BrokerError::query_definition_not_found(
                    broker_query_id,
                    "any",
                ));
            }
            query.definitions.len()
        };

        // results arrive on the push channel; publishing only arms the wait
        self.listen_for_query_results().await?;

        info!(
            broker_query_id = %broker_query_id,
            definitions,
            "Published DSF query, awaiting site results"
        );
        Ok(())
    }

    async fn get_result_feasibility(
        &self,
        broker_query_id: &str,
        site_id: &str,
    ) -> BrokerResult<i32> {
        self.inner.store.measure_count(broker_query_id, site_id)
    }

    async fn get_site_name(&self, site_id: &str) -> BrokerResult<String> {
        Ok(self
            .inner
            .config
            .site_names
            .get(site_id)
            .cloned()
            .unwrap_or_else(|| site_id.to_string()))
    }

    async fn get_result_site_ids(&self, broker_query_id: &str) -> BrokerResult<Vec<String>> {
        self.inner.store.site_ids_with_result(broker_query_id)
    }

    async fn remove_results(&self, broker_query_id: &str) -> BrokerResult<()> {
        self.inner.queries.remove(broker_query_id);
        self.inner.store.remove_results(broker_query_id)
    }
}

#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Feasibility Core
//!
//! Distributed result aggregation for feasibility queries.
//!
//! ## Overview
//!
//! A feasibility query is dispatched to many independent sites through one or
//! more broker site-networks. Each site answers with a match count or a
//! failure. This crate collects those per-site outcomes and records at most
//! one durable result per (query, site) pair, regardless of how often or in
//! which order a broker reports them.
//!
//! ## Architecture
//!
//! ```text
//! QueryDispatcher ──► BrokerClient (direct | DSF) ──► sites
//!                          │
//!                 ListenerRegistry (ordered fan-out)
//!                          │
//!                 QueryStatusCollector ──► IdentityResolver
//!                          │
//!                 FeasibilityRepository (unique per query/site)
//! ```
//!
//! Two broker variants share one [`broker::BrokerClient`] interface:
//!
//! - **Direct**: one HTTP round trip per publish; the outcome is known when
//!   `publish_query` returns
//! - **DSF**: one long-lived push channel delivering results for many in-flight
//!   queries in arbitrary order
//!
//! ## Module Organization
//!
//! - [`broker`] - Broker clients, listener registry and result store
//! - [`collect`] - Status collector, identity resolution and result reading
//! - [`dispatch`] - Publishing queries to the configured brokers
//! - [`database`] - Persistence boundary (PostgreSQL and in-memory)
//! - [`models`] - Query, dispatch, site and result entities
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use feasibility_core::broker::{BrokerClient, DirectBrokerClient};
//! use feasibility_core::collect::QueryStatusCollector;
//! use feasibility_core::config::DirectBrokerConfig;
//! use feasibility_core::database::InMemoryFeasibilityRepository;
//! use feasibility_core::dispatch::QueryDispatcher;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = Arc::new(InMemoryFeasibilityRepository::new());
//! let collector = Arc::new(QueryStatusCollector::new(repository.clone()));
//! let direct: Arc<dyn BrokerClient> =
//!     Arc::new(DirectBrokerClient::new(DirectBrokerConfig::default())?);
//!
//! let dispatcher = QueryDispatcher::new(repository, vec![direct], collector.clone()).await?;
//! let report = dispatcher.dispatch(r#"{"inclusionCriteria":[]}"#).await?;
//!
//! println!("query {} persisted {} results", report.query_id, collector.stats().results_persisted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod broker;
pub mod collect;
pub mod config;
pub mod constants;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod models;

pub use broker::{
    BrokerClient, DirectBrokerClient, DsfBrokerClient, QueryStatusListener, QueryStatusUpdate,
};
pub use collect::{QueryResultReader, QueryStatusCollector};
pub use config::FeasibilityConfig;
pub use constants::{BrokerType, QueryStatus, ResultType};
pub use database::{FeasibilityRepository, InMemoryFeasibilityRepository, PgFeasibilityRepository};
pub use dispatch::{DispatchReport, QueryDispatcher};
pub use error::{BrokerError, CollectError, DispatchError, PersistenceError};

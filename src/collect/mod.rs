//! # Result Collection
//!
//! Turns broker status updates into durable results.
//!
//! - [`QueryStatusCollector`] is the listener registered on every broker. It
//!   resolves the outcome through the originating client and persists at most
//!   one result per (query, site).
//! - [`IdentityResolver`] maps external ids to internal entities, creating
//!   sites on first sight.
//! - [`QueryResultReader`] summarises what has been persisted.

pub mod identity;
pub mod reader;
pub mod stats;
pub mod status_listener;

pub use identity::IdentityResolver;
pub use reader::{QueryResultReader, QueryResultSummary, SiteResultSummary};
pub use stats::{CollectorStats, CollectorStatsSnapshot};
pub use status_listener::QueryStatusCollector;

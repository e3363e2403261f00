//! # Error Types
//!
//! Structured errors for the broker clients, the persistence boundary and the
//! result collector.

use crate::constants::BrokerType;
use thiserror::Error;

/// Errors raised by broker client operations
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Query not found: {query_id}")]
    QueryNotFound { query_id: String },

    #[error("Site not found: {site_id}")]
    SiteNotFound { site_id: String },

    #[error("Query definition not found: {query_id} ({media_type})")]
    QueryDefinitionNotFound {
        query_id: String,
        media_type: String,
    },

    #[error("No feasibility available for query {query_id} at site {site_id}: site reported a failure")]
    ResultUnavailable { query_id: String, site_id: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Listener registered after a query was published on broker {broker_type}")]
    LateListenerRegistration { broker_type: BrokerType },

    #[error("Notification channel closed for broker {broker_type}")]
    ChannelClosed { broker_type: BrokerType },

    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },
}

impl BrokerError {
    pub fn query_not_found(query_id: impl Into<String>) -> Self {
        Self::QueryNotFound {
            query_id: query_id.into(),
        }
    }

    pub fn site_not_found(site_id: impl Into<String>) -> Self {
        Self::SiteNotFound {
            site_id: site_id.into(),
        }
    }

    pub fn query_definition_not_found(
        query_id: impl Into<String>,
        media_type: impl Into<String>,
    ) -> Self {
        Self::QueryDefinitionNotFound {
            query_id: query_id.into(),
            media_type: media_type.into(),
        }
    }

    pub fn result_unavailable(query_id: impl Into<String>, site_id: impl Into<String>) -> Self {
        Self::ResultUnavailable {
            query_id: query_id.into(),
            site_id: site_id.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        BrokerError::transport(err.to_string())
    }
}

impl From<sqlx::Error> for BrokerError {
    fn from(err: sqlx::Error) -> Self {
        BrokerError::transport(err.to_string())
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors raised at the persistence boundary
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Result already exists for query {query_id} at site {site_id}")]
    DuplicateResult { query_id: i64, site_id: i64 },

    #[error("Site already exists: {site_name}")]
    DuplicateSite { site_name: String },

    #[error("Dispatch already recorded: {broker_query_id} ({broker_type})")]
    DuplicateDispatch {
        broker_query_id: String,
        broker_type: BrokerType,
    },

    #[error("Database error: {operation}: {message}")]
    Database { operation: String, message: String },
}

impl PersistenceError {
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::DuplicateResult { .. } | Self::DuplicateSite { .. } | Self::DuplicateDispatch { .. }
        )
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Reasons a single status event could not be turned into a persisted result.
///
/// These never leave the collector; they are logged and counted.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Cannot resolve feasibility from broker {broker_type}: {source}")]
    Broker {
        broker_type: BrokerType,
        #[source]
        source: BrokerError,
    },

    #[error("Cannot resolve internal query for external query '{broker_query_id}' of broker {broker_type}")]
    IdentityResolution {
        broker_query_id: String,
        broker_type: BrokerType,
    },

    #[error("Result for query {query_id} at site '{site_name}' already exists - dropping this one")]
    DuplicateResult { query_id: i64, site_name: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl CollectError {
    pub fn broker(broker_type: BrokerType, source: BrokerError) -> Self {
        Self::Broker {
            broker_type,
            source,
        }
    }

    pub fn identity_resolution(broker_query_id: impl Into<String>, broker_type: BrokerType) -> Self {
        Self::IdentityResolution {
            broker_query_id: broker_query_id.into(),
            broker_type,
        }
    }
}

pub type CollectResult<T> = Result<T, CollectError>;

/// Errors raised while handing a query to the brokers
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_creation() {
        let err = BrokerError::site_not_found("7");
        assert!(matches!(err, BrokerError::SiteNotFound { .. }));

        let err = BrokerError::query_definition_not_found("q-1", "text/cql");
        assert!(matches!(err, BrokerError::QueryDefinitionNotFound { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = BrokerError::query_not_found("abc");
        let display = format!("{err}");
        assert!(display.contains("Query not found"));
        assert!(display.contains("abc"));

        let err = CollectError::identity_resolution("abc", BrokerType::Dsf);
        let display = format!("{err}");
        assert!(display.contains("abc"));
        assert!(display.contains("DSF"));
    }

    #[test]
    fn test_duplicate_classification() {
        assert!(PersistenceError::DuplicateResult {
            query_id: 1,
            site_id: 2
        }
        .is_duplicate());
        assert!(!PersistenceError::database("save", "boom").is_duplicate());
    }

    #[test]
    fn test_persistence_error_converts_into_collect_error() {
        let err: CollectError = PersistenceError::database("save_result", "connection reset").into();
        assert!(matches!(err, CollectError::Persistence(_)));
        assert!(err.to_string().contains("connection reset"));
    }
}

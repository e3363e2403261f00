//! # System Constants
//!
//! Core enums and constants shared by the broker clients, the result collector
//! and the persistence layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Media types identifying the dialect of a query definition
pub mod media_types {
    /// Structured query (the JSON dialect sites evaluate directly)
    pub const STRUCTURED_QUERY: &str = "application/sq+json";
    pub const CQL: &str = "text/cql";
    pub const FHIR_MEASURE: &str = "application/fhir+json";
}

/// Site addressed by the direct broker
pub mod direct_site {
    pub const SITE_ID: &str = "1";
    pub const SITE_NAME: &str = "FHIR Server";
}

/// Which broker protocol implementation a client speaks.
///
/// Used to disambiguate external query ids, which are only unique per broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerType {
    Direct,
    Dsf,
}

impl BrokerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerType::Direct => "DIRECT",
            BrokerType::Dsf => "DSF",
        }
    }
}

impl fmt::Display for BrokerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrokerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DIRECT" => Ok(BrokerType::Direct),
            "DSF" => Ok(BrokerType::Dsf),
            other => Err(format!("unknown broker type '{other}'")),
        }
    }
}

/// Status of a query at a single site as reported by a broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    Dispatched,
    Completed,
    Failed,
}

impl QueryStatus {
    /// Completed and failed are final for a (query, site) pair.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryStatus::Completed | QueryStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Dispatched => "DISPATCHED",
            QueryStatus::Completed => "COMPLETED",
            QueryStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a persisted result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    Success,
    Error,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Success => "SUCCESS",
            ResultType::Error => "ERROR",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(ResultType::Success),
            "ERROR" => Ok(ResultType::Error),
            other => Err(format!("unknown result type '{other}'")),
        }
    }
}

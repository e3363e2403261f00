//! # Models
//!
//! Durable entities of the aggregation core: queries, their dispatches to
//! brokers, sites and per-site results.

pub mod query;
pub mod query_dispatch;
pub mod query_result;
pub mod site;

pub use query::{NewQuery, Query};
pub use query_dispatch::{NewQueryDispatch, QueryDispatch};
pub use query_result::{NewQueryResult, QueryResult};
pub use site::Site;

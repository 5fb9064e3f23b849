//! Daltek server
//!
//! Hosts the dashboard pipeline behind an HTTP API:
//! - [`QueryService`] turns query specs into SQL and runs saved queries
//! - [`DataMapperService`] turns query results into widget payloads
//! - chart builders and the render transformer from `daltek-chart`
//!
//! Configuration, structured logging and Prometheus metrics live here too.

pub mod api;
pub mod config;
pub mod logging;
pub mod mapper;
pub mod metrics;
pub mod query;

pub use api::{router, ApiError, AppState};
pub use config::{Config, ConfigError};
pub use mapper::{DataMapperService, QueryResult, TransformResponse};
pub use metrics::Metrics;
pub use query::{ExecutedQuery, QueryService};

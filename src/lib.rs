//! Request gate for the email-marketing KPI ingestion endpoint.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod schema;
pub mod security;
pub mod store;

pub use config::schema::GateConfig;
pub use http::GateServer;
pub use lifecycle::Shutdown;
pub use pipeline::{Pipeline, RequestContext, Stage, StageOutcome};

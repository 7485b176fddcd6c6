//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for log shipping)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every span (set by the HTTP layer)
//! - Metric calls are no-ops until a recorder is installed, so tests and
//!   embedders pay nothing
//! - Stage faults are logged in full here and never sent to clients

pub mod logging;
pub mod metrics;

//! HTTP surface of the gate.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → request.rs (wrap as GateRequest, lazy bounded body)
//!     → [pipeline: size guard → rate limiter → schema validator]
//!     → handler.rs (downstream consumer) or response.rs (rejection)
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use handler::{AcceptingHandler, IngestHandler};
pub use request::AxumRequest;
pub use server::{AppState, Gate, GateServer};

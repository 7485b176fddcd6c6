//! Payload schema validation.
//!
//! # Data Flow
//! ```text
//! GateRequest::body (bounded read)
//!     → validator.rs (parse JSON, select schema by tag, check fields)
//!     → Proceed { payload } | Terminal(400, { errors })
//! ```
//!
//! # Design Decisions
//! - Schemas come from configuration, so new payload types need no code
//! - Every problem is reported, not just the first one

pub mod validator;

pub use validator::SchemaValidator;

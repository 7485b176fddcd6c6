//! Request-gating pipeline.
//!
//! # Data Flow
//! ```text
//! GateRequest (headers, peer address, lazy body)
//!     → composer.rs (run stages strictly in order)
//!         → stage.rs (SizeGuard → RateLimiter → SchemaValidator)
//!         → outcome.rs (Terminal short-circuits, Proceed merges)
//!     → context.rs (merged RequestContext)
//!     → IngestHandler (outside the pipeline)
//! ```
//!
//! # Design Decisions
//! - Expected rejections are return values (`StageOutcome::Terminal`)
//! - Unexpected faults (errors and panics) are caught once, at the composer
//! - Stages see a read-only snapshot of the context; they publish through fragments
//! - No dependency on any HTTP server library; adapters live in `crate::http`

pub mod composer;
pub mod context;
pub mod outcome;
pub mod request;
pub mod stage;

pub use composer::{Pipeline, PipelineResult};
pub use context::{ContextFragment, IngestPayload, RateLimitInfo, RequestContext};
pub use outcome::{Rejection, StageOutcome};
pub use request::{BodyError, GateRequest, InboundRequest};
pub use stage::{Stage, StageError};

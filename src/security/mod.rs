//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (declared Content-Length against the ceiling)
//!     → headers.rs (resolve the client key, X-Forwarded-For from trusted proxies only)
//!     → rate_limit.rs (charge the key's fixed window)
//!     → Pass to schema validation
//! ```
//!
//! # Design Decisions
//! - Size is checked before the counter is charged
//! - Rate limiting fails open by default; `closed` is opt-in
//! - No trust in client input

pub mod clock;
pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use headers::ClientKeyResolver;
pub use limits::SizeGuard;
pub use rate_limit::RateLimiter;

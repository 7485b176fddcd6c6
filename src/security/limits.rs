//! Request size limits.
//!
//! # Responsibilities
//! - Reject requests whose declared `Content-Length` exceeds the ceiling
//! - Reject malformed `Content-Length` values
//!
//! # Design Decisions
//! - Checked from headers only, before any body byte is read
//! - No header means nothing to measure: proceed (the body reader enforces
//!   the same ceiling while streaming)
//! - Return 400 for a malformed header, 413 Payload Too Large otherwise

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::json;

use crate::pipeline::{GateRequest, Rejection, RequestContext, Stage, StageError, StageOutcome};

const MIB: u64 = 1024 * 1024;

/// Default ceiling: 5 MiB.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 5 * MIB;

/// Header-based payload size guard.
#[derive(Debug, Clone, Copy)]
pub struct SizeGuard {
    max_bytes: u64,
}

impl Default for SizeGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_BYTES)
    }
}

impl SizeGuard {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Decide from the raw `Content-Length` value, if any.
    pub fn check(&self, declared: Option<&str>) -> StageOutcome {
        let Some(raw) = declared else {
            return StageOutcome::proceed();
        };

        let Some(length) = parse_content_length(raw) else {
            return StageOutcome::Terminal(Rejection::new(
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Bad Request",
                    "message": "Invalid Content-Length header",
                }),
            ));
        };

        if length > self.max_bytes {
            tracing::warn!(
                declared_bytes = length,
                max_bytes = self.max_bytes,
                "Payload exceeds size limit"
            );
            return StageOutcome::Terminal(payload_too_large(self.max_bytes, Some(length)));
        }

        StageOutcome::proceed()
    }
}

#[async_trait]
impl Stage for SizeGuard {
    fn name(&self) -> &'static str {
        "size_guard"
    }

    async fn run(
        &self,
        req: &dyn GateRequest,
        _ctx: &RequestContext,
    ) -> Result<StageOutcome, StageError> {
        Ok(self.check(req.header("content-length")))
    }
}

/// 413 body. `received` is unknown when the limit tripped mid-stream.
pub fn payload_too_large(max_bytes: u64, received: Option<u64>) -> Rejection {
    let max_size = limit_label(max_bytes);
    match received {
        Some(bytes) => {
            let received_size = megabytes(bytes);
            Rejection::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({
                    "success": false,
                    "error": "Payload Too Large",
                    "message": format!(
                        "Request payload exceeds {} limit (received {})",
                        max_size, received_size
                    ),
                    "maxSize": max_size,
                    "receivedSize": received_size,
                }),
            )
        }
        None => Rejection::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({
                "success": false,
                "error": "Payload Too Large",
                "message": format!("Request payload exceeds {} limit", max_size),
                "maxSize": max_size,
            }),
        ),
    }
}

/// Only plain decimal digits are a valid length.
fn parse_content_length(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// `bytes / 2^20` with two decimals, e.g. `"6.00MB"`.
fn megabytes(bytes: u64) -> String {
    format!("{:.2}MB", bytes as f64 / MIB as f64)
}

/// Whole mebibytes print without decimals (`"5MB"`).
fn limit_label(bytes: u64) -> String {
    if bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        megabytes(bytes)
    }
}

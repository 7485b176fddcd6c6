//! Stage outcomes and terminal rejections.

use axum::http::StatusCode;
use serde_json::{json, Value};

use super::context::ContextFragment;

/// Result of a single stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Stop the pipeline and answer with this response.
    Terminal(Rejection),
    /// Merge the fragment into the running context and continue.
    Proceed(ContextFragment),
}

impl StageOutcome {
    /// `Proceed({})`.
    pub fn proceed() -> Self {
        StageOutcome::Proceed(ContextFragment::default())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StageOutcome::Terminal(_))
    }
}

/// A fully formed rejection: status, JSON body and extra headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub status: StatusCode,
    pub body: Value,
    pub headers: Vec<(&'static str, String)>,
}

impl Rejection {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl ToString) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    /// Uniform answer for any unexpected stage fault. Carries no internal detail.
    pub fn internal_error() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "success": false,
                "error": "Internal Server Error",
                "message": "An unexpected error occurred while processing the request",
            }),
        )
    }
}

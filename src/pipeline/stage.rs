//! The stage contract.

use async_trait::async_trait;

use super::context::RequestContext;
use super::outcome::StageOutcome;
use super::request::{BodyError, GateRequest};
use crate::store::StoreError;

/// An unexpected stage fault. Never used for deliberate rejections.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Body(#[from] BodyError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl StageError {
    pub fn internal(msg: impl Into<String>) -> Self {
        StageError::Internal(msg.into())
    }
}

/// One unit of the gating pipeline.
///
/// `ctx` is a read-only snapshot of everything earlier stages published.
/// Stages add to the context only through `StageOutcome::Proceed`.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short stable name used in logs and metric labels.
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        req: &dyn GateRequest,
        ctx: &RequestContext,
    ) -> Result<StageOutcome, StageError>;
}

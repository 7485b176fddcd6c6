//! Pipeline composer.
//!
//! Runs stages one after another, short-circuits on the first terminal
//! outcome and turns any stage fault into the uniform 500 rejection.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;

use super::context::RequestContext;
use super::outcome::{Rejection, StageOutcome};
use super::request::GateRequest;
use super::stage::Stage;
use crate::observability::metrics;

/// Either the merged context (every stage proceeded) or the response to send.
pub type PipelineResult = Result<RequestContext, Rejection>;

/// An ordered list of stages.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. Order of calls is execution order.
    pub fn with_stage<S: Stage + 'static>(self, stage: S) -> Self {
        self.with_shared_stage(Arc::new(stage))
    }

    /// Append a stage that is also held elsewhere (e.g. the rate limiter,
    /// which serves quota lookups outside the pipeline).
    pub fn with_shared_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order against `req`.
    pub async fn run(&self, req: &dyn GateRequest) -> PipelineResult {
        let start = Instant::now();
        let mut ctx = RequestContext::default();

        for stage in &self.stages {
            let name = stage.name();
            let result = AssertUnwindSafe(stage.run(req, &ctx)).catch_unwind().await;

            match result {
                Ok(Ok(StageOutcome::Proceed(fragment))) => ctx.merge(fragment),
                Ok(Ok(StageOutcome::Terminal(rejection))) => {
                    tracing::debug!(
                        stage = name,
                        status = rejection.status.as_u16(),
                        "Pipeline short-circuited"
                    );
                    metrics::record_rejection(name, rejection.status.as_u16());
                    metrics::record_pipeline_duration(start);
                    return Err(rejection);
                }
                Ok(Err(e)) => {
                    tracing::error!(stage = name, error = %e, error_debug = ?e, "Stage failed");
                    return Err(Self::fault(name, start));
                }
                Err(panic) => {
                    tracing::error!(stage = name, panic = %panic_message(&panic), "Stage panicked");
                    return Err(Self::fault(name, start));
                }
            }
        }

        metrics::record_pipeline_duration(start);
        Ok(ctx)
    }

    fn fault(stage: &'static str, start: Instant) -> Rejection {
        metrics::record_stage_fault(stage);
        metrics::record_pipeline_duration(start);
        Rejection::internal_error()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! Downstream ingestion handler.
//!
//! The handler runs only after every stage proceeded. Persistence lives
//! behind this trait and is not part of the gate.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use uuid::Uuid;

use crate::pipeline::RequestContext;

/// Consumer of a validated request context.
#[async_trait]
pub trait IngestHandler: Send + Sync {
    async fn handle(&self, ctx: RequestContext) -> Response;
}

/// Acknowledges every validated payload with `202 Accepted` and an id.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptingHandler;

#[async_trait]
impl IngestHandler for AcceptingHandler {
    async fn handle(&self, ctx: RequestContext) -> Response {
        let id = Uuid::new_v4();
        let kind = ctx.payload.as_ref().map(|p| p.kind.clone());

        tracing::info!(
            id = %id,
            kind = kind.as_deref().unwrap_or("unknown"),
            client = ctx.client_key.as_deref().unwrap_or("unknown"),
            "Payload accepted"
        );

        (
            StatusCode::ACCEPTED,
            Json(json!({
                "success": true,
                "id": id,
                "type": kind,
            })),
        )
            .into_response()
    }
}

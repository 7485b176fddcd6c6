//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the gating pipeline from configuration
//! - Create Axum Router with the ingestion, quota and health routes
//! - Wire up middleware (timeout, request ID, tracing, panic guard)
//! - Swap in a rebuilt pipeline on configuration reload
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::http::handler::{AcceptingHandler, IngestHandler};
use crate::http::request::AxumRequest;
use crate::http::response::{apply_rate_limit_headers, panic_response};
use crate::observability::metrics;
use crate::pipeline::Pipeline;
use crate::schema::SchemaValidator;
use crate::security::clock::{Clock, SystemClock};
use crate::security::limits::SizeGuard;
use crate::security::rate_limit::RateLimiter;
use crate::store::CounterStore;

/// One configured pipeline plus what the routes need beside it.
pub struct Gate {
    pub pipeline: Pipeline,
    /// Held separately for quota lookups; also the pipeline's second stage.
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub max_body_bytes: u64,
}

impl Gate {
    /// `SizeGuard → RateLimiter → SchemaValidator`; the limiter is left out
    /// when rate limiting is disabled.
    pub fn from_config(config: &GateConfig, store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        let max_body_bytes = config.limits.max_body_bytes;
        let mut pipeline = Pipeline::new().with_stage(SizeGuard::new(max_body_bytes));

        let rate_limiter = if config.rate_limit.enabled {
            let limiter = Arc::new(RateLimiter::new(&config.rate_limit, store, clock));
            pipeline = pipeline.with_shared_stage(limiter.clone());
            Some(limiter)
        } else {
            None
        };

        let pipeline =
            pipeline.with_stage(SchemaValidator::new(&config.validation, max_body_bytes));

        Self {
            pipeline,
            rate_limiter,
            max_body_bytes,
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<ArcSwap<Gate>>,
    pub handler: Arc<dyn IngestHandler>,
}

/// HTTP server for the ingestion gate.
pub struct GateServer {
    config: GateConfig,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    state: AppState,
}

impl GateServer {
    /// Create a server that charges `store` and acknowledges payloads with
    /// [`AcceptingHandler`].
    pub fn new(config: GateConfig, store: Arc<dyn CounterStore>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let gate = Gate::from_config(&config, store.clone(), clock.clone());

        tracing::info!(
            stages = ?gate.pipeline.stage_names(),
            ingest_path = %config.listener.ingest_path,
            "Pipeline configured"
        );

        Self {
            state: AppState {
                gate: Arc::new(ArcSwap::from_pointee(gate)),
                handler: Arc::new(AcceptingHandler),
            },
            config,
            store,
            clock,
        }
    }

    /// Replace the downstream handler.
    pub fn with_handler<H: IngestHandler + 'static>(mut self, handler: H) -> Self {
        self.state.handler = Arc::new(handler);
        self
    }

    /// Replace the clock used for window arithmetic.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.state.gate.store(Arc::new(Gate::from_config(
            &self.config,
            self.store.clone(),
            self.clock.clone(),
        )));
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let ingest_path = self.config.listener.ingest_path.as_str();

        Router::new()
            .route(ingest_path, post(ingest_handler))
            .route(&format!("{}/quota", ingest_path), get(quota_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server on `listener` until `shutdown` fires.
    ///
    /// Every config received on `config_updates` rebuilds the pipeline
    /// around the same counter store.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(apply_config_updates(
            config_updates,
            shutdown.resubscribe(),
            self.state.gate.clone(),
            self.config.listener.ingest_path.clone(),
            self.store.clone(),
            self.clock.clone(),
        ));

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_config_updates(
    mut updates: mpsc::UnboundedReceiver<GateConfig>,
    mut shutdown: broadcast::Receiver<()>,
    gate: Arc<ArcSwap<Gate>>,
    ingest_path: String,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                if config.listener.ingest_path != ingest_path {
                    tracing::warn!(
                        running = %ingest_path,
                        requested = %config.listener.ingest_path,
                        "ingest_path changes need a restart; keeping the running route"
                    );
                }
                let rebuilt = Gate::from_config(&config, store.clone(), clock.clone());
                tracing::info!(stages = ?rebuilt.pipeline.stage_names(), "Pipeline reloaded");
                gate.store(Arc::new(rebuilt));
                metrics::record_config_reload();
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Peer address when served with connect info.
fn peer_ip(request: &Request<Body>) -> Option<std::net::IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// `POST {ingest_path}`: gate, then hand off.
async fn ingest_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let gate = state.gate.load_full();
    let peer = peer_ip(&request);
    let (parts, body) = request.into_parts();
    let req = AxumRequest::new(parts.headers, body, peer, gate.max_body_bytes);

    match gate.pipeline.run(&req).await {
        Ok(ctx) => {
            let rate_limit = ctx.rate_limit;
            let mut response = state.handler.handle(ctx).await;
            if let Some(info) = rate_limit {
                apply_rate_limit_headers(response.headers_mut(), &info);
            }
            metrics::record_accepted(response.status().as_u16());
            response
        }
        Err(rejection) => rejection.into_response(),
    }
}

/// `GET {ingest_path}/quota`: the caller's budget, without charging it.
async fn quota_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let gate = state.gate.load_full();
    let Some(limiter) = gate.rate_limiter.clone() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Not Found", "message": "Rate limiting is disabled"})),
        )
            .into_response();
    };

    let peer = peer_ip(&request);
    let (parts, _) = request.into_parts();
    let req = AxumRequest::new(parts.headers, Body::empty(), peer, 0);

    match limiter.status(&req).await {
        Ok(info) => {
            let mut response = Json(info).into_response();
            apply_rate_limit_headers(response.headers_mut(), &info);
            response
        }
        Err(e) => {
            tracing::warn!(error = %e, "Quota lookup failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "Service Unavailable", "message": "Rate limiter unavailable"})),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

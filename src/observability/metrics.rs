//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): finished requests by outcome and status
//! - `gate_pipeline_duration_seconds` (histogram): time spent in the pipeline
//! - `gate_stage_faults_total` (counter): unexpected stage faults by stage
//! - `gate_rate_limited_total` (counter): 429 decisions
//! - `gate_store_failures_total` (counter): counter store outages by policy
//! - `gate_config_reloads_total` (counter): applied hot reloads

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::FailurePolicy;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Prometheus exporter listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter");
        }
    }
}

fn describe() {
    describe_counter!("gate_requests_total", "Finished ingestion requests");
    describe_histogram!("gate_pipeline_duration_seconds", "Time spent in the gating pipeline");
    describe_counter!("gate_stage_faults_total", "Unexpected stage faults");
    describe_counter!("gate_rate_limited_total", "Requests rejected by the rate limiter");
    describe_counter!("gate_store_failures_total", "Counter store failures");
    describe_counter!("gate_config_reloads_total", "Applied configuration reloads");
}

/// A stage ended the pipeline with a deliberate rejection.
pub fn record_rejection(stage: &'static str, status: u16) {
    counter!(
        "gate_requests_total",
        "outcome" => "rejected",
        "stage" => stage,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Every stage proceeded and the handler answered.
pub fn record_accepted(status: u16) {
    counter!(
        "gate_requests_total",
        "outcome" => "accepted",
        "stage" => "handler",
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_stage_fault(stage: &'static str) {
    counter!("gate_stage_faults_total", "stage" => stage).increment(1);
    counter!(
        "gate_requests_total",
        "outcome" => "fault",
        "stage" => stage,
        "status" => "500"
    )
    .increment(1);
}

pub fn record_pipeline_duration(start: Instant) {
    histogram!("gate_pipeline_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gate_rate_limited_total").increment(1);
}

pub fn record_store_failure(policy: FailurePolicy) {
    counter!("gate_store_failures_total", "policy" => policy.as_str()).increment(1);
}

pub fn record_config_reload() {
    counter!("gate_config_reloads_total").increment(1);
}

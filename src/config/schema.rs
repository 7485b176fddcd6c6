//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::security::limits::DEFAULT_MAX_BODY_BYTES;

/// Root configuration for the ingestion gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, routes).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Payload size limits.
    pub limits: LimitsConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Payload schemas.
    pub validation: ValidationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path of the ingestion endpoint.
    pub ingest_path: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            ingest_path: "/api/ingest".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Payload size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum body size in bytes, declared or streamed.
    pub max_body_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// What the rate limiter does when its counter store cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Admit the request and log the outage.
    #[default]
    Open,
    /// Reject with 503.
    Closed,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Open => "open",
            FailurePolicy::Closed => "closed",
        }
    }
}

/// Counter store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process map; single instance only.
    #[default]
    Memory,
    /// Redis; shared across instances. Needs the `redis` feature.
    Redis,
}

/// Counter store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Connection URL for networked backends.
    pub url: Option<String>,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Requests allowed per key per window.
    pub max_requests: u64,

    /// Prefix scoping keys to this route (`{prefix}:{ip}`).
    pub key_prefix: String,

    /// Behaviour when the counter store is unreachable.
    pub failure_policy: FailurePolicy,

    /// Deadline for one counter store round-trip in milliseconds.
    pub store_timeout_ms: u64,

    /// How often the in-memory store drops expired windows.
    pub sweep_interval_secs: u64,

    /// Use the left-most X-Forwarded-For entry when the peer is trusted.
    pub trust_forwarded_for: bool,

    /// Proxies whose X-Forwarded-For is believed.
    pub trusted_proxies: Vec<IpAddr>,

    pub store: StoreConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_requests: 100,
            key_prefix: "ingest".to_string(),
            failure_policy: FailurePolicy::Open,
            store_timeout_ms: 250,
            sweep_interval_secs: 30,
            trust_forwarded_for: false,
            trusted_proxies: Vec::new(),
            store: StoreConfig::default(),
        }
    }
}

/// Rules for one payload type.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct SchemaConfig {
    /// Fields that must be present and non-null.
    pub required: Vec<String>,

    /// Fields that, when present, must be numbers >= 0.
    pub non_negative: Vec<String>,
}

/// Payload validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Field carrying the payload type tag.
    pub tag_field: String,

    /// Schemas keyed by payload type.
    pub schemas: BTreeMap<String, SchemaConfig>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let mut schemas = BTreeMap::new();
        schemas.insert(
            "campaign".to_string(),
            SchemaConfig {
                required: vec!["campaign_id".into(), "name".into(), "sent_at".into()],
                non_negative: Vec::new(),
            },
        );

        let counters: Vec<String> = ["sent", "delivered", "opens", "clicks"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut kpi_required = vec!["campaign_id".to_string()];
        kpi_required.extend(counters.iter().cloned());
        schemas.insert(
            "kpi".to_string(),
            SchemaConfig {
                required: kpi_required,
                non_negative: counters,
            },
        );

        Self {
            tag_field: "type".to_string(),
            schemas,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

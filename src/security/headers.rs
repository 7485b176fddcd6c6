//! Client identity for rate limiting.
//!
//! # Responsibilities
//! - Resolve the client IP a request is charged against
//! - Honour `X-Forwarded-For` only from trusted proxies
//!
//! # Design Decisions
//! - Never trust existing X-Forwarded-* from untrusted sources
//! - Left-most forwarded entry is the original client
//! - Requests with no resolvable address share one key

use std::net::IpAddr;

use crate::pipeline::GateRequest;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Maps a request to the identity its budget is tracked under.
#[derive(Debug, Clone, Default)]
pub struct ClientKeyResolver {
    trust_forwarded_for: bool,
    trusted_proxies: Vec<IpAddr>,
}

impl ClientKeyResolver {
    pub fn new(trust_forwarded_for: bool, trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            trust_forwarded_for,
            trusted_proxies,
        }
    }

    /// The client address after proxy resolution.
    pub fn client_ip(&self, req: &dyn GateRequest) -> Option<IpAddr> {
        let peer = req.client_addr();

        if self.trust_forwarded_for && peer.is_some_and(|p| self.trusted_proxies.contains(&p)) {
            let forwarded = req
                .header(X_FORWARDED_FOR)
                .and_then(|v| v.split(',').next())
                .and_then(|first| first.trim().parse::<IpAddr>().ok());
            if forwarded.is_some() {
                return forwarded;
            }
        }

        peer
    }

    /// Rate-limit key: `{prefix}:{ip}`, or `{prefix}:unknown`.
    pub fn key(&self, prefix: &str, req: &dyn GateRequest) -> String {
        match self.client_ip(req) {
            Some(ip) => format!("{}:{}", prefix, ip),
            None => format!("{}:unknown", prefix),
        }
    }
}

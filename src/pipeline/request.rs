//! Framework-neutral view of an incoming request.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use axum::body::Bytes;

/// Failure to obtain the request body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BodyError {
    /// The streamed body grew past the configured ceiling.
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    /// The transport failed while reading (client abort, reset, ...).
    #[error("failed to read request body: {0}")]
    Read(String),
}

/// What a stage may look at. Adapters for concrete servers implement this.
#[async_trait]
pub trait GateRequest: Send + Sync {
    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    fn header(&self, name: &str) -> Option<&str>;

    /// Transport peer address, if known.
    fn client_addr(&self) -> Option<IpAddr>;

    /// The request body. Implementations may read it lazily; repeated calls
    /// return the same bytes.
    async fn body(&self) -> Result<Bytes, BodyError>;
}

/// In-memory request, fully buffered.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    headers: HashMap<String, String>,
    client_addr: Option<IpAddr>,
    body: Bytes,
}

impl InboundRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_client_addr(mut self, addr: IpAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

#[async_trait]
impl GateRequest for InboundRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn client_addr(&self) -> Option<IpAddr> {
        self.client_addr
    }

    async fn body(&self) -> Result<Bytes, BodyError> {
        Ok(self.body.clone())
    }
}

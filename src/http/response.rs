//! Response shaping.
//!
//! # Responsibilities
//! - Turn pipeline rejections into JSON responses
//! - Attach `X-RateLimit-*` headers to admitted requests
//! - Answer handler panics with the same generic 500 as stage faults

use std::any::Any;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Json, Response};

use crate::pipeline::{RateLimitInfo, Rejection};
use crate::security::rate_limit::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET};

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

/// Add the three `X-RateLimit-*` headers.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    for (name, value) in [
        (X_RATELIMIT_LIMIT, info.limit),
        (X_RATELIMIT_REMAINING, info.remaining),
        (X_RATELIMIT_RESET, info.reset),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }
}

/// `CatchPanicLayer` hook for panics outside the pipeline (handlers).
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    tracing::error!(panic = %detail, "Handler panicked");
    Rejection::internal_error().into_response()
}

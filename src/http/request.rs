//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4)
//! - Resolve the URL to fetch from the request target
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Absolute-form targets (`GET http://host/path`) are used directly
//! - Origin-form targets must embed an absolute URL (`GET /http://host/path`)
//! - Only http and https origins are fetched

use axum::http::{HeaderMap, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

use crate::http::error::ProxyError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the request ID set by the middleware.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Work out which URL the client asked for.
pub fn resolve_target(uri: &Uri) -> Result<Url, ProxyError> {
    let candidate = if uri.scheme().is_some() {
        uri.to_string()
    } else {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        path_and_query.trim_start_matches('/').to_string()
    };

    let url = Url::parse(&candidate)
        .map_err(|e| ProxyError::InvalidTarget(format!("'{uri}': {e}")))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        scheme => Err(ProxyError::InvalidTarget(format!(
            "'{uri}': unsupported scheme '{scheme}'"
        ))),
    }
}

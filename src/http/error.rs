//! Request failure kinds and their client-facing responses.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::error_response;

/// Everything that can stop a request short of relaying the rewritten page.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("invalid request target: {0}")]
    InvalidTarget(String),

    /// Transport failure reaching the origin (refused, DNS, TLS, reset).
    #[error("upstream {url} unreachable: {source}")]
    UpstreamUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream {url} timed out after {secs}s")]
    UpstreamTimeout { url: String, secs: u64 },

    /// The origin answered with a 4xx or 5xx.
    #[error("upstream {url} returned {status} {reason}")]
    UpstreamError {
        url: String,
        status: StatusCode,
        reason: String,
    },

    /// No in-flight slot freed up within `listener.queue_timeout_secs`.
    #[error("proxy busy, no slot free after {0}s")]
    Overloaded(u64),

    #[error("{0}")]
    ParseFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamError { status, .. } => *status,
            ProxyError::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::ParseFailure(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Reason phrase for the status line. Origin errors keep the origin's.
    pub fn reason(&self) -> String {
        match self {
            ProxyError::UpstreamError { reason, .. } if !reason.is_empty() => reason.clone(),
            _ => self
                .status()
                .canonical_reason()
                .unwrap_or("Proxy Error")
                .to_string(),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MethodNotAllowed(_) => "method_not_allowed",
            ProxyError::InvalidTarget(_) => "invalid_target",
            ProxyError::UpstreamUnreachable { .. } => "upstream_unreachable",
            ProxyError::UpstreamTimeout { .. } => "upstream_timeout",
            ProxyError::UpstreamError { .. } => "upstream_error",
            ProxyError::Overloaded(_) => "overloaded",
            ProxyError::ParseFailure(_) => "parse_failure",
            ProxyError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = error_response(self.status(), &self.reason(), &self.to_string());
        if matches!(self, ProxyError::MethodNotAllowed(_)) {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET"));
        }
        response
    }
}

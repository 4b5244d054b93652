//! Per-request proxy state machine.
//!
//! # State Transitions
//! ```text
//! Received → Fetching:       GET with a resolvable target
//! Fetching → Transforming:   origin answered 1xx-3xx
//! Transforming → Responding: body rewritten (or relayed as-is)
//! Responding → Done:         envelope handed to the server
//! any → Failed:              error response written, failure logged
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, Request, Uri};
use axum::response::{IntoResponse, Response};
use tokio::sync::OwnedSemaphorePermit;

use crate::config::ParseFailurePolicy;
use crate::http::client::OriginResponse;
use crate::http::error::ProxyError;
use crate::http::headers::{is_encoded, is_markup, relabel_utf8};
use crate::http::request::{request_id, resolve_target};
use crate::http::response::ResponseEnvelope;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Fetching,
    Transforming,
    Responding,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Fetching => "fetching",
            Stage::Transforming => "transforming",
            Stage::Responding => "responding",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks one request through its stages.
struct Exchange {
    request_id: String,
    target: Option<String>,
    stage: Stage,
}

impl Exchange {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            target: None,
            stage: Stage::Received,
        }
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(
            request_id = %self.request_id,
            from = %self.stage,
            to = %next,
            "Stage transition"
        );
        self.stage = next;
    }
}

/// How the body left the transforming stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyOutcome {
    Rewritten,
    NotMarkup,
    /// Still in a content coding the origin client could not undo.
    Encoded,
    ParseFallback,
}

/// Entry point for every proxied request.
pub async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let (parts, _body) = request.into_parts();
    let method = parts.method;
    let mut exchange = Exchange::new(request_id(&parts.headers));

    tracing::debug!(
        request_id = %exchange.request_id,
        peer = %peer,
        method = %method,
        uri = %parts.uri,
        "Request received"
    );

    match relay(&state, &mut exchange, &method, &parts.uri).await {
        Ok(envelope) => {
            exchange.advance(Stage::Done);
            metrics::record_request(method.as_str(), envelope.status.as_u16(), "relayed", start_time);
            tracing::info!(
                request_id = %exchange.request_id,
                url = exchange.target.as_deref().unwrap_or("-"),
                status = envelope.status.as_u16(),
                bytes = envelope.body.len(),
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "Response relayed"
            );
            envelope.into_response()
        }
        Err(err) => {
            let failed_in = exchange.stage;
            exchange.advance(Stage::Failed);
            let status = err.status();
            if status.is_server_error() {
                tracing::error!(
                    request_id = %exchange.request_id,
                    url = exchange.target.as_deref().unwrap_or("-"),
                    stage = %failed_in,
                    kind = err.kind(),
                    status = status.as_u16(),
                    error = %err,
                    "Request failed"
                );
            } else {
                tracing::warn!(
                    request_id = %exchange.request_id,
                    url = exchange.target.as_deref().unwrap_or("-"),
                    stage = %failed_in,
                    kind = err.kind(),
                    status = status.as_u16(),
                    error = %err,
                    "Request rejected"
                );
            }
            metrics::record_request(method.as_str(), status.as_u16(), err.kind(), start_time);
            err.into_response()
        }
    }
}

async fn relay(
    state: &AppState,
    exchange: &mut Exchange,
    method: &Method,
    uri: &Uri,
) -> Result<ResponseEnvelope, ProxyError> {
    if *method != Method::GET {
        return Err(ProxyError::MethodNotAllowed(method.clone()));
    }
    let _permit = acquire_permit(state).await?;
    let url = resolve_target(uri)?;
    exchange.target = Some(url.to_string());

    exchange.advance(Stage::Fetching);
    let origin = state.origin.fetch(&url).await?;
    if origin.status.is_client_error() || origin.status.is_server_error() {
        return Err(ProxyError::UpstreamError {
            url: url.to_string(),
            status: origin.status,
            reason: origin.reason_text(),
        });
    }

    exchange.advance(Stage::Transforming);
    let OriginResponse {
        status,
        reason,
        headers,
        body,
    } = origin;
    let (body, outcome) = render_body(state, exchange, &headers, body)?;

    exchange.advance(Stage::Responding);
    let headers = match outcome {
        BodyOutcome::Rewritten => {
            let mut headers = state.header_filter.filter(&headers);
            relabel_utf8(&mut headers);
            headers
        }
        BodyOutcome::Encoded => state.header_filter.filter_encoded(&headers),
        BodyOutcome::NotMarkup | BodyOutcome::ParseFallback => state.header_filter.filter(&headers),
    };

    Ok(ResponseEnvelope {
        status,
        reason,
        headers,
        body,
    })
}

/// Wait for an in-flight slot, giving up after the queue timeout.
async fn acquire_permit(state: &AppState) -> Result<OwnedSemaphorePermit, ProxyError> {
    match tokio::time::timeout(state.queue_timeout, state.permits.clone().acquire_owned()).await {
        Ok(Ok(permit)) => Ok(permit),
        Ok(Err(_)) => Err(ProxyError::Internal("request limiter closed".to_string())),
        Err(_) => Err(ProxyError::Overloaded(state.queue_timeout.as_secs())),
    }
}

/// Rewrite markup bodies; relay everything else unchanged. The parsed
/// document never outlives this call.
fn render_body(
    state: &AppState,
    exchange: &Exchange,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<(Bytes, BodyOutcome), ProxyError> {
    if is_encoded(headers) {
        tracing::debug!(request_id = %exchange.request_id, "Body still encoded, relaying unchanged");
        return Ok((body, BodyOutcome::Encoded));
    }
    if !is_markup(headers) {
        tracing::debug!(request_id = %exchange.request_id, "Body is not markup, relaying unchanged");
        return Ok((body, BodyOutcome::NotMarkup));
    }

    match state.transformer.transform_bytes(&body) {
        Ok(document) => {
            let stats = document.stats();
            metrics::record_rewrite(stats.elements, stats.decorations);
            tracing::debug!(
                request_id = %exchange.request_id,
                elements = stats.elements,
                decorations = stats.decorations,
                "Body rewritten"
            );
            Ok((Bytes::from(document.to_html()), BodyOutcome::Rewritten))
        }
        Err(e) => match state.parse_failure_policy {
            ParseFailurePolicy::Passthrough => {
                metrics::record_parse_fallback();
                tracing::warn!(
                    request_id = %exchange.request_id,
                    url = exchange.target.as_deref().unwrap_or("-"),
                    error = %e,
                    "Parse failed, relaying original body"
                );
                Ok((body, BodyOutcome::ParseFallback))
            }
            ParseFailurePolicy::Error => Err(ProxyError::ParseFailure(e.to_string())),
        },
    }
}

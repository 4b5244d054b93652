//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared state (origin client, transformer, header filter)
//! - Create the Axum router with the proxy handler as fallback
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::InvalidHeaderName;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ParseFailurePolicy, ProxyConfig};
use crate::http::client::OriginClient;
use crate::http::handler::proxy_handler;
use crate::http::headers::HeaderFilter;
use crate::http::request::UuidRequestId;
use crate::rewrite::{ContentTransformer, DecorationSequencer, RewriteError, TagSet, TextRewriter};

/// Grace period on top of the origin timeout before the router gives up.
const ROUTER_TIMEOUT_SLACK_SECS: u64 = 5;

/// Errors building the server from configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("rewrite setup failed: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("invalid header deny-list: {0}")]
    HeaderPolicy(#[from] InvalidHeaderName),

    #[error("failed to build origin client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub origin: Arc<OriginClient>,
    pub transformer: Arc<ContentTransformer>,
    pub header_filter: Arc<HeaderFilter>,
    pub parse_failure_policy: ParseFailurePolicy,
    /// Caps requests in flight at `listener.max_connections`.
    pub permits: Arc<Semaphore>,
    /// How long a request waits for a permit.
    pub queue_timeout: Duration,
}

impl AppState {
    pub fn from_config(
        config: &ProxyConfig,
        sequencer: Arc<DecorationSequencer>,
    ) -> Result<Self, ServerError> {
        let rewriter = TextRewriter::new(sequencer);
        let tags = TagSet::new(config.rewrite.tags.iter().copied());
        Ok(Self {
            origin: Arc::new(OriginClient::new(&config.upstream)?),
            transformer: Arc::new(ContentTransformer::new(tags, rewriter)),
            header_filter: Arc::new(HeaderFilter::new(config.headers.deny_list.as_slice())?),
            parse_failure_policy: config.rewrite.on_parse_failure,
            permits: Arc::new(Semaphore::new(config.listener.max_connections)),
            queue_timeout: Duration::from_secs(config.listener.queue_timeout_secs),
        })
    }
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    sequencer: Arc<DecorationSequencer>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let sequencer = Arc::new(DecorationSequencer::new(config.rewrite.decorations.clone())?);
        let state = AppState::from_config(&config, sequencer.clone())?;
        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            sequencer,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let timeout = Duration::from_secs(config.upstream.request_timeout_secs + ROUTER_TIMEOUT_SLACK_SECS);
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(TimeoutLayer::new(timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            tags = ?self.config.rewrite.tags,
            decorations = ?self.config.rewrite.decorations,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!(
            decorations_issued = self.sequencer.issued(),
            "HTTP server stopped"
        );
        Ok(())
    }

    /// A clone of the router, for driving the proxy without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The process-wide decoration cursor shared by every request.
    pub fn sequencer(&self) -> &Arc<DecorationSequencer> {
        &self.sequencer
    }
}

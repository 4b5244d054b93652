//! Origin fetch.
//!
//! # Responsibilities
//! - Issue the outbound GET for a resolved target
//! - Enforce connect and total timeouts
//! - Separate transport failures from HTTP-level statuses
//!
//! # Design Decisions
//! - gzip, brotli and deflate bodies are decoded before they reach the
//!   transformer; other encodings arrive with `Content-Encoding` still set
//! - At the redirect limit the last 3xx is returned, not an error
//! - System proxy settings are ignored; the proxy never chains itself
//! - The body is buffered in full: rewriting needs the whole document

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use hyper::ext::ReasonPhrase;
use reqwest::redirect::Policy;
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::error::ProxyError;

/// A fully buffered origin response.
#[derive(Debug)]
pub struct OriginResponse {
    pub status: StatusCode,
    /// Set only when the origin sent a non-canonical phrase.
    pub reason: Option<ReasonPhrase>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OriginResponse {
    /// Reason phrase as text, falling back to the canonical one.
    pub fn reason_text(&self) -> String {
        match &self.reason {
            Some(reason) => String::from_utf8_lossy(reason.as_bytes()).into_owned(),
            None => self.status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}

/// HTTP client used to reach origins.
#[derive(Debug, Clone)]
pub struct OriginClient {
    inner: reqwest::Client,
    request_timeout_secs: u64,
}

impl OriginClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(redirect_policy(config.max_redirects))
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()?;

        Ok(Self {
            inner,
            request_timeout_secs: config.request_timeout_secs,
        })
    }

    /// GET `url` and buffer the response. Any status is returned as-is;
    /// only transport problems are errors here.
    pub async fn fetch(&self, url: &Url) -> Result<OriginResponse, ProxyError> {
        let response = self
            .inner
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        let reason = response.extensions().get::<ReasonPhrase>().cloned();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        Ok(OriginResponse {
            status,
            reason,
            headers,
            body,
        })
    }

    fn transport_error(&self, url: &Url, error: reqwest::Error) -> ProxyError {
        if error.is_timeout() {
            ProxyError::UpstreamTimeout {
                url: url.to_string(),
                secs: self.request_timeout_secs,
            }
        } else {
            ProxyError::UpstreamUnreachable {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

/// Follow up to `max` redirects, then hand back the 3xx itself.
fn redirect_policy(max: usize) -> Policy {
    Policy::custom(move |attempt| {
        // `previous` starts with the original URL.
        if attempt.previous().len() > max {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OriginClient::new(&UpstreamConfig::default()).unwrap();
        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let err = client.fetch(&url).await.unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamUnreachable { .. }));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_redirect_limit_returns_last_redirect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let reply = "HTTP/1.1 302 Found\r\nLocation: /next\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });

        let config = UpstreamConfig {
            max_redirects: 0,
            ..UpstreamConfig::default()
        };
        let client = OriginClient::new(&config).unwrap();
        let url = Url::parse(&format!("http://{addr}/start")).unwrap();
        let response = client.fetch(&url).await.unwrap();
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.headers["location"], "/next");
    }

    #[test]
    fn test_reason_text_falls_back_to_canonical() {
        let response = OriginResponse {
            status: StatusCode::NOT_FOUND,
            reason: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        assert_eq!(response.reason_text(), "Not Found");
    }
}

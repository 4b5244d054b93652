//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::rewrite::TextTag;

/// Root configuration for the rewriting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Which elements are rewritten and with what symbols.
    pub rewrite: RewriteConfig,

    /// Response header policy.
    pub headers: HeaderPolicyConfig,

    /// Origin fetch settings.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Maximum requests handled at once (backpressure).
    pub max_connections: usize,

    /// Seconds a request may wait for a free slot before 503.
    pub queue_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: 1024,
            queue_timeout_secs: 10,
        }
    }
}

/// What to do when a fetched page cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParseFailurePolicy {
    /// Relay the original body untransformed.
    #[default]
    Passthrough,
    /// Answer with 500 Internal Server Error.
    Error,
}

/// Rewrite settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Elements whose text is decorated.
    pub tags: Vec<TextTag>,

    /// Decoration symbols, handed out in order and repeated forever.
    pub decorations: Vec<String>,

    pub on_parse_failure: ParseFailurePolicy,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            tags: TextTag::ALL.to_vec(),
            decorations: vec!["😀".to_string(), "😍".to_string(), "😈".to_string()],
            on_parse_failure: ParseFailurePolicy::Passthrough,
        }
    }
}

/// Response header policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderPolicyConfig {
    /// Origin headers never relayed (matched case-insensitively).
    /// `Content-Encoding` is removed even if absent from this list.
    pub deny_list: Vec<String>,
}

impl Default for HeaderPolicyConfig {
    fn default() -> Self {
        Self {
            deny_list: vec![
                "Content-Encoding".to_string(),
                "Content-Length".to_string(),
                "Transfer-Encoding".to_string(),
                "Connection".to_string(),
            ],
        }
    }
}

/// Origin fetch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total time allowed for the origin round trip, in seconds.
    pub request_timeout_secs: u64,

    /// Redirects followed; past this the last 3xx is relayed as-is.
    pub max_redirects: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            max_redirects: 10,
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
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.rewrite.decorations, vec!["😀", "😍", "😈"]);
        assert_eq!(config.rewrite.tags.len(), 10);
        assert!(config
            .headers
            .deny_list
            .iter()
            .any(|h| h.eq_ignore_ascii_case("content-encoding")));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "0.0.0.0:3128"

            [rewrite]
            tags = ["p", "li"]
            decorations = ["★"]
            on_parse_failure = "error"
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:3128");
        assert_eq!(config.listener.max_connections, 1024);
        assert_eq!(config.rewrite.tags, vec![TextTag::P, TextTag::Li]);
        assert_eq!(config.rewrite.on_parse_failure, ParseFailurePolicy::Error);
        assert_eq!(config.upstream.request_timeout_secs, 30);
    }
}

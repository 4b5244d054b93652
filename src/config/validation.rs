//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject decorations the word pattern could match
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::rewrite::text::contains_word_char;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("rewrite.tags must not be empty")]
    NoTags,

    #[error("rewrite.decorations must not be empty")]
    NoDecorations,

    #[error("decoration {0:?} is empty or contains word characters")]
    InvalidDecoration(String),

    #[error("headers.deny_list entry '{0}' is not a valid header name")]
    InvalidHeaderName(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.listener.queue_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("listener.queue_timeout_secs"));
    }

    if config.rewrite.tags.is_empty() {
        errors.push(ValidationError::NoTags);
    }
    if config.rewrite.decorations.is_empty() {
        errors.push(ValidationError::NoDecorations);
    }
    for symbol in &config.rewrite.decorations {
        if symbol.trim().is_empty() || contains_word_char(symbol) {
            errors.push(ValidationError::InvalidDecoration(symbol.clone()));
        }
    }

    for name in &config.headers.deny_list {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(name.clone()));
        }
    }

    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream.connect_timeout_secs"));
    }
    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream.request_timeout_secs"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

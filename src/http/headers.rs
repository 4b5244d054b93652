//! Response header sanitization.
//!
//! # Responsibilities
//! - Drop origin headers the rewritten body would contradict
//! - Decide from Content-Type whether a body is markup
//! - Relabel the charset of re-serialized bodies
//!
//! # Design Decisions
//! - `Content-Encoding` is denied for decoded bodies; a body still in an
//!   encoding the client cannot undo keeps its label and is never rewritten
//! - Retained headers keep their relative order and repeated values
//! - Content-Length is recomputed by the response writer, never relayed

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderName};

/// Removes deny-listed headers from an origin response.
#[derive(Debug, Clone)]
pub struct HeaderFilter {
    deny: Vec<HeaderName>,
}

impl HeaderFilter {
    /// Build a filter from configured names. Header names are
    /// case-insensitive, so `content-encoding` and `CONTENT-ENCODING` are the
    /// same entry.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, InvalidHeaderName> {
        let mut deny = vec![header::CONTENT_ENCODING];
        for name in names {
            let name = HeaderName::from_bytes(name.as_ref().as_bytes())?;
            if !deny.contains(&name) {
                deny.push(name);
            }
        }
        Ok(Self { deny })
    }

    pub fn denies(&self, name: &HeaderName) -> bool {
        self.deny.contains(name)
    }

    pub fn filter(&self, headers: &HeaderMap) -> HeaderMap {
        self.filter_except(headers, None)
    }

    /// Filter headers for a body relayed in its original encoding.
    pub fn filter_encoded(&self, headers: &HeaderMap) -> HeaderMap {
        self.filter_except(headers, Some(&header::CONTENT_ENCODING))
    }

    fn filter_except(&self, headers: &HeaderMap, keep: Option<&HeaderName>) -> HeaderMap {
        let mut kept = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            if Some(name) == keep || !self.denies(name) {
                kept.append(name.clone(), value.clone());
            }
        }
        kept
    }
}

/// True when the body still carries a content coding, i.e. the client
/// did not decode it.
pub fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CONTENT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|coding| !coding.is_empty() && !coding.eq_ignore_ascii_case("identity"))
}

/// True when the body should go through the content transformer. Responses
/// that do not declare a type are treated as HTML.
pub fn is_markup(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return true;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    let essence = value.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("text/html") || essence.eq_ignore_ascii_case("application/xhtml+xml")
}

/// Make a declared charset agree with a body re-serialized as UTF-8.
pub fn relabel_utf8(headers: &mut HeaderMap) {
    let Some(value) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return;
    };
    let mut parts = value.split(';').map(str::trim);
    let essence = parts.next().unwrap_or_default().to_string();
    let declares_other = parts.any(|param| {
        param
            .split_once('=')
            .is_some_and(|(key, charset)| {
                key.trim().eq_ignore_ascii_case("charset")
                    && !charset.trim().trim_matches('"').eq_ignore_ascii_case("utf-8")
            })
    });
    if declares_other {
        if let Ok(relabelled) = HeaderValue::from_str(&format!("{essence}; charset=utf-8")) {
            headers.insert(header::CONTENT_TYPE, relabelled);
        }
    }
}

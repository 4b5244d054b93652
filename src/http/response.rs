//! Response envelopes relayed to the client.
//!
//! # Responsibilities
//! - Carry status, reason phrase, filtered headers and final body
//! - Recompute Content-Length from the body actually sent
//! - Render well-formed error pages for every failure
//!
//! # Design Decisions
//! - Non-canonical origin reason phrases are preserved on the status line
//! - Error pages are small HTML documents with the failure detail escaped

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper::ext::ReasonPhrase;

/// Everything written back to the client for one request.
#[derive(Debug)]
pub struct ResponseEnvelope {
    pub status: StatusCode,
    pub reason: Option<ReasonPhrase>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let length = self.body.len();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        if let Some(reason) = self.reason {
            response.extensions_mut().insert(reason);
        }
        response
    }
}

/// Build an HTML error response with `reason` on the status line.
pub fn error_response(status: StatusCode, reason: &str, detail: &str) -> Response {
    let code = status.as_u16();
    let reason = if reason.trim().is_empty() {
        status.canonical_reason().unwrap_or("Proxy Error")
    } else {
        reason
    };
    let body = format!(
        "<!DOCTYPE html>\n<html><head><title>{code} {title}</title></head>\
         <body><h1>{code} {title}</h1><p>{detail}</p></body></html>\n",
        title = escape(reason),
        detail = escape(detail),
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    let custom_reason = (status.canonical_reason() != Some(reason))
        .then(|| ReasonPhrase::try_from(reason.as_bytes()).ok())
        .flatten();

    ResponseEnvelope {
        status,
        reason: custom_reason,
        headers,
        body: Bytes::from(body),
    }
    .into_response()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_envelope_sets_content_length() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        let response = ResponseEnvelope {
            status: StatusCode::OK,
            reason: None,
            headers,
            body: Bytes::from("<li>Banana 😍</li>"),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "20");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], "<li>Banana 😍</li>".as_bytes());
    }

    #[tokio::test]
    async fn test_error_page_escapes_detail() {
        let response = error_response(
            StatusCode::BAD_GATEWAY,
            "Bad Gateway",
            "upstream http://a/?x=<b> unreachable",
        );
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.extensions().get::<ReasonPhrase>().is_none());
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("<h1>502 Bad Gateway</h1>"));
        assert!(body.contains("x=&lt;b&gt;"));
    }

    #[test]
    fn test_custom_reason_kept() {
        let response = error_response(StatusCode::NOT_FOUND, "Gone Fishing", "nope");
        let reason = response.extensions().get::<ReasonPhrase>().unwrap();
        assert_eq!(reason.as_bytes(), b"Gone Fishing");
    }
}

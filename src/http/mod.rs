//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, resolve target URL)
//!     → handler.rs (state machine)
//!     → client.rs (fetch from origin)
//!     → rewrite (transform markup)
//!     → headers.rs (drop headers the new body contradicts)
//!     → response.rs (envelope, Content-Length)
//!     → Send to client
//! ```

pub mod client;
pub mod error;
pub mod handler;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use error::ProxyError;
pub use headers::HeaderFilter;
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};

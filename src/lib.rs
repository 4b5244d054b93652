//! Forward HTTP proxy that decorates six-letter words in relayed pages.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

//! µLink edge service library.
//!
//! Serves embedded static assets, echoes the caller's observed address on
//! `/hello` and exposes metrics on `/api/monitor` to local callers only.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::EdgeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (preflight handling, CORS response headers)
//!     → headers.rs (hardening response headers)
//!     → address.rs (peer address + forwarded chain)
//!     → rate_limit.rs (per-client window, `/hello` only)
//!     → local_access.rs (peer allow-list, `/api/monitor` only)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Forwarded headers are informational; authorization reads the peer only
//! - Fail closed: reject on any security check failure

pub mod address;
pub mod cors;
pub mod headers;
pub mod local_access;
pub mod rate_limit;

pub use address::{resolve_address, ClientAddrs};
pub use local_access::{AccessDenied, AccessPolicy, Decision, LocalAccessGuard, TrustedAddress};
pub use rate_limit::RateLimiter;

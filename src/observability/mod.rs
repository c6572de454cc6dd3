//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, per-request access spans)
//!     → metrics.rs (counters, histograms, request stats)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → /api/monitor (Prometheus text or JSON snapshot)
//! ```

pub mod logging;
pub mod metrics;

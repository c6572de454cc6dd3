//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, client address extraction)
//!     → handlers.rs (/hello, /api/monitor)
//!     → assets.rs (embedded static files, favicon)
//!     → Send to client
//! ```

pub mod assets;
pub mod handlers;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer};

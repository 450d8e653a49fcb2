//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, connect info)
//!     → request.rs (request id)
//!     → middleware/access_control.rs (gate verdict)
//!         denied  → 403 Forbidden
//!         allowed → server.rs forward handler → upstream application
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;

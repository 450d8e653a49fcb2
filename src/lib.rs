//! IP allow-list gate for an administrative web interface.

pub mod access;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use access::{AccessGate, AllowList, PathExemptionSet, RequestContext, Verdict};
pub use config::GateConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

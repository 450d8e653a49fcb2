//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! access gate, http layer, config watcher produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (decision counters, allow-list gauges)
//!
//! Consumers:
//!     → stderr (fmt layer, filtered by EnvFilter)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - Metric calls are no-ops until a recorder is installed, so tests need no setup

pub mod logging;
pub mod metrics;

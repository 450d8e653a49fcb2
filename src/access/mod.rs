//! IP access-control subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     allowed_hosts string
//!     → allow_list.rs (split, parse each token via matcher.rs)
//!     → gate.rs (AccessGate holds the list behind an atomic swap)
//!
//! Per request:
//!     (remote address, servlet path)
//!     → exemption.rs (exact path bypass)
//!     → allow_list.rs (OR over all entries, hostnames via resolver.rs)
//!     → Verdict { Allow | Deny, reason }
//! ```
//!
//! # Design Decisions
//! - Fail closed: unparsable remote addresses and unresolvable hosts never match
//! - Invalid tokens are dropped at build time and reported, never treated as wildcards
//! - Per-entry failures never downgrade another entry's match
//! - Log events go through the injected `GateLog` trait

pub mod allow_list;
pub mod error;
pub mod exemption;
pub mod gate;
pub mod matcher;
pub mod resolver;

pub use allow_list::{AllowList, MatchOutcome, RejectedEntry, ResolutionFailure};
pub use error::{GateError, MatcherError, ResolveError};
pub use exemption::PathExemptionSet;
pub use gate::{AccessGate, Decision, GateLog, Reason, RequestContext, TracingLog, Verdict};
pub use matcher::{parse_network, AddressMatcher};
pub use resolver::{CachingResolver, HostLookup, Resolver, StaticResolver, SystemLookup};

//! Error types for the access gate.

use std::time::Duration;

/// Why a single allow-list token could not be turned into a matcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatcherError {
    #[error("empty allow-list entry")]
    Empty,

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid prefix length in '{entry}': must be 0-{max}")]
    InvalidPrefix { entry: String, max: u8 },

    #[error("invalid hostname '{0}'")]
    InvalidHostname(String),
}

/// Failure to resolve a hostname entry at match time.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("lookup of '{host}' failed: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("lookup of '{host}' timed out after {timeout:?}")]
    Timeout { host: String, timeout: Duration },

    #[error("'{0}' resolved to no addresses")]
    NoAddresses(String),
}

/// Errors that abort gate initialization.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("no allowed hosts configured")]
    MissingAllowList,
}

//! The configured set of allowed addresses.

use std::fmt;
use std::net::IpAddr;

use futures_util::future::join_all;

use crate::access::error::{MatcherError, ResolveError};
use crate::access::matcher::{parse_candidate, AddressMatcher};
use crate::access::resolver::Resolver;

/// Separator between allow-list tokens.
pub const ENTRY_SEPARATOR: char = ',';

/// A token that was dropped while building the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub token: String,
    pub error: MatcherError,
}

/// A hostname entry that could not be resolved during one evaluation.
#[derive(Debug)]
pub struct ResolutionFailure {
    pub host: String,
    pub error: ResolveError,
}

/// Result of evaluating a candidate against every entry.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    /// Logical OR over all entries that could be evaluated.
    pub matched: bool,
    /// Entries that failed to evaluate. They count as non-matching.
    pub failures: Vec<ResolutionFailure>,
}

/// Ordered, immutable list of parsed allow-list entries.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    raw: String,
    entries: Vec<AddressMatcher>,
    rejected: Vec<RejectedEntry>,
}

impl AllowList {
    /// Build from a comma-separated list of entries.
    ///
    /// Every token is parsed on its own. Tokens that fail to parse are kept
    /// in [`AllowList::rejected`] and take no part in matching. Blank tokens
    /// (`"a,,b"`, trailing commas, an empty string) are skipped.
    pub fn build(config: &str) -> Self {
        let mut entries = Vec::new();
        let mut rejected = Vec::new();

        for token in config.split(ENTRY_SEPARATOR).map(str::trim) {
            if token.is_empty() {
                continue;
            }
            match AddressMatcher::parse(token) {
                Ok(matcher) => entries.push(matcher),
                Err(error) => rejected.push(RejectedEntry {
                    token: token.to_string(),
                    error,
                }),
            }
        }

        Self {
            raw: config.to_string(),
            entries,
            rejected,
        }
    }

    /// The configuration string this list was built from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn entries(&self) -> &[AddressMatcher] {
        &self.entries
    }

    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluate `candidate` against every entry.
    ///
    /// Literal, network and wildcard entries are checked first and
    /// short-circuit. Hostname entries are then resolved concurrently. A
    /// failed resolution only makes its own entry non-matching.
    pub async fn matches_any(&self, candidate: &str, resolver: &dyn Resolver) -> MatchOutcome {
        match parse_candidate(candidate) {
            Some(addr) => self.matches_addr(addr, resolver).await,
            None => MatchOutcome::default(),
        }
    }

    async fn matches_addr(&self, candidate: IpAddr, resolver: &dyn Resolver) -> MatchOutcome {
        if self.entries.iter().any(|entry| entry.matches_ip(candidate)) {
            return MatchOutcome {
                matched: true,
                failures: Vec::new(),
            };
        }

        let lookups = self
            .entries
            .iter()
            .filter_map(|entry| entry.hostname().map(|host| (entry, host)))
            .map(|(entry, host)| async move { (host, entry.matches(candidate, resolver).await) });

        let mut outcome = MatchOutcome::default();
        for (host, result) in join_all(lookups).await {
            match result {
                Ok(matched) => outcome.matched |= matched,
                Err(error) => outcome.failures.push(ResolutionFailure {
                    host: host.to_string(),
                    error,
                }),
            }
        }
        outcome
    }
}

impl fmt::Display for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "{ENTRY_SEPARATOR}")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

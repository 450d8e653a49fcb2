//! Per-request allow/deny decision.
//!
//! # Decision
//! ```text
//! allowed = exemptions.is_exempt(path) OR allow_list.matches_any(remote)
//! ```
//! Exemption is checked first so exempt paths never pay for resolution. Both
//! sides are pure predicates, so the order does not change the verdict.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::access::allow_list::{AllowList, RejectedEntry, ResolutionFailure};
use crate::access::error::GateError;
use crate::access::exemption::PathExemptionSet;
use crate::access::resolver::{CachingResolver, Resolver};
use crate::config::AccessConfig;
use crate::observability::metrics;

/// Inputs for one decision. Lives for a single request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub remote_addr: &'a str,
    pub path: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    MatchedEntry,
    ExemptPath,
    NoMatch,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::MatchedEntry => "matched_entry",
            Reason::ExemptPath => "exempt_path",
            Reason::NoMatch => "no_match",
        }
    }
}

/// Outcome of [`AccessGate::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: Reason,
}

impl Verdict {
    pub fn allow(reason: Reason) -> Self {
        Self {
            decision: Decision::Allow,
            reason,
        }
    }

    pub fn deny() -> Self {
        Self {
            decision: Decision::Deny,
            reason: Reason::NoMatch,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

/// Sink for the gate's log events.
pub trait GateLog: Send + Sync {
    /// A new allow-list was installed.
    fn configured(&self, list: &AllowList);
    /// A configured token was dropped.
    fn rejected_entry(&self, entry: &RejectedEntry);
    /// A hostname entry could not be resolved for one request.
    fn resolution_failed(&self, failure: &ResolutionFailure);
    /// A request was denied.
    fn denied(&self, context: &RequestContext<'_>);
}

/// [`GateLog`] backed by `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl GateLog for TracingLog {
    fn configured(&self, list: &AllowList) {
        tracing::info!(
            allowed_hosts = %list.raw(),
            entries = list.len(),
            rejected = list.rejected().len(),
            "Gate initialized with allowed hosts"
        );
    }

    fn rejected_entry(&self, entry: &RejectedEntry) {
        tracing::error!(
            entry = %entry.token,
            error = %entry.error,
            "Ignoring invalid allow-list entry"
        );
    }

    fn resolution_failed(&self, failure: &ResolutionFailure) {
        tracing::error!(
            host = %failure.host,
            error = %failure.error,
            "Error while matching allowed host against remote address"
        );
    }

    fn denied(&self, context: &RequestContext<'_>) {
        tracing::debug!(
            remote_addr = %context.remote_addr,
            path = %context.path,
            "Blocked request"
        );
    }
}

/// The IP gate: allow-list, exemptions, resolver and log.
///
/// The allow-list is swapped wholesale on reload. Each decision works on a
/// single snapshot, so in-flight requests never see a partial list.
pub struct AccessGate {
    allow_list: ArcSwap<AllowList>,
    exemptions: PathExemptionSet,
    resolver: Arc<dyn Resolver>,
    log: Arc<dyn GateLog>,
}

impl AccessGate {
    /// Build the gate from the raw allow-list string.
    ///
    /// `None` means the allow-list was never configured, which is fatal.
    pub fn new(
        allowed_hosts: Option<&str>,
        exemptions: PathExemptionSet,
        resolver: Arc<dyn Resolver>,
        log: Arc<dyn GateLog>,
    ) -> Result<Self, GateError> {
        let raw = allowed_hosts.ok_or(GateError::MissingAllowList)?;
        let list = Self::build_list(raw, log.as_ref());
        Ok(Self {
            allow_list: ArcSwap::from_pointee(list),
            exemptions,
            resolver,
            log,
        })
    }

    /// Build the production gate: system resolver and `tracing` log.
    pub fn from_config(config: &AccessConfig) -> Result<Self, GateError> {
        let resolver = CachingResolver::new(
            Duration::from_millis(config.resolve_timeout_ms),
            Duration::from_secs(config.resolve_cache_ttl_secs),
        );
        Self::new(
            config.allowed_hosts.as_deref(),
            PathExemptionSet::new(config.exempt_paths.iter().cloned()),
            Arc::new(resolver),
            Arc::new(TracingLog),
        )
    }

    fn build_list(raw: &str, log: &dyn GateLog) -> AllowList {
        let list = AllowList::build(raw);
        log.configured(&list);
        for entry in list.rejected() {
            log.rejected_entry(entry);
        }
        metrics::record_allow_list(list.len(), list.rejected().len());
        list
    }

    /// Replace the allow-list. Exemptions are fixed for the gate's lifetime.
    ///
    /// Resolver state for host names the new list no longer names is dropped.
    pub fn reload(&self, allowed_hosts: &str) {
        let list = Self::build_list(allowed_hosts, self.log.as_ref());
        let hosts: Vec<&str> = list.entries().iter().filter_map(|e| e.hostname()).collect();
        self.resolver.retain(&hosts);
        self.allow_list.store(Arc::new(list));
    }

    /// Current allow-list snapshot.
    pub fn allow_list(&self) -> Arc<AllowList> {
        self.allow_list.load_full()
    }

    pub fn exemptions(&self) -> &PathExemptionSet {
        &self.exemptions
    }

    /// Decide whether the request described by `context` may pass.
    pub async fn decide(&self, context: &RequestContext<'_>) -> Verdict {
        let verdict = if self.exemptions.is_exempt(context.path) {
            Verdict::allow(Reason::ExemptPath)
        } else {
            let list = self.allow_list.load_full();
            let outcome = list
                .matches_any(context.remote_addr, self.resolver.as_ref())
                .await;
            for failure in &outcome.failures {
                self.log.resolution_failed(failure);
                metrics::record_resolution_failure();
            }
            if outcome.matched {
                Verdict::allow(Reason::MatchedEntry)
            } else {
                Verdict::deny()
            }
        };

        if !verdict.is_allowed() {
            self.log.denied(context);
        }
        metrics::record_decision(&verdict);
        verdict
    }
}

//! Hostname resolution for allow-list entries.
//!
//! # Responsibilities
//! - Resolve host names to addresses at match time
//! - Bound every lookup with a timeout
//! - Cache successful lookups for a short TTL
//!
//! # Design Decisions
//! - Failed lookups are never cached; the next request retries
//! - Cache keys are the configured host names; reloads drop hosts no longer listed
//! - The lookup itself is behind `HostLookup`, the system resolver by default

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio::time;

use crate::access::error::ResolveError;

/// Future returned by [`Resolver::resolve`].
pub type ResolveFuture<'a> = BoxFuture<'a, Result<Vec<IpAddr>, ResolveError>>;

/// Resolves host names to addresses.
pub trait Resolver: Send + Sync {
    fn resolve<'a>(&'a self, host: &'a str) -> ResolveFuture<'a>;

    /// Forget cached state for hosts outside `hosts`.
    fn retain(&self, _hosts: &[&str]) {}
}

/// Raw address lookup, without timeout or caching.
pub trait HostLookup: Send + Sync {
    fn lookup<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<IpAddr>>>;
}

/// Lookup through the operating system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl HostLookup for SystemLookup {
    fn lookup<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<IpAddr>>> {
        Box::pin(async move {
            let resolved = tokio::net::lookup_host((host, 0)).await?;
            Ok(resolved.map(|socket| socket.ip()).collect())
        })
    }
}

struct CachedLookup {
    addrs: Vec<IpAddr>,
    expires_at: Instant,
}

/// Resolver with a lookup timeout and a TTL cache.
pub struct CachingResolver {
    timeout: Duration,
    ttl: Duration,
    lookup: Arc<dyn HostLookup>,
    cache: DashMap<String, CachedLookup>,
}

impl CachingResolver {
    /// System lookups. A zero `ttl` disables caching.
    pub fn new(timeout: Duration, ttl: Duration) -> Self {
        Self::with_lookup(timeout, ttl, Arc::new(SystemLookup))
    }

    pub fn with_lookup(timeout: Duration, ttl: Duration, lookup: Arc<dyn HostLookup>) -> Self {
        Self {
            timeout,
            ttl,
            lookup,
            cache: DashMap::new(),
        }
    }

    /// Number of hosts with a cached (possibly expired) result.
    pub fn cached_hosts(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, host: &str) -> Option<Vec<IpAddr>> {
        let entry = self.cache.get(host)?;
        (entry.expires_at > Instant::now()).then(|| entry.addrs.clone())
    }

    async fn resolve_host(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        if let Some(addrs) = self.cached(host) {
            return Ok(addrs);
        }

        let addrs: Vec<IpAddr> =
            match time::timeout(self.timeout, self.lookup.lookup(host)).await {
                Ok(Ok(resolved)) => resolved.into_iter().map(|addr| addr.to_canonical()).collect(),
                Ok(Err(source)) => {
                    return Err(ResolveError::Lookup {
                        host: host.to_string(),
                        source,
                    })
                }
                Err(_) => {
                    return Err(ResolveError::Timeout {
                        host: host.to_string(),
                        timeout: self.timeout,
                    })
                }
            };

        if addrs.is_empty() {
            return Err(ResolveError::NoAddresses(host.to_string()));
        }

        if !self.ttl.is_zero() {
            self.cache.insert(
                host.to_string(),
                CachedLookup {
                    addrs: addrs.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }

        tracing::trace!(host = %host, count = addrs.len(), "Resolved allow-list host");
        Ok(addrs)
    }
}

impl Resolver for CachingResolver {
    fn resolve<'a>(&'a self, host: &'a str) -> ResolveFuture<'a> {
        Box::pin(self.resolve_host(host))
    }

    fn retain(&self, hosts: &[&str]) {
        self.cache.retain(|host, _| hosts.contains(&host.as_str()));
    }
}

/// Resolver over a fixed host table. Unknown hosts fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<IpAddr>)>,
        S: Into<String>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|(host, addrs)| (host.into().to_ascii_lowercase(), addrs))
                .collect(),
        }
    }
}

impl Resolver for StaticResolver {
    fn resolve<'a>(&'a self, host: &'a str) -> ResolveFuture<'a> {
        let result = match self.hosts.get(host) {
            Some(addrs) if addrs.is_empty() => Err(ResolveError::NoAddresses(host.to_string())),
            Some(addrs) => Ok(addrs.clone()),
            None => Err(ResolveError::Lookup {
                host: host.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "host not in table"),
            }),
        };
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every host with one address and counts the calls.
    #[derive(Default)]
    struct CountingLookup {
        calls: AtomicUsize,
    }

    impl HostLookup for CountingLookup {
        fn lookup<'a>(&'a self, _host: &'a str) -> BoxFuture<'a, io::Result<Vec<IpAddr>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(std::future::ready(Ok(vec!["10.0.0.7".parse().unwrap()])))
        }
    }

    struct HangingLookup;

    impl HostLookup for HangingLookup {
        fn lookup<'a>(&'a self, _host: &'a str) -> BoxFuture<'a, io::Result<Vec<IpAddr>>> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticResolver::new([
            ("Admin.Internal", vec!["10.0.0.5".parse().unwrap()]),
            ("empty.internal", vec![]),
        ]);

        let addrs = resolver.resolve("admin.internal").await.unwrap();
        assert_eq!(addrs, vec!["10.0.0.5".parse::<IpAddr>().unwrap()]);

        assert!(matches!(
            resolver.resolve("empty.internal").await,
            Err(ResolveError::NoAddresses(_))
        ));
        assert!(matches!(
            resolver.resolve("other.internal").await,
            Err(ResolveError::Lookup { .. })
        ));
    }

    #[tokio::test]
    async fn test_caching_resolver_caches_success() {
        let resolver = CachingResolver::new(Duration::from_secs(5), Duration::from_secs(30));

        let addrs = resolver.resolve("localhost").await.unwrap();
        assert!(addrs.iter().any(|a| a.is_loopback()));
        assert_eq!(resolver.cached_hosts(), 1);

        let again = resolver.resolve("localhost").await.unwrap();
        assert_eq!(addrs, again);
        assert_eq!(resolver.cached_hosts(), 1);
    }

    #[tokio::test]
    async fn test_caching_resolver_zero_ttl_disables_cache() {
        let resolver = CachingResolver::new(Duration::from_secs(5), Duration::ZERO);
        resolver.resolve("localhost").await.unwrap();
        assert_eq!(resolver.cached_hosts(), 0);
    }

    #[tokio::test]
    async fn test_caching_resolver_does_not_cache_failures() {
        let resolver = CachingResolver::new(Duration::from_secs(2), Duration::from_secs(30));
        assert!(resolver.resolve("no-such-host.invalid").await.is_err());
        assert_eq!(resolver.cached_hosts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout_is_not_cached() {
        let resolver = CachingResolver::with_lookup(
            Duration::from_millis(2000),
            Duration::from_secs(30),
            Arc::new(HangingLookup),
        );

        match resolver.resolve("slow.internal").await {
            Err(ResolveError::Timeout { host, timeout }) => {
                assert_eq!(host, "slow.internal");
                assert_eq!(timeout, Duration::from_millis(2000));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(resolver.cached_hosts(), 0);
    }

    #[tokio::test]
    async fn test_injected_lookup_is_cached() {
        let lookup = Arc::new(CountingLookup::default());
        let resolver =
            CachingResolver::with_lookup(Duration::from_secs(1), Duration::from_secs(30), lookup.clone());

        resolver.resolve("a.internal").await.unwrap();
        resolver.resolve("a.internal").await.unwrap();
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retain_evicts_unlisted_hosts() {
        let lookup = Arc::new(CountingLookup::default());
        let resolver =
            CachingResolver::with_lookup(Duration::from_secs(1), Duration::from_secs(30), lookup);

        for host in ["a.internal", "b.internal", "c.internal"] {
            resolver.resolve(host).await.unwrap();
        }
        assert_eq!(resolver.cached_hosts(), 3);

        resolver.retain(&["b.internal"]);
        assert_eq!(resolver.cached_hosts(), 1);

        resolver.retain(&[]);
        assert_eq!(resolver.cached_hosts(), 0);
    }
}

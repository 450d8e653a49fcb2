//! Allow-list entry parsing and address matching.
//!
//! # Responsibilities
//! - Parse one configured token into a literal address, hostname, or network
//! - Test a candidate address against a parsed entry
//!
//! # Design Decisions
//! - Networks are stored truncated to their prefix (`ipnet`)
//! - IPv4 and IPv6 never match each other
//! - IPv4-mapped IPv6 addresses are canonicalized to IPv4 on both sides
//! - Hostnames are kept unresolved; resolution happens per match

use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::access::error::{MatcherError, ResolveError};
use crate::access::resolver::Resolver;

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 64;

/// One parsed allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressMatcher {
    /// `*`: every well-formed address.
    Any,
    /// A single address compared for equality.
    Literal(IpAddr),
    /// A host name resolved at match time.
    Hostname(String),
    /// A CIDR range, host bits cleared.
    Network(IpNet),
}

impl AddressMatcher {
    /// Parse a single allow-list token.
    pub fn parse(spec: &str) -> Result<Self, MatcherError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(MatcherError::Empty);
        }
        if spec == "*" {
            return Ok(Self::Any);
        }
        if spec.contains('/') {
            return parse_network(spec).map(Self::Network);
        }
        if let Ok(addr) = spec.parse::<IpAddr>() {
            return Ok(Self::Literal(addr.to_canonical()));
        }
        // Dotted digits or colons that failed to parse are broken addresses,
        // never host names.
        if spec.contains(':') || spec.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return Err(MatcherError::InvalidAddress(spec.to_string()));
        }
        if is_valid_hostname(spec) {
            let host = spec.trim_end_matches('.').to_ascii_lowercase();
            return Ok(Self::Hostname(host));
        }
        Err(MatcherError::InvalidHostname(spec.to_string()))
    }

    /// The host name to resolve, for hostname entries.
    pub fn hostname(&self) -> Option<&str> {
        match self {
            Self::Hostname(host) => Some(host),
            _ => None,
        }
    }

    /// Match without resolution. Hostname entries never match here.
    pub fn matches_ip(&self, candidate: IpAddr) -> bool {
        let candidate = candidate.to_canonical();
        match self {
            Self::Any => true,
            Self::Literal(addr) => *addr == candidate,
            // IpNet never contains an address of the other family.
            Self::Network(network) => network.contains(&candidate),
            Self::Hostname(_) => false,
        }
    }

    /// Match a candidate, resolving hostname entries through `resolver`.
    pub async fn matches(
        &self,
        candidate: IpAddr,
        resolver: &dyn Resolver,
    ) -> Result<bool, ResolveError> {
        match self {
            Self::Hostname(host) => {
                let candidate = candidate.to_canonical();
                let addrs = resolver.resolve(host).await?;
                Ok(addrs.iter().any(|addr| addr.to_canonical() == candidate))
            }
            _ => Ok(self.matches_ip(candidate)),
        }
    }
}

impl fmt::Display for AddressMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Literal(addr) => write!(f, "{addr}"),
            Self::Hostname(host) => f.write_str(host),
            Self::Network(network) => write!(f, "{network}"),
        }
    }
}

/// Parse `network/prefixLength` into a network with host bits cleared.
///
/// An IPv4-mapped IPv6 network with a prefix of at least 96 bits becomes the
/// equivalent IPv4 network, matching how candidates are canonicalized.
pub fn parse_network(spec: &str) -> Result<IpNet, MatcherError> {
    let (addr, prefix) = spec
        .split_once('/')
        .ok_or_else(|| MatcherError::InvalidAddress(spec.to_string()))?;

    let addr: IpAddr = addr
        .trim()
        .parse()
        .map_err(|_| MatcherError::InvalidAddress(spec.to_string()))?;

    let max = max_prefix_len(&addr);
    let prefix = prefix.trim();
    let prefix_len = if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
        prefix.parse::<u8>().ok()
    } else {
        None
    };
    let invalid_prefix = || MatcherError::InvalidPrefix {
        entry: spec.to_string(),
        max,
    };
    let prefix_len = prefix_len.ok_or_else(invalid_prefix)?;

    let (addr, prefix_len) = match addr {
        IpAddr::V6(v6) if prefix_len >= 96 => match v6.to_ipv4_mapped() {
            Some(v4) => (IpAddr::V4(v4), prefix_len - 96),
            None => (addr, prefix_len),
        },
        _ => (addr, prefix_len),
    };

    IpNet::new(addr, prefix_len)
        .map(|net| net.trunc())
        .map_err(|_| invalid_prefix())
}

fn max_prefix_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn is_valid_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() < MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

/// Parse a remote address as reported by the HTTP layer.
///
/// Accepts bare addresses, bracketed IPv6 (`[::1]`) and socket addresses.
pub fn parse_candidate(candidate: &str) -> Option<IpAddr> {
    let candidate = candidate.trim();
    if let Ok(addr) = candidate.parse::<IpAddr>() {
        return Some(addr.to_canonical());
    }
    if let Ok(socket) = candidate.parse::<std::net::SocketAddr>() {
        return Some(socket.ip().to_canonical());
    }
    candidate
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|inner| inner.parse::<IpAddr>().ok())
        .map(|addr| addr.to_canonical())
}

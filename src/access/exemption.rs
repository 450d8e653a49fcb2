//! Paths that are never filtered.
//!
//! A denied client is still served the error page and its static assets, so
//! the forbidden response can render.

use std::collections::HashSet;

/// Default exempt paths: the error page and the static asset root.
pub const DEFAULT_EXEMPT_PATHS: [&str; 2] = ["/error", "/static"];

/// Immutable set of exact request paths that bypass the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExemptionSet {
    paths: HashSet<String>,
}

impl PathExemptionSet {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// A set that exempts nothing.
    pub fn none() -> Self {
        Self {
            paths: HashSet::new(),
        }
    }

    /// Exact membership. No prefix or case folding.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Default for PathExemptionSet {
    fn default() -> Self {
        Self::new(DEFAULT_EXEMPT_PATHS)
    }
}

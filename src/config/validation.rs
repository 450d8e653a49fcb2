//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Allow-list tokens are not validated here: bad tokens are dropped and
//!   reported when the gate builds its list

use std::net::SocketAddr;

use crate::config::schema::GateConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("upstream.address '{0}' is not a valid authority")]
    InvalidUpstreamAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("exempt path '{0}' must start with '/'")]
    InvalidExemptPath(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let upstream = &config.upstream.address;
    if upstream.is_empty() || upstream.parse::<axum::http::uri::Authority>().is_err() {
        errors.push(ValidationError::InvalidUpstreamAddress(upstream.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    for path in &config.access.exempt_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidExemptPath(path.clone()));
        }
    }

    if config.access.resolve_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("access.resolve_timeout_ms"));
    }
    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream.request_timeout_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&GateConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GateConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.upstream.address = String::new();
        config.access.exempt_paths = vec!["error".into(), "/static".into()];
        config.access.resolve_timeout_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBindAddress("nowhere".into()),
                ValidationError::InvalidUpstreamAddress(String::new()),
                ValidationError::InvalidExemptPath("error".into()),
                ValidationError::ZeroTimeout("access.resolve_timeout_ms"),
            ]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = GateConfig::default();
        config.observability.metrics_address = "bad".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidMetricsAddress("bad".into())])
        );
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows and limits > 0, addresses parse)
//! - Detect unusable session seeds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        issues.push(ConfigIssue::new("listener.bind_address", "not a socket address"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issues.push(ConfigIssue::new("observability.metrics_address", "not a socket address"));
    }

    if config.timeouts.request_secs == 0 {
        issues.push(ConfigIssue::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.store_ms == 0 {
        issues.push(ConfigIssue::new("timeouts.store_ms", "must be > 0"));
    }
    if config.timeouts.audit_ms == 0 {
        issues.push(ConfigIssue::new("timeouts.audit_ms", "must be > 0"));
    }

    if config.rate_limit.window_ms == 0 {
        issues.push(ConfigIssue::new("rate_limit.window_ms", "must be > 0"));
    }
    if config.rate_limit.max_requests == 0 {
        issues.push(ConfigIssue::new("rate_limit.max_requests", "must be > 0"));
    }
    if config.votes.window_ms == 0 {
        issues.push(ConfigIssue::new("votes.window_ms", "must be > 0"));
    }
    if config.votes.max_votes_per_window == 0 {
        issues.push(ConfigIssue::new("votes.max_votes_per_window", "must be > 0"));
    }
    if config.security.max_body_size == 0 {
        issues.push(ConfigIssue::new("security.max_body_size", "must be > 0"));
    }
    if config.identity.session_ttl_secs == 0 {
        issues.push(ConfigIssue::new("identity.session_ttl_secs", "must be > 0"));
    }

    let mut tokens = HashSet::new();
    for seed in &config.identity.sessions {
        if seed.token.trim().is_empty() || seed.principal_id.trim().is_empty() {
            issues.push(ConfigIssue::new("identity.sessions", "token and principal_id are required"));
        } else if !tokens.insert(seed.token.as_str()) {
            issues.push(ConfigIssue::new("identity.sessions", "duplicate session token"));
        }
    }
    if config.roles.bootstrap_admins.iter().any(|id| id.trim().is_empty()) {
        issues.push(ConfigIssue::new("roles.bootstrap_admins", "empty principal id"));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SessionSeed;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_every_issue() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.rate_limit.window_ms = 0;
        config.votes.max_votes_per_window = 0;
        config.identity.sessions = vec![
            SessionSeed { token: "t1".into(), principal_id: "alice".into() },
            SessionSeed { token: "t1".into(), principal_id: "bob".into() },
        ];

        let issues = validate_config(&config).unwrap_err();
        let fields: Vec<_> = issues.iter().map(|i| i.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "rate_limit.window_ms",
                "votes.max_votes_per_window",
                "identity.sessions",
            ]
        );
    }
}

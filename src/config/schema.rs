//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-client request ceiling.
    pub rate_limit: RateLimitConfig,

    /// Per-principal vote ceiling.
    pub votes: VoteConfig,

    /// Origin check, security headers, body limit.
    pub security: SecurityConfig,

    /// Session tokens.
    pub identity: IdentityConfig,

    /// Role bootstrap.
    pub roles: RolesConfig,

    /// Persistence.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Deadline for a single storage call in milliseconds.
    pub store_ms: u64,

    /// Deadline for writing one audit record in milliseconds.
    pub audit_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            store_ms: 2_000,
            audit_ms: 500,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Requests allowed per client key per window.
    pub max_requests: u32,

    /// Use the first `X-Forwarded-For` entry as the client address.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 300_000,
            max_requests: 100,
            trust_forwarded_for: false,
        }
    }
}

/// Vote ceiling per principal over a trailing window.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VoteConfig {
    pub max_votes_per_window: usize,
    pub window_ms: u64,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            max_votes_per_window: 5,
            window_ms: 60_000,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Reject state-changing requests from foreign origins.
    pub origin_check: bool,
    /// Expected `host[:port]`; the request `Host` header is used when unset.
    pub expected_host: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 64 * 1024,
            origin_check: true,
            expected_host: None,
        }
    }
}

/// A session token known at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSeed {
    pub token: String,
    pub principal_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Lifetime of issued sessions in seconds. Configured sessions never expire.
    pub session_ttl_secs: u64,

    pub sessions: Vec<SessionSeed>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 86_400,
            sessions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RolesConfig {
    /// Principals granted `admin` by the system at startup.
    pub bootstrap_admins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot loaded at startup and written at shutdown.
    pub snapshot_path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

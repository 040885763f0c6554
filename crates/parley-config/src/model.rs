// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley chat coordinator.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// HTTP/WebSocket server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Ephemeral store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Audit store (SQLite) settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Shared queue behavior.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Assignment ownership leases.
    #[serde(default)]
    pub assignment: AssignmentConfig,

    /// Message validation and retention.
    #[serde(default)]
    pub message: MessageConfig,

    /// Conversation lock discipline.
    #[serde(default)]
    pub lock: LockConfig,

    /// Participant presence flags.
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// HTTP/WebSocket server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8900
}

/// Ephemeral store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Prefix under which all store keys are composed.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_key_prefix() -> String {
    "parley".to_string()
}

/// Audit store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "parley.db".to_string()
}

/// Shared queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Cap on the size of `queue:snapshot` broadcasts.
    #[serde(default = "default_broadcast_max_entries")]
    pub broadcast_max_entries: usize,

    /// Entries older than this are purged and their conversations closed.
    #[serde(default = "default_purge_age_secs")]
    pub purge_age_secs: u64,

    /// Upper bound on concurrent conversations per agent.
    #[serde(default = "default_per_agent_concurrency")]
    pub per_agent_concurrency: usize,

    /// Interval between maintenance sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl QueueConfig {
    pub fn purge_age(&self) -> Duration {
        Duration::from_secs(self.purge_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            broadcast_max_entries: default_broadcast_max_entries(),
            purge_age_secs: default_purge_age_secs(),
            per_agent_concurrency: default_per_agent_concurrency(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_broadcast_max_entries() -> usize {
    50
}

fn default_purge_age_secs() -> u64 {
    3600
}

fn default_per_agent_concurrency() -> usize {
    3
}

fn default_sweep_interval_secs() -> u64 {
    30
}

/// Assignment lease configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssignmentConfig {
    /// Ownership lease TTL, refreshed on every message and explicit extend.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
}

impl AssignmentConfig {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: default_lease_ttl_secs(),
        }
    }
}

fn default_lease_ttl_secs() -> u64 {
    120
}

/// Message validation and retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessageConfig {
    /// Maximum message content size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// TTL of the ephemeral message log; the audit store keeps the durable copy.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl MessageConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            retention_secs: default_retention_secs(),
        }
    }
}

fn default_max_bytes() -> usize {
    4096
}

fn default_retention_secs() -> u64 {
    86_400
}

/// Conversation lock configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// How long a transition waits for the conversation lock.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Lease bound on a held lock; recovers from a dead holder.
    #[serde(default = "default_lock_lease_secs")]
    pub lease_ttl_secs: u64,
}

impl LockConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: default_acquire_timeout_ms(),
            lease_ttl_secs: default_lock_lease_secs(),
        }
    }
}

fn default_acquire_timeout_ms() -> u64 {
    5000
}

fn default_lock_lease_secs() -> u64 {
    10
}

/// Presence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceConfig {
    /// TTL of a participant's liveness flag; absence is detected by expiry.
    #[serde(default = "default_presence_ttl_secs")]
    pub ttl_secs: u64,
}

impl PresenceConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_presence_ttl_secs(),
        }
    }
}

fn default_presence_ttl_secs() -> u64 {
    30
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ParleyConfig::default();
        assert_eq!(config.queue.broadcast_max_entries, 50);
        assert_eq!(config.queue.purge_age(), Duration::from_secs(3600));
        assert_eq!(config.queue.per_agent_concurrency, 3);
        assert_eq!(config.assignment.lease_ttl(), Duration::from_secs(120));
        assert_eq!(config.message.max_bytes, 4096);
        assert_eq!(config.lock.acquire_timeout(), Duration::from_millis(5000));
        assert_eq!(config.lock.lease_ttl(), Duration::from_secs(10));
        assert_eq!(config.presence.ttl(), Duration::from_secs(30));
        assert_eq!(config.store.key_prefix, "parley");
        assert_eq!(config.server.port, 8900);
    }

    #[test]
    fn config_serde_round_trips() {
        let config = ParleyConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ParleyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.queue.per_agent_concurrency, 3);
        assert_eq!(back.log.level, "info");
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./parley.toml` > `~/.config/parley/parley.toml` >
//! `/etc/parley/parley.toml` with environment variable overrides via the
//! `PARLEY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ParleyConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/parley/parley.toml` (system-wide)
/// 3. `~/.config/parley/parley.toml` (user XDG config)
/// 4. `./parley.toml` (local directory)
/// 5. `PARLEY_*` environment variables
pub fn load_config() -> Result<ParleyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::file("/etc/parley/parley.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("parley/parley.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("parley.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from TOML content only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ParleyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ParleyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `PARLEY_QUEUE_PURGE_AGE_SECS` must map to
/// `queue.purge_age_secs`, not `queue.purge.age.secs`.
fn env_provider() -> Env {
    Env::prefixed("PARLEY_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("store_", "store.", 1)
            .replacen("audit_", "audit.", 1)
            .replacen("queue_", "queue.", 1)
            .replacen("assignment_", "assignment.", 1)
            .replacen("message_", "message.", 1)
            .replacen("lock_", "lock.", 1)
            .replacen("presence_", "presence.", 1)
            .replacen("log_", "log.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.queue.per_agent_concurrency, 3);
        assert_eq!(config.message.max_bytes, 4096);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [queue]
            per_agent_concurrency = 5
            purge_age_secs = 7200

            [message]
            max_bytes = 2048
            "#,
        )
        .unwrap();
        assert_eq!(config.queue.per_agent_concurrency, 5);
        assert_eq!(config.queue.purge_age_secs, 7200);
        assert_eq!(config.message.max_bytes, 2048);
        // Untouched sections keep defaults.
        assert_eq!(config.assignment.lease_ttl_secs, 120);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = load_config_from_str(
            r#"
            [queue]
            per_agent_concurency = 5
            "#,
        );
        assert!(result.is_err(), "typoed key should be rejected");
    }

    #[test]
    fn unknown_section_is_rejected() {
        let result = load_config_from_str(
            r#"
            [redis]
            url = "redis://localhost"
            "#,
        );
        assert!(result.is_err(), "unknown section should be rejected");
    }
}

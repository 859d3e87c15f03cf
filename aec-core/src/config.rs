//! Configuration loading: defaults < TOML file < environment variables,
//! the same hierarchy `knhk-config::load_config` uses. Field names mirror
//! the ENV surface defined in `spec.md` §6.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HMAC secret for the Token Service (`TOKEN_SECRET`). If unset at
    /// startup a random secret is generated and tokens will not survive a
    /// restart (`spec.md` §4.3).
    pub token_secret: Option<String>,

    /// Ed25519 public key (lowercase hex) of the release administrator
    /// (`ADMIN_PUBLIC_KEY`).
    pub admin_public_key: Option<String>,

    /// Risk score above which `AWAITING_APPROVAL` is entered (`spec.md`
    /// §4.6, default 0.8).
    pub high_risk_threshold: f64,

    /// Bounded wait for a signed approval, in milliseconds (default 24h).
    pub approval_timeout_ms: i64,

    /// Per-validator broadcast timeout, in milliseconds (default 30s).
    pub validator_timeout_ms: i64,

    /// Reaper staleness threshold in cycles (default 10 000).
    pub stale_threshold_cycles: u64,

    /// Reaper archive size cap in bytes.
    pub max_archive_bytes: u64,

    /// Sandbox memory cap in MiB (default 128).
    pub sandbox_memory_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_secret: None,
            admin_public_key: None,
            high_risk_threshold: 0.8,
            approval_timeout_ms: 24 * 60 * 60 * 1000,
            validator_timeout_ms: 30_000,
            stale_threshold_cycles: 10_000,
            max_archive_bytes: 1024 * 1024 * 1024,
            sandbox_memory_mb: 128,
        }
    }
}

impl Config {
    /// Load configuration: defaults, optionally overlaid by a TOML file at
    /// `path` (if it exists), then overridden by environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)
                    .map_err(|e| CoreError::Config(format!("reading {}: {e}", p.display())))?;
                toml::from_str(&content)
                    .map_err(|e| CoreError::Config(format!("parsing {}: {e}", p.display())))?
            }
            _ => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `TOKEN_SECRET`, `ADMIN_PUBLIC_KEY`, `HIGH_RISK_THRESHOLD`,
    /// `APPROVAL_TIMEOUT_MS`, `VALIDATOR_TIMEOUT_MS`,
    /// `STALE_THRESHOLD_CYCLES`, `MAX_ARCHIVE_BYTES`, `SANDBOX_MEMORY_MB`
    /// overrides, per `spec.md` §6.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("TOKEN_SECRET") {
            self.token_secret = Some(v);
        }
        if let Ok(v) = env::var("ADMIN_PUBLIC_KEY") {
            self.admin_public_key = Some(v);
        }
        if let Some(v) = parse_env("HIGH_RISK_THRESHOLD") {
            self.high_risk_threshold = v;
        }
        if let Some(v) = parse_env("APPROVAL_TIMEOUT_MS") {
            self.approval_timeout_ms = v;
        }
        if let Some(v) = parse_env("VALIDATOR_TIMEOUT_MS") {
            self.validator_timeout_ms = v;
        }
        if let Some(v) = parse_env("STALE_THRESHOLD_CYCLES") {
            self.stale_threshold_cycles = v;
        }
        if let Some(v) = parse_env("MAX_ARCHIVE_BYTES") {
            self.max_archive_bytes = v;
        }
        if let Some(v) = parse_env("SANDBOX_MEMORY_MB") {
            self.sandbox_memory_mb = v;
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.high_risk_threshold, 0.8);
        assert_eq!(c.stale_threshold_cycles, 10_000);
    }

    #[test]
    fn env_override_takes_precedence() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("HIGH_RISK_THRESHOLD", "0.5");
        let config = Config::load(None).unwrap();
        assert_eq!(config.high_risk_threshold, 0.5);
        env::remove_var("HIGH_RISK_THRESHOLD");
    }
}

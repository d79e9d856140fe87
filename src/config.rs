use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Largest number length whose value space still fits in a `u64` probe.
pub const MAX_ACCOUNT_NUMBER_LENGTH: usize = 18;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Digits in a generated account number
    pub account_number_length: usize,
    /// Shards in the per-account lock registry
    pub lock_shards: usize,
    /// Random collisions tolerated before switching to a sequential probe
    pub random_attempts_before_probe: u32,
    /// Refuse deposits, withdrawals and transfers touching an INACTIVE account
    pub reject_inactive_movements: bool,
    /// Append-only journal file; in-memory log when unset
    pub journal_path: Option<PathBuf>,
    /// Default tracing directive for the binary
    pub log_level: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            account_number_length: 10,
            lock_shards: 16,
            random_attempts_before_probe: 64,
            reject_inactive_movements: false,
            journal_path: None,
            log_level: "warn".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Defaults overlaid with `LEDGER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(length) = env::var("LEDGER_ACCOUNT_NUMBER_LENGTH") {
            config.account_number_length = length
                .parse()
                .context("Invalid LEDGER_ACCOUNT_NUMBER_LENGTH value")?;
        }

        if let Ok(shards) = env::var("LEDGER_LOCK_SHARDS") {
            config.lock_shards = shards.parse().context("Invalid LEDGER_LOCK_SHARDS value")?;
        }

        if let Ok(attempts) = env::var("LEDGER_RANDOM_ATTEMPTS_BEFORE_PROBE") {
            config.random_attempts_before_probe = attempts
                .parse()
                .context("Invalid LEDGER_RANDOM_ATTEMPTS_BEFORE_PROBE value")?;
        }

        if let Ok(reject) = env::var("LEDGER_REJECT_INACTIVE_MOVEMENTS") {
            config.reject_inactive_movements = reject
                .parse()
                .context("Invalid LEDGER_REJECT_INACTIVE_MOVEMENTS value")?;
        }

        if let Ok(path) = env::var("LEDGER_JOURNAL_PATH") {
            if !path.is_empty() {
                config.journal_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(level) = env::var("LEDGER_LOG_LEVEL") {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.account_number_length == 0 || self.account_number_length > MAX_ACCOUNT_NUMBER_LENGTH {
            anyhow::bail!(
                "account_number_length must be between 1 and {}, got {}",
                MAX_ACCOUNT_NUMBER_LENGTH,
                self.account_number_length
            );
        }

        if self.lock_shards == 0 {
            anyhow::bail!("lock_shards must be at least 1");
        }

        Ok(())
    }
}

//! Ledger configuration.
//!
//! All environment variable reads live here and produce a validated `LedgerConfig`.

use std::str::FromStr;
use std::time::Duration;

use crate::domain::Coins;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Withdrawal request bounds, in coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalLimits {
    pub min_coins: Coins,
    pub max_coins: Coins,
    /// Trailing 24 hours, pending + approved + paid.
    pub daily_limit_coins: Coins,
    /// Trailing 7 days, pending + approved + paid.
    pub weekly_limit_coins: Coins,
}

impl Default for WithdrawalLimits {
    fn default() -> Self {
        Self {
            min_coins: 500,
            max_coins: 50_000,
            daily_limit_coins: 20_000,
            weekly_limit_coins: 100_000,
        }
    }
}

/// How long a ledger mutation may wait for an account before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub lock_timeout: Duration,
    pub max_attempts: u32,
    /// Doubled after every failed attempt.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2_000),
            max_attempts: 5,
            base_backoff: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(10))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub withdrawals: WithdrawalLimits,
    pub retry: RetryPolicy,
    pub catalog_cache_ttl: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            withdrawals: WithdrawalLimits::default(),
            retry: RetryPolicy::default(),
            catalog_cache_ttl: Duration::from_secs(30),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but unparseable, or if
    /// the resulting limits are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let withdrawals = WithdrawalLimits {
            min_coins: parse_env_or("MIN_WITHDRAWAL_COINS", defaults.withdrawals.min_coins)?,
            max_coins: parse_env_or("MAX_WITHDRAWAL_COINS", defaults.withdrawals.max_coins)?,
            daily_limit_coins: parse_env_or(
                "DAILY_WITHDRAWAL_LIMIT_COINS",
                defaults.withdrawals.daily_limit_coins,
            )?,
            weekly_limit_coins: parse_env_or(
                "WEEKLY_WITHDRAWAL_LIMIT_COINS",
                defaults.withdrawals.weekly_limit_coins,
            )?,
        };

        let retry = RetryPolicy {
            lock_timeout: Duration::from_millis(parse_env_or(
                "LEDGER_LOCK_TIMEOUT_MS",
                defaults.retry.lock_timeout.as_millis() as u64,
            )?),
            max_attempts: parse_env_or("LEDGER_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            base_backoff: Duration::from_millis(parse_env_or(
                "LEDGER_RETRY_BACKOFF_MS",
                defaults.retry.base_backoff.as_millis() as u64,
            )?),
        };

        let catalog_cache_ttl = Duration::from_secs(parse_env_or(
            "CATALOG_CACHE_TTL_SECS",
            defaults.catalog_cache_ttl.as_secs(),
        )?);

        let config = Self {
            withdrawals,
            retry,
            catalog_cache_ttl,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.withdrawals;
        if w.min_coins <= 0 {
            return Err(invalid("MIN_WITHDRAWAL_COINS", "must be positive"));
        }
        if w.max_coins < w.min_coins {
            return Err(invalid(
                "MAX_WITHDRAWAL_COINS",
                "must not be below MIN_WITHDRAWAL_COINS",
            ));
        }
        if w.daily_limit_coins < w.min_coins {
            return Err(invalid(
                "DAILY_WITHDRAWAL_LIMIT_COINS",
                "must allow at least one minimum withdrawal",
            ));
        }
        if w.weekly_limit_coins < w.daily_limit_coins {
            return Err(invalid(
                "WEEKLY_WITHDRAWAL_LIMIT_COINS",
                "must not be below the daily limit",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("LEDGER_MAX_ATTEMPTS", "must be at least 1"));
        }
        if self.retry.lock_timeout.is_zero() {
            return Err(invalid("LEDGER_LOCK_TIMEOUT_MS", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_env_or<T: FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: var.to_string(),
            reason: format!("cannot parse {:?}", raw),
        }),
        Err(_) => Ok(default),
    }
}

use anyhow::{Context, Result};
use chrono::Duration;
use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub lease: LeaseConfig,
    /// Grand totals at or above this amount take the full tender path;
    /// below it the lighter-weight purchase path. Business rule, never hard-coded.
    pub tender_threshold: Decimal,
}

/// Timing knobs for the edit-lease protocol.
///
/// The server only enforces the TTL (heartbeat interval + slack). Idle timeout
/// and poll interval are client policy; they are surfaced in lock payloads so
/// clients agree on one value, but the server never trusts them for release.
#[derive(Debug, Clone)]
pub struct LeaseConfig {
    pub heartbeat_interval_secs: i64,
    pub ttl_slack_secs: i64,
    pub idle_timeout_secs: i64,
    pub poll_interval_secs: i64,
}

impl LeaseConfig {
    /// How long a lease stays valid after the last heartbeat.
    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.heartbeat_interval_secs + self.ttl_slack_secs)
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 60,
            ttl_slack_secs: 30,
            idle_timeout_secs: 300,
            poll_interval_secs: 5,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = LeaseConfig::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            lease: LeaseConfig {
                heartbeat_interval_secs: env_i64(
                    "LEASE_HEARTBEAT_SECS",
                    defaults.heartbeat_interval_secs,
                )?,
                ttl_slack_secs: env_i64("LEASE_TTL_SLACK_SECS", defaults.ttl_slack_secs)?,
                idle_timeout_secs: env_i64("EDIT_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
                poll_interval_secs: env_i64("LOCK_POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
            },
            tender_threshold: env::var("TENDER_THRESHOLD")
                .unwrap_or_else(|_| "50000".to_string())
                .parse()
                .context("TENDER_THRESHOLD must be a valid decimal amount")?,
        })
    }
}

fn env_i64(key: &str, default: i64) -> Result<i64> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} must be a valid number of seconds", key)),
        Err(_) => Ok(default),
    }
}

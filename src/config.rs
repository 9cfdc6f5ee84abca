use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::time::Duration;
use validator::Validate;

use crate::utils::clock::next_local_midnight;

pub const DEFAULT_COLLECTOR_URL: &str = "https://collector.teltrics.com/collectPageview";
pub const DEFAULT_STATE_KEY: &str = "_teltrics";
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(5000);

/// When the persisted visitor state stops being readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    LocalMidnight,
    After(Duration),
}

impl ExpiryPolicy {
    pub fn expires_at(&self, now: DateTime<Local>) -> DateTime<Local> {
        match self {
            ExpiryPolicy::LocalMidnight => next_local_midnight(now),
            ExpiryPolicy::After(ttl) => {
                let ttl = chrono::Duration::from_std(*ttl).unwrap_or(chrono::Duration::days(1));
                now + ttl
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePolicy {
    pub session_idle: Duration,     // Idle gap after which a new session starts
    pub delivery_timeout: Duration, // Lifetime of a single beacon transfer
    pub expiry: ExpiryPolicy,
    pub serialize_dispatch: bool, // One beacon between read and commit at a time
}

impl Default for StatePolicy {
    fn default() -> Self {
        Self {
            session_idle: DEFAULT_SESSION_IDLE,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            expiry: ExpiryPolicy::LocalMidnight,
            serialize_dispatch: false,
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct TrackerConfig {
    pub site_id: String,
    #[validate(url(message = "Invalid collector URL"))]
    pub collector_url: String,
    #[validate(length(min = 1, message = "State key must not be empty"))]
    pub state_key: String,
    pub policy: StatePolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            site_id: String::new(),
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            state_key: DEFAULT_STATE_KEY.to_string(),
            policy: StatePolicy::default(),
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `BEACON_*` variables, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(site_id) = lookup("BEACON_SITE_ID") {
            config.site_id = site_id;
        }
        if let Some(url) = lookup("BEACON_COLLECTOR_URL") {
            config.collector_url = url;
        }
        if let Some(key) = lookup("BEACON_STATE_KEY") {
            config.state_key = key;
        }
        if let Some(ms) = lookup("BEACON_TIMEOUT_MS") {
            let ms = ms
                .parse::<u64>()
                .with_context(|| format!("BEACON_TIMEOUT_MS is not a number: {}", ms))?;
            config.policy.delivery_timeout = Duration::from_millis(ms);
        }
        if let Some(mins) = lookup("BEACON_SESSION_IDLE_MINS") {
            let mins = mins
                .parse::<u64>()
                .with_context(|| format!("BEACON_SESSION_IDLE_MINS is not a number: {}", mins))?;
            config.policy.session_idle = Duration::from_secs(mins * 60);
        }
        if let Some(flag) = lookup("BEACON_SERIALIZE") {
            config.policy.serialize_dispatch = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        config
            .validate()
            .context("Invalid tracker configuration")?;
        Ok(config)
    }
}

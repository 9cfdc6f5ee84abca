use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, warn};
use std::sync::Arc;

use crate::config::StatePolicy;
use crate::models::visitor_state::VisitorSessionState;
use crate::storage::{StateStore, StoreOptions};
use crate::utils::clock::Clock;

/// Reads and writes the visitor state blob under one key.
pub struct SessionStore {
    backend: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    key: String,
    policy: StatePolicy,
}

impl SessionStore {
    pub fn new(
        backend: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
        policy: StatePolicy,
    ) -> Self {
        Self {
            backend,
            clock,
            key: key.into(),
            policy,
        }
    }

    /// Current state with the session idle rule applied. Never fails: a
    /// missing, unreadable or corrupt blob yields a fresh visitor.
    pub fn read(&self) -> VisitorSessionState {
        let now = self.clock.now_millis();
        self.read_persisted(now)
            .apply_idle_gap(now, self.policy.session_idle)
    }

    /// The stored blob as-is, without the idle rule. Missing fields take
    /// defaults, but a field of the wrong type discards the whole blob.
    pub fn read_persisted(&self, now_millis: i64) -> VisitorSessionState {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return VisitorSessionState::fresh(now_millis),
            Err(e) => {
                warn!("Could not read visitor state {:?}: {:#}", self.key, e);
                return VisitorSessionState::fresh(now_millis);
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                error!("Discarding corrupt visitor state {:?}: {}", self.key, e);
                VisitorSessionState::fresh(now_millis)
            }
        }
    }

    /// Persist `state`, root-scoped, expiring per the configured policy.
    pub fn write(&self, state: &VisitorSessionState) -> Result<()> {
        let expires = self.policy.expiry.expires_at(self.clock.now());
        let blob = serde_json::to_string(state).context("Failed to encode visitor state")?;
        self.backend
            .set(
                &self.key,
                &blob,
                &StoreOptions::root(expires.with_timezone(&Utc)),
            )
            .with_context(|| format!("Failed to store visitor state {:?}", self.key))
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::pageview::PageviewRecord;

/// The single blob persisted between pageviews.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VisitorSessionState {
    #[serde(default)]
    pub is_new_visitor: bool, // Cleared by the first confirmed beacon
    #[serde(default)]
    pub is_new_session: bool, // Forced back on after an idle gap, see `apply_idle_gap`
    #[serde(default)]
    pub pages_viewed: Vec<String>, // Paths seen by this visitor, in first-seen order
    #[serde(default)]
    pub previous_pageview_id: String, // Id of the last delivered pageview
    #[serde(default)]
    pub last_seen: i64, // Epoch millis of the last commit
}

impl VisitorSessionState {
    pub fn fresh(now_millis: i64) -> Self {
        Self {
            is_new_visitor: true,
            is_new_session: true,
            pages_viewed: Vec::new(),
            previous_pageview_id: String::new(),
            last_seen: now_millis,
        }
    }

    pub fn has_viewed(&self, path: &str) -> bool {
        self.pages_viewed.iter().any(|seen| seen == path)
    }

    /// Marks the session as new when more than `idle` has passed since the
    /// last commit. Does not persist anything.
    pub fn apply_idle_gap(mut self, now_millis: i64, idle: Duration) -> Self {
        let idle_millis = i64::try_from(idle.as_millis()).unwrap_or(i64::MAX);
        if now_millis.saturating_sub(self.last_seen) > idle_millis {
            self.is_new_session = true;
        }
        self
    }

    /// Folds a delivered pageview into the state.
    pub fn advance(&mut self, record: &PageviewRecord, now_millis: i64) {
        if !self.has_viewed(&record.p) {
            self.pages_viewed.push(record.p.clone());
        }
        self.previous_pageview_id = record.id.clone();
        self.is_new_visitor = false;
        self.is_new_session = false;
        self.last_seen = now_millis;
    }
}

use serde::{Deserialize, Serialize};

use crate::models::visitor_state::VisitorSessionState;
use crate::utils::location::DerivedPage;
use crate::utils::query_string::stringify;

/// One outbound pageview, built fresh per navigation and never persisted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PageviewRecord {
    pub id: String,  // Random pageview id
    pub pid: String, // Id of the previously delivered pageview, may be empty
    pub p: String,   // Path including query string
    pub h: String,   // protocol://hostname
    pub r: String,   // Referrer, empty for internal traffic
    pub u: u8,       // 1 if the path is new to this visitor
    pub nv: u8,      // 1 for a new visitor
    pub ns: u8,      // 1 for a new session
    pub sid: String, // Site id
}

impl PageviewRecord {
    pub fn new(id: String, state: &VisitorSessionState, page: DerivedPage, site_id: &str) -> Self {
        Self {
            id,
            pid: state.previous_pageview_id.clone(),
            u: flag(!state.has_viewed(&page.path)),
            nv: flag(state.is_new_visitor),
            ns: flag(state.is_new_session),
            p: page.path,
            h: page.hostname,
            r: page.referrer,
            sid: site_id.to_string(),
        }
    }

    /// Wire order of the collector's query parameters.
    pub fn query_pairs(&self) -> [(&'static str, String); 9] {
        [
            ("id", self.id.clone()),
            ("pid", self.pid.clone()),
            ("p", self.p.clone()),
            ("h", self.h.clone()),
            ("r", self.r.clone()),
            ("u", self.u.to_string()),
            ("nv", self.nv.to_string()),
            ("ns", self.ns.to_string()),
            ("sid", self.sid.clone()),
        ]
    }

    pub fn beacon_url(&self, collector_url: &str) -> String {
        let pairs = self.query_pairs();
        format!(
            "{}{}",
            collector_url,
            stringify(pairs.iter().map(|(k, v)| (*k, v.as_str())))
        )
    }
}

fn flag(value: bool) -> u8 {
    if value { 1 } else { 0 }
}

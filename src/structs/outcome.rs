use serde::Serialize;

use crate::models::pageview::PageviewRecord;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DoNotTrack,
    Prerender,
    UntrackableHost,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Loaded,   // Collector confirmed, state committed
    Failed,   // Transfer errored, pixel removed at the deadline
    TimedOut, // Deadline hit first, transfer cancelled
}

/// What a single `track_pageview` call ended up doing.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrackOutcome {
    Skipped { reason: SkipReason },
    Deferred,
    Sent {
        status: DeliveryStatus,
        record: PageviewRecord,
    },
}

impl TrackOutcome {
    pub fn record(&self) -> Option<&PageviewRecord> {
        match self {
            TrackOutcome::Sent { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<DeliveryStatus> {
        match self {
            TrackOutcome::Sent { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub mod config;
pub mod handlers;
pub mod host;
pub mod models;
pub mod storage;
pub mod structs;
pub mod tracker;
pub mod transport;
pub mod utils;

pub use config::{ExpiryPolicy, StatePolicy, TrackerConfig};
pub use handlers::command_handlers::{Command, CommandQueue};
pub use handlers::pageview_handlers::{PendingBeacon, Prepared};
pub use host::Page;
pub use host::simulated::SimulatedPage;
pub use models::pageview::PageviewRecord;
pub use models::visitor_state::VisitorSessionState;
pub use storage::StateStore;
pub use structs::outcome::{DeliveryStatus, SkipReason, TrackOutcome};
pub use structs::overrides::PageviewOverrides;
pub use tracker::Tracker;
pub use transport::{HttpTransport, Transport};

pub mod pageview;
pub mod visitor_state;

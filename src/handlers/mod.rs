pub mod command_handlers;
pub mod pageview_handlers;

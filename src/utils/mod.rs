pub mod clock;
pub mod location;
pub mod query_string;
pub mod random_id;

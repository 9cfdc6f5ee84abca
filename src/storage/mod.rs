pub mod cookie_jar;
pub mod file_store;
pub mod session_store;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Scope and lifetime attached to a stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub path: String,
    pub expires: Option<DateTime<Utc>>,
}

impl StoreOptions {
    pub fn root(expires: DateTime<Utc>) -> Self {
        Self {
            path: "/".to_string(),
            expires: Some(expires),
        }
    }
}

/// Durable string key-value storage with per-entry expiry.
///
/// Implementations must treat expired entries as absent. Nothing here is
/// atomic: concurrent writers simply overwrite each other.
pub trait StateStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<String>>;
    fn set(&self, name: &str, value: &str, options: &StoreOptions) -> Result<()>;
}

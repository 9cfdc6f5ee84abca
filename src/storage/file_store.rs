use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::storage::{StateStore, StoreOptions};
use crate::utils::clock::Clock;

#[derive(Serialize, Deserialize, Debug, Clone)]
struct FileEntry {
    value: String,
    #[serde(default)]
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires: Option<DateTime<Utc>>,
}

/// Keeps entries in a single JSON file so state outlives the process.
pub struct FileStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, FileEntry>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }
}

impl StateStore for FileStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let now = self.clock.now().with_timezone(&Utc);
        let entries = self.load()?;
        Ok(entries
            .get(name)
            .filter(|entry| entry.expires.is_none_or(|at| at > now))
            .map(|entry| entry.value.clone()))
    }

    fn set(&self, name: &str, value: &str, options: &StoreOptions) -> Result<()> {
        let mut entries = self.load().unwrap_or_default();
        entries.insert(
            name.to_string(),
            FileEntry {
                value: value.to_string(),
                path: options.path.clone(),
                expires: options.expires,
            },
        );

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(&entries).context("Failed to encode state file")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

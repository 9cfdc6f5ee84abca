use anyhow::{Context, Result, bail};
use log::warn;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::structs::outcome::TrackOutcome;
use crate::structs::overrides::PageviewOverrides;
use crate::tracker::Tracker;

/// The public command surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetSiteId(String),
    TrackPageview(PageviewOverrides),
}

impl Command {
    pub fn parse(name: &str, args: &[Value]) -> Result<Self> {
        match name {
            "setSiteId" | "configure" => {
                let site_id = args
                    .first()
                    .and_then(Value::as_str)
                    .with_context(|| format!("{} expects a site id string", name))?;
                Ok(Command::SetSiteId(site_id.to_string()))
            }
            "trackPageview" => {
                let overrides = match args.first() {
                    None | Some(Value::Null) => PageviewOverrides::default(),
                    Some(value) => serde_json::from_value(value.clone())
                        .context("trackPageview expects an overrides object")?,
                };
                Ok(Command::TrackPageview(overrides))
            }
            other => bail!("Unknown command {:?}", other),
        }
    }
}

pub fn dispatch(tracker: &Tracker, command: Command) -> Option<JoinHandle<TrackOutcome>> {
    match command {
        Command::SetSiteId(site_id) => {
            tracker.set_site_id(site_id);
            None
        }
        Command::TrackPageview(overrides) => tracker.spawn_pageview(overrides),
    }
}

/// Parse and dispatch. Bad calls are logged and dropped, never raised.
pub fn call(tracker: &Tracker, name: &str, args: &[Value]) -> Option<JoinHandle<TrackOutcome>> {
    match Command::parse(name, args) {
        Ok(command) => dispatch(tracker, command),
        Err(e) => {
            warn!("Ignoring command: {:#}", e);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCall {
    pub name: String,
    pub args: Vec<Value>,
}

/// Calls made before the tracker existed, replayed in order at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandQueue {
    calls: Vec<QueuedCall>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts the `[["setSiteId", "abc"], ["trackPageview"]]` shape a host
    /// page accumulates.
    pub fn from_json(value: &Value) -> Result<Self> {
        let entries = value
            .as_array()
            .context("Command queue must be an array")?;

        let mut queue = Self::new();
        for entry in entries {
            let Some((name, args)) = entry.as_array().and_then(|call| call.split_first()) else {
                warn!("Skipping malformed queued call {}", entry);
                continue;
            };
            let Some(name) = name.as_str() else {
                warn!("Skipping queued call without a command name: {}", entry);
                continue;
            };
            queue.push(name, args.to_vec());
        }
        Ok(queue)
    }

    pub fn push(&mut self, name: impl Into<String>, args: Vec<Value>) {
        self.calls.push(QueuedCall {
            name: name.into(),
            args,
        });
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn replay(self, tracker: &Tracker) -> Vec<JoinHandle<TrackOutcome>> {
        self.calls
            .into_iter()
            .filter_map(|call| tracker.call(&call.name, &call.args))
            .collect()
    }
}

use anyhow::Result;
use log::debug;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::host::Page;

pub const PUSH_STATE: &str = "pushState";

/// A synthetic navigation, shaped like the DOM event it stands in for.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationEvent {
    pub kind: String,
    pub arguments: Vec<Value>,
}

/// The history-mutation entry point single-page apps call.
pub trait History: Send + Sync {
    fn push_state(&self, state: Value, title: &str, url: Option<&str>) -> Result<()>;
}

/// Runs inside `dispatch`, before the navigating call returns.
pub type Listener = Arc<dyn Fn(&NavigationEvent) + Send + Sync>;

/// Global event dispatch for navigation events. Listeners run synchronously
/// in dispatch order; subscribers get a copy over a broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<NavigationEvent>,
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn listen(&self, listener: Listener) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    /// Returns how many listeners and subscribers saw the event.
    pub fn dispatch(&self, event: NavigationEvent) -> usize {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in &listeners {
            listener(&event);
        }
        listeners.len() + self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Runs the original `push_state`, then announces it on the bus.
pub struct InterceptedHistory {
    inner: Arc<dyn History>,
    bus: EventBus,
}

impl History for InterceptedHistory {
    fn push_state(&self, state: Value, title: &str, url: Option<&str>) -> Result<()> {
        let arguments = vec![
            state.clone(),
            Value::String(title.to_string()),
            url.map(|u| Value::String(u.to_string()))
                .unwrap_or(Value::Null),
        ];
        self.inner.push_state(state, title, url)?;
        self.bus.dispatch(NavigationEvent {
            kind: PUSH_STATE.to_string(),
            arguments,
        });
        Ok(())
    }
}

/// Handle on an installed interceptor.
pub struct NavigationInterceptor {
    bus: EventBus,
}

impl NavigationInterceptor {
    /// Wrap the page's history. `None` when the page lacks history or event
    /// dispatch, in which case only explicit tracking calls will fire.
    pub fn install(page: &dyn Page) -> Option<Self> {
        let (Some(original), Some(bus)) = (page.history(), page.event_bus()) else {
            debug!("History or event dispatch unavailable, navigation tracking disabled");
            return None;
        };
        let wrapped = Arc::new(InterceptedHistory {
            inner: original,
            bus: bus.clone(),
        });
        if !page.replace_history(wrapped) {
            debug!("Page refused history replacement, navigation tracking disabled");
            return None;
        }
        Some(Self { bus })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.bus.subscribe()
    }

    pub fn listen(&self, listener: Listener) {
        self.bus.listen(listener);
    }
}

use log::{debug, warn};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::{StatePolicy, TrackerConfig};
use crate::handlers::command_handlers;
use crate::handlers::pageview_handlers::{self, PageSnapshot, Prepared};
use crate::host::Page;
use crate::host::navigation::{NavigationEvent, NavigationInterceptor};
use crate::storage::StateStore;
use crate::storage::session_store::SessionStore;
use crate::structs::outcome::TrackOutcome;
use crate::structs::overrides::PageviewOverrides;
use crate::transport::Transport;
use crate::utils::clock::{Clock, SystemClock};

struct TrackerInner {
    site_id: RwLock<String>,
    collector_url: String,
    policy: StatePolicy,
    page: Arc<dyn Page>,
    session: SessionStore,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    dispatch_lock: tokio::sync::Mutex<()>,
}

/// Page-level tracker. Clones share the same state.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    pub fn new(
        config: TrackerConfig,
        page: Arc<dyn Page>,
        store: Arc<dyn StateStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_clock(config, page, store, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: TrackerConfig,
        page: Arc<dyn Page>,
        store: Arc<dyn StateStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session = SessionStore::new(
            store,
            clock.clone(),
            config.state_key,
            config.policy.clone(),
        );
        Self {
            inner: Arc::new(TrackerInner {
                site_id: RwLock::new(config.site_id),
                collector_url: config.collector_url,
                policy: config.policy,
                page,
                session,
                transport,
                clock,
                dispatch_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn set_site_id(&self, site_id: impl Into<String>) {
        *self
            .inner
            .site_id
            .write()
            .unwrap_or_else(|e| e.into_inner()) = site_id.into();
    }

    pub fn site_id(&self) -> String {
        self.inner
            .site_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn collector_url(&self) -> &str {
        &self.inner.collector_url
    }

    pub fn policy(&self) -> &StatePolicy {
        &self.inner.policy
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.inner.page
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Run the gates, read state, build the record and start the transfer.
    pub fn prepare(&self, overrides: PageviewOverrides) -> Prepared {
        pageview_handlers::prepare_pageview(self, overrides)
    }

    /// Track one pageview and wait for the delivery race to settle.
    pub async fn track_pageview(&self, overrides: PageviewOverrides) -> TrackOutcome {
        match pageview_handlers::capture_page(self, overrides) {
            Ok(snapshot) => self.send(snapshot).await,
            Err(halted) => halted.into(),
        }
    }

    async fn send(&self, snapshot: PageSnapshot) -> TrackOutcome {
        let _serialized = if self.inner.policy.serialize_dispatch {
            Some(self.inner.dispatch_lock.lock().await)
        } else {
            None
        };
        snapshot.start(self).deliver().await
    }

    /// Fire-and-forget tracking. The page and site id are captured before
    /// this returns, so calls keep their order. Without serialized dispatch
    /// the record is built here too.
    pub fn spawn_pageview(&self, overrides: PageviewOverrides) -> Option<JoinHandle<TrackOutcome>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, pageview dropped");
            return None;
        };

        let handle = match pageview_handlers::capture_page(self, overrides) {
            Err(halted) => runtime.spawn(async move { TrackOutcome::from(halted) }),
            Ok(snapshot) if self.inner.policy.serialize_dispatch => {
                let tracker = self.clone();
                runtime.spawn(async move { tracker.send(snapshot).await })
            }
            Ok(snapshot) => runtime.spawn(snapshot.start(self).deliver()),
        };
        Some(handle)
    }

    /// The single global entry point: a command name plus its arguments.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<JoinHandle<TrackOutcome>> {
        command_handlers::call(self, name, args)
    }

    /// Track a pageview for every synthetic navigation, captured while the
    /// navigating call is still on the stack. `None` when the page does not
    /// support history interception.
    pub fn watch_navigation(&self) -> Option<NavigationInterceptor> {
        let interceptor = NavigationInterceptor::install(&*self.inner.page)?;
        let tracker = Arc::downgrade(&self.inner);
        interceptor.listen(Arc::new(move |event: &NavigationEvent| {
            let Some(inner) = tracker.upgrade() else {
                return;
            };
            debug!("Navigation event {}", event.kind);
            Tracker { inner }.spawn_pageview(PageviewOverrides::default());
        }));
        Some(interceptor)
    }
}

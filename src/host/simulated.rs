use anyhow::{Context, Result, bail};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use url::Url;

use crate::host::navigation::{EventBus, History};
use crate::host::pixel::PixelElement;
use crate::host::{Page, VisibilityState};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// History backed by the simulated page's location.
struct SimulatedHistory {
    location: Arc<Mutex<Url>>,
}

impl History for SimulatedHistory {
    fn push_state(&self, _state: Value, _title: &str, url: Option<&str>) -> Result<()> {
        let Some(url) = url else {
            return Ok(());
        };
        let mut location = locked(&self.location);
        let next = location
            .join(url)
            .with_context(|| format!("Invalid pushState url {:?}", url))?;
        if next.origin() != location.origin() {
            bail!("pushState cannot change origin to {}", next);
        }
        *location = next;
        Ok(())
    }
}

/// A scriptable document for running the tracker outside a browser.
pub struct SimulatedPage {
    location: Arc<Mutex<Url>>,
    do_not_track: Mutex<Option<String>>,
    visibility: Mutex<Option<VisibilityState>>,
    canonical: Mutex<Option<String>>,
    referrer: Mutex<String>,
    ready: watch::Sender<bool>,
    pixels: Mutex<Vec<Arc<PixelElement>>>,
    pixels_appended: AtomicUsize,
    history: Mutex<Option<Arc<dyn History>>>,
    bus: Option<EventBus>,
}

impl SimulatedPage {
    /// A fully loaded page at `location`.
    pub fn new(location: Url) -> Self {
        let location = Arc::new(Mutex::new(location));
        let history: Arc<dyn History> = Arc::new(SimulatedHistory {
            location: location.clone(),
        });
        let (ready, _) = watch::channel(true);

        Self {
            location,
            do_not_track: Mutex::new(None),
            visibility: Mutex::new(Some(VisibilityState::Visible)),
            canonical: Mutex::new(None),
            referrer: Mutex::new(String::new()),
            ready,
            pixels: Mutex::new(Vec::new()),
            pixels_appended: AtomicUsize::new(0),
            history: Mutex::new(Some(history)),
            bus: Some(EventBus::default()),
        }
    }

    /// A page whose body has not been parsed yet.
    pub fn loading(location: Url) -> Self {
        let page = Self::new(location);
        page.ready.send_replace(false);
        page
    }

    pub fn without_navigation_api(mut self) -> Self {
        *locked(&self.history) = None;
        self.bus = None;
        self
    }

    pub fn mark_dom_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn set_do_not_track(&self, value: Option<&str>) {
        *locked(&self.do_not_track) = value.map(str::to_string);
    }

    pub fn set_visibility(&self, state: Option<VisibilityState>) {
        *locked(&self.visibility) = state;
    }

    pub fn set_canonical(&self, href: Option<&str>) {
        *locked(&self.canonical) = href.map(str::to_string);
    }

    pub fn set_referrer(&self, referrer: &str) {
        *locked(&self.referrer) = referrer.to_string();
    }

    pub fn set_location(&self, location: Url) {
        *locked(&self.location) = location;
    }

    pub fn attached_pixels(&self) -> Vec<Arc<PixelElement>> {
        locked(&self.pixels).clone()
    }

    /// Pixels ever appended, i.e. transfers initiated.
    pub fn pixels_appended(&self) -> usize {
        self.pixels_appended.load(Ordering::SeqCst)
    }
}

impl Page for SimulatedPage {
    fn do_not_track(&self) -> Option<String> {
        locked(&self.do_not_track).clone()
    }

    fn visibility_state(&self) -> Option<VisibilityState> {
        *locked(&self.visibility)
    }

    fn body_ready(&self) -> bool {
        *self.ready.borrow()
    }

    fn dom_ready(&self) -> BoxFuture<'static, ()> {
        let mut ready = self.ready.subscribe();
        Box::pin(async move {
            let _ = ready.wait_for(|loaded| *loaded).await;
        })
    }

    fn location(&self) -> Url {
        locked(&self.location).clone()
    }

    fn canonical_href(&self) -> Option<String> {
        locked(&self.canonical).clone()
    }

    fn referrer(&self) -> String {
        locked(&self.referrer).clone()
    }

    fn attach_pixel(&self, pixel: Arc<PixelElement>) {
        self.pixels_appended.fetch_add(1, Ordering::SeqCst);
        locked(&self.pixels).push(pixel);
    }

    fn detach_pixel(&self, pixel: &PixelElement) -> bool {
        let mut pixels = locked(&self.pixels);
        let before = pixels.len();
        pixels.retain(|attached| attached.id() != pixel.id());
        pixels.len() != before
    }

    fn history(&self) -> Option<Arc<dyn History>> {
        locked(&self.history).clone()
    }

    fn replace_history(&self, history: Arc<dyn History>) -> bool {
        let mut slot = locked(&self.history);
        if slot.is_none() {
            return false;
        }
        *slot = Some(history);
        true
    }

    fn event_bus(&self) -> Option<EventBus> {
        self.bus.clone()
    }
}

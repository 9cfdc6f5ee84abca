use anyhow::Result;
use futures_util::future::BoxFuture;
use log::{debug, warn};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::time::{Instant, sleep_until, timeout_at};

use crate::host::VisibilityState;
use crate::host::pixel::PixelElement;
use crate::models::pageview::PageviewRecord;
use crate::models::visitor_state::VisitorSessionState;
use crate::structs::outcome::{DeliveryStatus, SkipReason, TrackOutcome};
use crate::structs::overrides::PageviewOverrides;
use crate::tracker::Tracker;
use crate::utils::location::{DerivedPage, derive_page, is_untrackable_host, resolve_location};
use crate::utils::random_id::pageview_id;

/// Result of the synchronous half of tracking a pageview.
pub enum Prepared {
    Skipped(SkipReason),
    Deferred,
    Ready(PendingBeacon),
}

/// A gate stopped the pageview before any state was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halted {
    Skipped(SkipReason),
    Deferred,
}

impl From<Halted> for Prepared {
    fn from(halted: Halted) -> Self {
        match halted {
            Halted::Skipped(reason) => Prepared::Skipped(reason),
            Halted::Deferred => Prepared::Deferred,
        }
    }
}

impl From<Halted> for TrackOutcome {
    fn from(halted: Halted) -> Self {
        match halted {
            Halted::Skipped(reason) => TrackOutcome::Skipped { reason },
            Halted::Deferred => TrackOutcome::Deferred,
        }
    }
}

/// What the page looked like when the call was made: location, referrer
/// and site id, fixed before any state is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    page: DerivedPage,
    site_id: String,
}

/// A beacon whose transfer is in flight.
pub struct PendingBeacon {
    tracker: Tracker,
    record: PageviewRecord,
    state: VisitorSessionState, // As read when the record was built
    pixel: Arc<PixelElement>,
    transfer: BoxFuture<'static, Result<()>>,
    deadline: Instant,
}

pub fn prepare_pageview(tracker: &Tracker, overrides: PageviewOverrides) -> Prepared {
    match capture_page(tracker, overrides) {
        Ok(snapshot) => Prepared::Ready(snapshot.start(tracker)),
        Err(halted) => halted.into(),
    }
}

/// Run the gates and snapshot the page. Reads no state.
pub fn capture_page(
    tracker: &Tracker,
    overrides: PageviewOverrides,
) -> Result<PageSnapshot, Halted> {
    let page = tracker.page();

    if page.do_not_track().as_deref() == Some("1") {
        debug!("Do-not-track is set, skipping pageview");
        return Err(Halted::Skipped(SkipReason::DoNotTrack));
    }

    if page.visibility_state() == Some(VisibilityState::Prerender) {
        debug!("Page is prerendering, skipping pageview");
        return Err(Halted::Skipped(SkipReason::Prerender));
    }

    if !page.body_ready() {
        defer_until_dom_ready(tracker, overrides);
        return Err(Halted::Deferred);
    }

    let location = resolve_location(page.location(), page.canonical_href().as_deref());
    if is_untrackable_host(&location) {
        debug!("Not tracking local or empty host: {}", location);
        return Err(Halted::Skipped(SkipReason::UntrackableHost));
    }

    Ok(PageSnapshot {
        page: derive_page(&location, &overrides, &page.referrer()),
        site_id: tracker.site_id(),
    })
}

impl PageSnapshot {
    /// Read state, build the record, attach the pixel and start the load.
    pub fn start(self, tracker: &Tracker) -> PendingBeacon {
        let state = tracker.session().read();
        let record = PageviewRecord::new(pageview_id(), &state, self.page, &self.site_id);

        let pixel = Arc::new(PixelElement::new(record.beacon_url(tracker.collector_url())));
        let deadline = Instant::now() + tracker.policy().delivery_timeout;
        let transfer = tracker.transport().load(pixel.src());
        tracker.page().attach_pixel(pixel.clone());

        PendingBeacon {
            tracker: tracker.clone(),
            record,
            state,
            pixel,
            transfer,
            deadline,
        }
    }
}

// Re-enter with the same overrides once the body exists.
fn defer_until_dom_ready(tracker: &Tracker, overrides: PageviewOverrides) {
    let Ok(runtime) = Handle::try_current() else {
        warn!("No async runtime available, deferred pageview dropped");
        return;
    };
    debug!("Document body not ready, deferring pageview");

    let ready = tracker.page().dom_ready();
    let tracker = tracker.clone();
    runtime.spawn(async move {
        ready.await;
        tracker.track_pageview(overrides).await
    });
}

impl PendingBeacon {
    pub fn record(&self) -> &PageviewRecord {
        &self.record
    }

    pub fn pixel(&self) -> &Arc<PixelElement> {
        &self.pixel
    }

    /// Race the transfer against the deadline. Only a confirmed load
    /// touches the stored state.
    pub async fn deliver(self) -> TrackOutcome {
        let PendingBeacon {
            tracker,
            record,
            mut state,
            pixel,
            transfer,
            deadline,
        } = self;

        let status = match timeout_at(deadline, transfer).await {
            Ok(Ok(())) => {
                state.advance(&record, tracker.clock().now_millis());
                if let Err(e) = tracker.session().write(&state) {
                    warn!("Pageview {} delivered but state not saved: {:#}", record.id, e);
                }
                tracker.page().detach_pixel(&pixel);
                DeliveryStatus::Loaded
            }
            Ok(Err(e)) => {
                debug!("Pageview {} not delivered: {:#}", record.id, e);
                sleep_until(deadline).await;
                cancel_pixel(&tracker, &pixel);
                DeliveryStatus::Failed
            }
            Err(_) => {
                debug!("Pageview {} timed out", record.id);
                cancel_pixel(&tracker, &pixel);
                DeliveryStatus::TimedOut
            }
        };

        TrackOutcome::Sent { status, record }
    }
}

fn cancel_pixel(tracker: &Tracker, pixel: &PixelElement) {
    if tracker.page().detach_pixel(pixel) {
        pixel.clear_src();
    }
}

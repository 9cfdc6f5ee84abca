pub mod navigation;
pub mod pixel;
pub mod simulated;

use futures_util::future::BoxFuture;
use std::sync::Arc;
use url::Url;

use crate::host::navigation::{EventBus, History};
use crate::host::pixel::PixelElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Visible,
    Hidden,
    Prerender,
}

/// Everything the tracker needs from the document it runs in.
pub trait Page: Send + Sync {
    /// Raw do-not-track flag, `None` when the user agent has none.
    fn do_not_track(&self) -> Option<String>;

    /// `None` when the environment has no visibility API.
    fn visibility_state(&self) -> Option<VisibilityState>;

    fn body_ready(&self) -> bool;

    /// Resolves once the DOM has loaded. Resolves immediately if it already has.
    fn dom_ready(&self) -> BoxFuture<'static, ()>;

    fn location(&self) -> Url;

    /// `href` of the first `link[rel="canonical"]`, if any.
    fn canonical_href(&self) -> Option<String>;

    fn referrer(&self) -> String;

    fn attach_pixel(&self, pixel: Arc<PixelElement>);

    /// Remove a pixel from the body. Returns `false` if it was not attached.
    fn detach_pixel(&self, pixel: &PixelElement) -> bool;

    fn history(&self) -> Option<Arc<dyn History>> {
        None
    }

    /// Swap the page's history entry point. Returns `false` when unsupported.
    fn replace_history(&self, _history: Arc<dyn History>) -> bool {
        false
    }

    fn event_bus(&self) -> Option<EventBus> {
        None
    }
}

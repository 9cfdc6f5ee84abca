use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PIXEL_ID: AtomicU64 = AtomicU64::new(1);

/// The invisible image a beacon travels through.
#[derive(Debug)]
pub struct PixelElement {
    id: u64,
    src: Mutex<String>,
}

impl PixelElement {
    pub const ATTRIBUTES: [(&'static str, &'static str); 3] = [
        ("alt", ""),
        ("aria-hidden", "true"),
        ("style", "display:none"),
    ];

    pub fn new(src: impl Into<String>) -> Self {
        Self {
            id: NEXT_PIXEL_ID.fetch_add(1, Ordering::Relaxed),
            src: Mutex::new(src.into()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn src(&self) -> String {
        self.src.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Blanking the source is how an in-flight load gets cancelled.
    pub fn clear_src(&self) {
        self.src.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

use serde::{Deserialize, Serialize};

/// Caller-supplied values that replace what the page would report.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PageviewOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl PageviewOverrides {
    // Empty strings count as "not supplied".
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref().filter(|h| !h.is_empty())
    }

    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref().filter(|r| !r.is_empty())
    }
}

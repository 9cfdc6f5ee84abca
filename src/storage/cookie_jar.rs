use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::{Arc, Mutex};

use crate::storage::{StateStore, StoreOptions};
use crate::utils::clock::Clock;
use crate::utils::query_string::{decode_component, encode_component};

const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,  // Raw, as assigned
    value: String, // Raw, as assigned
    path: String,
    expires: Option<DateTime<Utc>>,
}

/// In-memory stand-in for a browser's `document.cookie`.
pub struct CookieJar {
    clock: Arc<dyn Clock>,
    cookies: Mutex<Vec<StoredCookie>>,
}

impl CookieJar {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            cookies: Mutex::new(Vec::new()),
        }
    }

    /// Equivalent of `document.cookie = "<assignment>"`.
    pub fn assign(&self, assignment: &str) {
        let mut parts = assignment.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };

        let mut cookie = StoredCookie {
            name: name.trim().to_string(),
            value: value.to_string(),
            path: "/".to_string(),
            expires: None,
        };
        for attribute in parts {
            match attribute.trim().split_once('=') {
                Some((key, v)) if key.eq_ignore_ascii_case("path") => cookie.path = v.to_string(),
                Some((key, v)) if key.eq_ignore_ascii_case("expires") => {
                    cookie.expires = NaiveDateTime::parse_from_str(v, COOKIE_DATE_FORMAT)
                        .ok()
                        .map(|t| t.and_utc());
                }
                _ => {}
            }
        }

        let now = self.clock.now().with_timezone(&Utc);
        let mut cookies = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        cookies.retain(|c| !(c.name == cookie.name && c.path == cookie.path));
        if cookie.expires.is_none_or(|at| at > now) {
            cookies.push(cookie);
        }
    }

    /// Equivalent of reading `document.cookie`.
    pub fn header(&self) -> String {
        let now = self.clock.now().with_timezone(&Utc);
        let cookies = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        cookies
            .iter()
            .filter(|c| c.expires.is_none_or(|at| at > now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl StateStore for CookieJar {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let header = self.header();
        for cookie in header.split("; ").filter(|c| !c.is_empty()) {
            let (raw_name, raw_value) = cookie.split_once('=').unwrap_or((cookie, ""));
            if decode_component(raw_name) == name {
                return Ok(Some(decode_component(raw_value)));
            }
        }
        Ok(None)
    }

    fn set(&self, name: &str, value: &str, options: &StoreOptions) -> Result<()> {
        let mut assignment = format!("{}={}", encode_component(name), encode_component(value));
        if !options.path.is_empty() {
            assignment.push_str(";path=");
            assignment.push_str(&options.path);
        }
        if let Some(expires) = options.expires {
            assignment.push_str(";expires=");
            assignment.push_str(&expires.format(COOKIE_DATE_FORMAT).to_string());
        }
        self.assign(&assignment);
        Ok(())
    }
}

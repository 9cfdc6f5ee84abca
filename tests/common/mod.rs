#![allow(dead_code)]

use anyhow::{Result, anyhow};
use chrono::{Local, TimeZone};
use futures_util::future::{self, BoxFuture};
use pageview_beacon::host::simulated::SimulatedPage;
use pageview_beacon::storage::cookie_jar::CookieJar;
use pageview_beacon::utils::clock::ManualClock;
use pageview_beacon::{Tracker, TrackerConfig, Transport};
use std::sync::{Arc, Mutex};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Load,
    Fail,
    Hang,
}

/// Transport that answers every load the same way and remembers the URLs.
pub struct ScriptedTransport {
    reply: Mutex<Reply>,
    loads: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            loads: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn load(&self, src: String) -> BoxFuture<'static, Result<()>> {
        self.loads.lock().unwrap().push(src);
        match *self.reply.lock().unwrap() {
            Reply::Load => Box::pin(future::ready(Ok(()))),
            Reply::Fail => Box::pin(future::ready(Err(anyhow!("image failed to load")))),
            Reply::Hang => Box::pin(future::pending()),
        }
    }
}

pub struct Harness {
    pub page: Arc<SimulatedPage>,
    pub jar: Arc<CookieJar>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<ScriptedTransport>,
    pub tracker: Tracker,
}

impl Harness {
    pub fn new(url: &str, reply: Reply) -> Self {
        Self::with_config(url, reply, TrackerConfig::default())
    }

    pub fn with_config(url: &str, reply: Reply, mut config: TrackerConfig) -> Self {
        Self::with_page(SimulatedPage::new(Url::parse(url).unwrap()), reply, {
            if config.site_id.is_empty() {
                config.site_id = "site-1".to_string();
            }
            config
        })
    }

    pub fn with_page(page: SimulatedPage, reply: Reply, config: TrackerConfig) -> Self {
        let start = Local.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::at(start));
        let jar = Arc::new(CookieJar::new(clock.clone()));
        let page = Arc::new(page);
        let transport = Arc::new(ScriptedTransport::new(reply));
        let tracker = Tracker::with_clock(
            config,
            page.clone(),
            jar.clone(),
            transport.clone(),
            clock.clone(),
        );
        Self {
            page,
            jar,
            clock,
            transport,
            tracker,
        }
    }
}

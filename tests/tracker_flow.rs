mod common;

use chrono::Duration as ChronoDuration;
use common::{Harness, Reply};
use pageview_beacon::host::VisibilityState;
use pageview_beacon::host::simulated::SimulatedPage;
use pageview_beacon::{
    CommandQueue, DeliveryStatus, Page, PageviewOverrides, Prepared, SkipReason, TrackOutcome,
    TrackerConfig,
};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

async fn settle<F: Fn() -> bool>(done: F) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn first_visit_reports_new_everything_and_commits() {
    let h = Harness::new("https://example.com/a", Reply::Load);

    let outcome = h.tracker.track_pageview(PageviewOverrides::default()).await;

    assert_eq!(outcome.status(), Some(DeliveryStatus::Loaded));
    let record = outcome.record().unwrap();
    assert_eq!(record.p, "/a");
    assert_eq!(record.h, "https://example.com");
    assert_eq!(record.r, "");
    assert_eq!((record.u, record.nv, record.ns), (1, 1, 1));
    assert_eq!(record.pid, "");
    assert_eq!(record.sid, "site-1");
    assert_eq!(record.id.len(), 20);

    let state = h.tracker.session().read();
    assert_eq!(state.pages_viewed, vec!["/a".to_string()]);
    assert!(!state.is_new_visitor);
    assert!(!state.is_new_session);
    assert_eq!(state.previous_pageview_id, record.id);

    assert!(h.page.attached_pixels().is_empty());
    let loads = h.transport.loads();
    assert_eq!(loads.len(), 1);
    assert!(loads[0].starts_with(&format!(
        "https://collector.teltrics.com/collectPageview?id={}&pid=&p=%2Fa&h=https%3A%2F%2Fexample.com",
        record.id
    )));
}

#[tokio::test]
async fn revisit_in_same_session_chains_ids() {
    let h = Harness::new("https://example.com/a", Reply::Load);

    let first = h.tracker.track_pageview(PageviewOverrides::default()).await;
    h.clock.advance(ChronoDuration::seconds(5));
    let second = h.tracker.track_pageview(PageviewOverrides::default()).await;

    let first = first.record().unwrap();
    let second = second.record().unwrap();
    assert_eq!((second.u, second.nv, second.ns), (0, 0, 0));
    assert_eq!(second.pid, first.id);
    assert_eq!(h.tracker.session().read().previous_pageview_id, second.id);
    assert_eq!(h.tracker.session().read().pages_viewed, vec!["/a".to_string()]);
}

#[tokio::test]
async fn idle_gap_starts_new_session_for_known_visitor() {
    let h = Harness::new("https://example.com/a", Reply::Load);
    h.tracker.track_pageview(PageviewOverrides::default()).await;

    h.clock.advance(ChronoDuration::minutes(31));
    h.page.set_location(Url::parse("https://example.com/b").unwrap());
    let outcome = h.tracker.track_pageview(PageviewOverrides::default()).await;

    let record = outcome.record().unwrap();
    assert_eq!((record.u, record.nv, record.ns), (1, 0, 1));
    assert_eq!(
        h.tracker.session().read().pages_viewed,
        vec!["/a".to_string(), "/b".to_string()]
    );
}

#[tokio::test]
async fn canonical_link_drives_path_and_hostname() {
    let h = Harness::new("https://example.com/a?x=1", Reply::Load);
    h.page.set_canonical(Some("https://canon.example.com/c"));

    let outcome = h.tracker.track_pageview(PageviewOverrides::default()).await;

    let record = outcome.record().unwrap();
    assert_eq!(record.p, "/c");
    assert_eq!(record.h, "https://canon.example.com");
}

#[tokio::test]
async fn internal_referrer_is_dropped_and_external_kept() {
    let h = Harness::new("https://example.com/a", Reply::Load);

    h.page.set_referrer("https://example.com/previous");
    let internal = h.tracker.track_pageview(PageviewOverrides::default()).await;
    assert_eq!(internal.record().unwrap().r, "");

    h.page.set_referrer("https://search.test/?q=example");
    let external = h.tracker.track_pageview(PageviewOverrides::default()).await;
    assert_eq!(external.record().unwrap().r, "https://search.test/?q=example");
}

#[tokio::test]
async fn overrides_replace_hostname_and_referrer() {
    let h = Harness::new("https://example.com/a", Reply::Load);
    h.page.set_referrer("https://search.test/");

    let outcome = h
        .tracker
        .track_pageview(PageviewOverrides {
            hostname: Some("https://www.example.com".to_string()),
            referrer: Some("https://campaign.test/".to_string()),
        })
        .await;

    let record = outcome.record().unwrap();
    assert_eq!(record.h, "https://www.example.com");
    assert_eq!(record.r, "https://campaign.test/");
}

#[tokio::test]
async fn do_not_track_blocks_every_transfer() {
    let h = Harness::new("https://example.com/a", Reply::Load);
    h.page.set_do_not_track(Some("1"));

    let inputs = [
        PageviewOverrides::default(),
        PageviewOverrides {
            hostname: Some("https://h.test".to_string()),
            referrer: None,
        },
        PageviewOverrides {
            hostname: None,
            referrer: Some("https://r.test".to_string()),
        },
    ];
    for overrides in inputs {
        let outcome = h.tracker.track_pageview(overrides).await;
        assert_eq!(
            outcome,
            TrackOutcome::Skipped {
                reason: SkipReason::DoNotTrack
            }
        );
    }

    assert!(h.transport.loads().is_empty());
    assert_eq!(h.page.pixels_appended(), 0);
    assert_eq!(h.jar.header(), "");
}

#[tokio::test]
async fn do_not_track_other_values_still_track() {
    let h = Harness::new("https://example.com/a", Reply::Load);
    h.page.set_do_not_track(Some("0"));

    let outcome = h.tracker.track_pageview(PageviewOverrides::default()).await;
    assert_eq!(outcome.status(), Some(DeliveryStatus::Loaded));
}

#[tokio::test]
async fn prerendered_page_is_skipped() {
    let h = Harness::new("https://example.com/a", Reply::Load);
    h.page.set_visibility(Some(VisibilityState::Prerender));

    let outcome = h.tracker.track_pageview(PageviewOverrides::default()).await;
    assert_eq!(
        outcome,
        TrackOutcome::Skipped {
            reason: SkipReason::Prerender
        }
    );
    assert!(h.transport.loads().is_empty());
}

#[tokio::test]
async fn local_hosts_are_skipped() {
    for url in ["http://localhost:3000/a", "http://127.0.0.1/a"] {
        let h = Harness::new(url, Reply::Load);
        let outcome = h.tracker.track_pageview(PageviewOverrides::default()).await;
        assert_eq!(
            outcome,
            TrackOutcome::Skipped {
                reason: SkipReason::UntrackableHost
            }
        );
        assert!(h.transport.loads().is_empty());
    }
}

#[tokio::test]
async fn canonical_to_localhost_is_skipped() {
    let h = Harness::new("https://example.com/a", Reply::Load);
    h.page.set_canonical(Some("http://localhost/a"));

    let outcome = h.tracker.track_pageview(PageviewOverrides::default()).await;
    assert_eq!(
        outcome,
        TrackOutcome::Skipped {
            reason: SkipReason::UntrackableHost
        }
    );
}

#[tokio::test(start_paused = true)]
async fn silent_collector_times_out_without_touching_state() {
    let h = Harness::new("https://example.com/a", Reply::Hang);
    let before = h.jar.header();

    let Prepared::Ready(beacon) = h.tracker.prepare(PageviewOverrides::default()) else {
        panic!("expected a beacon");
    };
    let pixel = beacon.pixel().clone();
    assert_eq!(h.page.attached_pixels().len(), 1);
    assert!(!pixel.src().is_empty());

    let started = Instant::now();
    let outcome = beacon.deliver().await;

    assert_eq!(outcome.status(), Some(DeliveryStatus::TimedOut));
    assert!(started.elapsed() >= Duration::from_millis(5000));
    assert!(h.page.attached_pixels().is_empty());
    assert_eq!(pixel.src(), "");
    assert_eq!(h.jar.header(), before);
    assert!(h.tracker.session().read().is_new_visitor);
}

#[tokio::test(start_paused = true)]
async fn failed_load_keeps_state_and_pixel_until_deadline() {
    let h = Harness::new("https://example.com/a", Reply::Fail);

    let started = Instant::now();
    let outcome = h.tracker.track_pageview(PageviewOverrides::default()).await;

    assert_eq!(outcome.status(), Some(DeliveryStatus::Failed));
    assert!(started.elapsed() >= Duration::from_millis(5000));
    assert!(h.page.attached_pixels().is_empty());
    assert_eq!(h.jar.header(), "");

    // The next attempt still looks like a first visit.
    h.transport.set_reply(Reply::Load);
    let retry = h.tracker.track_pageview(PageviewOverrides::default()).await;
    let record = retry.record().unwrap();
    assert_eq!((record.u, record.nv, record.pid.as_str()), (1, 1, ""));
}

#[tokio::test(start_paused = true)]
async fn delivery_timeout_is_configurable() {
    let mut config = TrackerConfig::default();
    config.policy.delivery_timeout = Duration::from_millis(250);
    let h = Harness::with_config("https://example.com/a", Reply::Hang, config);

    let started = Instant::now();
    let outcome = h.tracker.track_pageview(PageviewOverrides::default()).await;

    assert_eq!(outcome.status(), Some(DeliveryStatus::TimedOut));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(250));
    assert!(elapsed < Duration::from_millis(5000));
}

#[tokio::test]
async fn body_not_ready_defers_with_same_overrides() {
    let page = SimulatedPage::loading(Url::parse("https://example.com/a").unwrap());
    let h = Harness::with_page(page, Reply::Load, TrackerConfig::default());
    let overrides = PageviewOverrides {
        hostname: Some("https://override.test".to_string()),
        referrer: Some("https://from.test/".to_string()),
    };

    let outcome = h.tracker.track_pageview(overrides).await;
    assert_eq!(outcome, TrackOutcome::Deferred);
    assert!(h.transport.loads().is_empty());

    h.page.mark_dom_ready();
    settle(|| !h.tracker.session().read().is_new_visitor).await;

    let loads = h.transport.loads();
    assert_eq!(loads.len(), 1);
    assert!(loads[0].contains("&h=https%3A%2F%2Foverride.test&"));
    assert!(loads[0].contains("&r=https%3A%2F%2Ffrom.test%2F&"));
}

#[tokio::test]
async fn overlapping_calls_can_lose_an_update() {
    let h = Harness::new("https://example.com/a", Reply::Load);

    let Prepared::Ready(first) = h.tracker.prepare(PageviewOverrides::default()) else {
        panic!("expected a beacon");
    };
    h.page.set_location(Url::parse("https://example.com/b").unwrap());
    let Prepared::Ready(second) = h.tracker.prepare(PageviewOverrides::default()) else {
        panic!("expected a beacon");
    };

    first.deliver().await;
    let second = second.deliver().await;

    let state = h.tracker.session().read();
    assert_eq!(state.pages_viewed, vec!["/b".to_string()]);
    assert_eq!(state.previous_pageview_id, second.record().unwrap().id);
}

#[tokio::test]
async fn serialized_dispatch_chains_concurrent_calls() {
    let mut config = TrackerConfig::default();
    config.policy.serialize_dispatch = true;
    let h = Harness::with_config("https://example.com/a", Reply::Load, config);

    let (a, b) = tokio::join!(
        h.tracker.track_pageview(PageviewOverrides::default()),
        h.tracker.track_pageview(PageviewOverrides::default()),
    );

    let a = a.record().unwrap();
    let b = b.record().unwrap();
    assert_eq!(a.pid, "");
    assert_eq!(b.pid, a.id);
    assert_eq!(b.nv, 0);
}

#[tokio::test]
async fn push_state_triggers_pageview() {
    let h = Harness::new("https://example.com/a", Reply::Load);
    let watcher = h.tracker.watch_navigation();
    assert!(watcher.is_some());

    h.page
        .history()
        .unwrap()
        .push_state(Value::Null, "", Some("/b"))
        .unwrap();

    settle(|| !h.tracker.session().read().pages_viewed.is_empty()).await;
    assert_eq!(h.tracker.session().read().pages_viewed, vec!["/b".to_string()]);
    assert!(h.transport.loads()[0].contains("&p=%2Fb&"));
}

fn path_params(loads: &[String]) -> Vec<String> {
    loads
        .iter()
        .filter_map(|src| src.split("&p=").nth(1))
        .filter_map(|rest| rest.split('&').next())
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn back_to_back_push_states_track_each_route() {
    let h = Harness::new("https://example.com/a", Reply::Load);
    let _watcher = h.tracker.watch_navigation().unwrap();

    let history = h.page.history().unwrap();
    history.push_state(Value::Null, "", Some("/b")).unwrap();
    history.push_state(Value::Null, "", Some("/c")).unwrap();

    assert_eq!(path_params(&h.transport.loads()), vec!["%2Fb", "%2Fc"]);
}

#[tokio::test]
async fn no_navigation_api_means_no_watcher() {
    let page = SimulatedPage::new(Url::parse("https://example.com/a").unwrap())
        .without_navigation_api();
    let h = Harness::with_page(page, Reply::Load, TrackerConfig::default());

    assert!(h.tracker.watch_navigation().is_none());
}

#[tokio::test]
async fn queued_commands_replay_in_order() {
    let h = Harness::new("https://example.com/a", Reply::Load);
    let queue = CommandQueue::from_json(&json!([
        ["setSiteId", "first"],
        ["trackPageview"],
        ["setSiteId", "second"],
        ["trackPageview", {"referrer": "https://r.test/"}],
        ["bogus"]
    ]))
    .unwrap();

    let handles = queue.replay(&h.tracker);
    assert_eq!(handles.len(), 2);
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert_eq!(outcomes[0].record().unwrap().sid, "first");
    assert_eq!(outcomes[1].record().unwrap().sid, "second");
    assert_eq!(outcomes[1].record().unwrap().r, "https://r.test/");
    assert_eq!(h.tracker.site_id(), "second");
}

#[tokio::test]
async fn serialized_replay_captures_site_id_at_call_time() {
    let mut config = TrackerConfig::default();
    config.policy.serialize_dispatch = true;
    let h = Harness::with_config("https://example.com/a", Reply::Load, config);
    let queue = CommandQueue::from_json(&json!([
        ["setSiteId", "first"],
        ["trackPageview"],
        ["setSiteId", "second"],
        ["trackPageview"]
    ]))
    .unwrap();

    let handles = queue.replay(&h.tracker);
    h.page.set_location(Url::parse("https://example.com/later").unwrap());
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    let first = outcomes[0].record().unwrap();
    let second = outcomes[1].record().unwrap();
    assert_eq!((first.sid.as_str(), first.p.as_str()), ("first", "/a"));
    assert_eq!((second.sid.as_str(), second.p.as_str()), ("second", "/a"));
    assert_eq!(second.pid, first.id);
}

#[tokio::test]
async fn global_callable_ignores_bad_calls() {
    let h = Harness::new("https://example.com/a", Reply::Load);

    assert!(h.tracker.call("nope", &[]).is_none());
    assert!(h.tracker.call("setSiteId", &[json!(7)]).is_none());
    assert!(h.tracker.call("setSiteId", &[json!("ok")]).is_none());
    assert_eq!(h.tracker.site_id(), "ok");

    let handle = h.tracker.call("trackPageview", &[]).unwrap();
    assert_eq!(handle.await.unwrap().status(), Some(DeliveryStatus::Loaded));
}

use anyhow::{Context, Result, bail};
use dotenv::dotenv;
use env_logger::Env;
use pageview_beacon::storage::file_store::FileStore;
use pageview_beacon::utils::clock::{Clock, SystemClock};
use pageview_beacon::{HttpTransport, PageviewOverrides, SimulatedPage, Tracker, TrackerConfig};
use std::env;
use std::sync::Arc;
use url::Url;

const DEFAULT_STATE_FILE: &str = ".pageview-beacon.json";

struct CliArgs {
    url: Url,
    referrer: Option<String>,
    canonical: Option<String>,
    do_not_track: bool,
    overrides: PageviewOverrides,
}

impl CliArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut url = None;
        let mut referrer = None;
        let mut canonical = None;
        let mut do_not_track = false;
        let mut overrides = PageviewOverrides::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--referrer" => referrer = Some(args.next().context("--referrer needs a value")?),
                "--canonical" => canonical = Some(args.next().context("--canonical needs a value")?),
                "--hostname" => {
                    overrides.hostname = Some(args.next().context("--hostname needs a value")?)
                }
                "--override-referrer" => {
                    overrides.referrer =
                        Some(args.next().context("--override-referrer needs a value")?)
                }
                "--dnt" => do_not_track = true,
                flag if flag.starts_with("--") => bail!("Unknown flag {}", flag),
                page => url = Some(Url::parse(page).with_context(|| format!("Invalid page URL {}", page))?),
            }
        }

        Ok(Self {
            url: url.context(
                "Usage: pageview-beacon <page-url> [--referrer URL] [--canonical URL] \
                 [--hostname H] [--override-referrer R] [--dnt]",
            )?,
            referrer,
            canonical,
            do_not_track,
            overrides,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = TrackerConfig::from_env()?;
    let args = CliArgs::parse(env::args().skip(1))?;
    let state_file = env::var("BEACON_STATE_FILE").unwrap_or_else(|_| DEFAULT_STATE_FILE.to_string());

    // Simulated document for the page being reported
    let page = Arc::new(SimulatedPage::new(args.url));
    if let Some(referrer) = &args.referrer {
        page.set_referrer(referrer);
    }
    page.set_canonical(args.canonical.as_deref());
    if args.do_not_track {
        page.set_do_not_track(Some("1"));
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(FileStore::new(state_file, clock.clone()));
    let tracker = Tracker::with_clock(
        config,
        page,
        store,
        Arc::new(HttpTransport::new()),
        clock,
    );

    let outcome = tracker.track_pageview(args.overrides).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

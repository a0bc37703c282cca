//! Headless-browser fallback: render the page so client-side redirects and
//! scripted content settle, then read coordinates off the final URL or the
//! rendered DOM.
//!
//! `headless_chrome` is synchronous, so the render runs on a blocking
//! thread. Dropping the `Browser` handle kills the Chrome process, which
//! holds on every exit path including panics and cancellation.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{validate_coordinates, Coordinate, StrategyKind};
use crate::extraction::pattern::PatternExtractor;
use crate::extraction::{ExtractionStrategy, StrategyError};

static AT_IN_RENDERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").unwrap());

pub struct BrowserAutomationScraper {
    page_load_timeout: Duration,
    script_timeout: Duration,
    settle_delay: Duration,
    user_agent: String,
}

impl BrowserAutomationScraper {
    pub fn new(
        page_load_timeout: Duration,
        script_timeout: Duration,
        settle_delay: Duration,
        user_agent: String,
    ) -> Self {
        Self {
            page_load_timeout,
            script_timeout,
            settle_delay,
            user_agent,
        }
    }

    /// One full launch-navigate-read cycle. Synchronous; runs on a
    /// blocking thread.
    fn render_once(&self, map_link: &str) -> Result<Option<Coordinate>, StrategyError> {
        let chrome_path = std::env::var("CHROME").ok().map(PathBuf::from);
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(chrome_path)
            .args(vec![
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-dev-shm-usage"),
            ])
            .idle_browser_timeout(self.page_load_timeout + self.script_timeout + self.settle_delay)
            .build()
            .map_err(|e| StrategyError::Browser(format!("invalid launch options: {e}")))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| StrategyError::Browser(format!("failed to launch browser: {e}")))?;

        let tab = browser
            .new_tab()
            .map_err(|e| StrategyError::Browser(format!("failed to open tab: {e}")))?;

        if let Err(e) = tab.set_user_agent(&self.user_agent, None, None) {
            warn!(error = %e, "failed to set browser user agent");
        }

        tab.set_default_timeout(self.page_load_timeout);
        tab.navigate_to(map_link)
            .map_err(|e| StrategyError::Browser(format!("navigation failed: {e}")))?;
        tab.wait_until_navigated()
            .map_err(|e| StrategyError::Browser(format!("page load failed: {e}")))?;

        // Let client-side redirects and map scripts finish.
        std::thread::sleep(self.settle_delay);
        tab.set_default_timeout(self.script_timeout);

        let final_url = tab.get_url();
        debug!(map_link, final_url, "browser navigation settled");

        let pattern = PatternExtractor::new();
        if let Some(coord) = pattern.extract_from_text(&final_url)? {
            return Ok(Some(coord));
        }

        let content = tab
            .get_content()
            .map_err(|e| StrategyError::Browser(format!("failed to read page content: {e}")))?;

        if let Some(caps) = AT_IN_RENDERED.captures(&content) {
            let lat = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<f64>().ok());
            let lng = caps
                .get(2)
                .and_then(|m| m.as_str().parse::<f64>().ok());
            if let (Some(lat), Some(lng)) = (lat, lng) {
                return validate_coordinates(lng, lat)
                    .map(Some)
                    .map_err(StrategyError::from);
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl ExtractionStrategy for BrowserAutomationScraper {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Browser
    }

    async fn extract(
        &self,
        map_link: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Coordinate>, StrategyError> {
        let scraper = Self::new(
            self.page_load_timeout,
            self.script_timeout,
            self.settle_delay,
            self.user_agent.clone(),
        );
        let map_link = map_link.to_string();

        let handle = tokio::task::spawn_blocking(move || scraper.render_once(&map_link));

        // The blocking task cannot observe the token mid-render; on cancel
        // we stop waiting and let the task finish on its thread, where the
        // Browser drop still tears down Chrome.
        tokio::select! {
            result = handle => match result {
                Ok(outcome) => outcome,
                Err(join_err) => Err(StrategyError::Task(join_err.to_string())),
            },
            _ = cancel.cancelled() => Err(StrategyError::Cancelled),
        }
    }
}

//! Redirect resolution for shortened and regional map links.
//!
//! One HEAD-style request expands the short link; the final URL then goes
//! through the same pattern rules as any other link. Exists specifically
//! for links that carry no coordinates in their original text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{Coordinate, StrategyKind};
use crate::extraction::pattern::PatternExtractor;
use crate::extraction::{ExtractionStrategy, StrategyError};
use crate::infrastructure::http::HttpClient;

pub struct RedirectResolver {
    http: Arc<HttpClient>,
    pattern: PatternExtractor,
    timeout: Duration,
    short_link_hosts: Vec<String>,
}

impl RedirectResolver {
    pub fn new(http: Arc<HttpClient>, timeout: Duration, short_link_hosts: Vec<String>) -> Self {
        Self {
            http,
            pattern: PatternExtractor::new(),
            timeout,
            short_link_hosts,
        }
    }

    /// Only short-link and regional hosts are worth a resolution request;
    /// canonical URLs either already matched the pattern rules or won't
    /// gain anything from a redirect.
    fn is_short_link(&self, map_link: &str) -> bool {
        self.short_link_hosts
            .iter()
            .any(|host| map_link.contains(host.as_str()))
    }
}

#[async_trait]
impl ExtractionStrategy for RedirectResolver {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Redirect
    }

    async fn extract(
        &self,
        map_link: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Coordinate>, StrategyError> {
        if !self.is_short_link(map_link) {
            debug!(map_link, "not a short link, skipping redirect resolution");
            return Ok(None);
        }

        let resolved = self
            .http
            .resolve_final_url(map_link, self.timeout, &cancel)
            .await
            .map_err(|e| StrategyError::Network(e.to_string()))?;

        if resolved == map_link {
            debug!(map_link, "redirect resolution left the URL unchanged");
            return Ok(None);
        }

        debug!(map_link, resolved, "resolved short link");
        self.pattern
            .extract_from_text(&resolved)
            .map_err(StrategyError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http::HttpClientConfig;

    fn resolver() -> RedirectResolver {
        let http = Arc::new(HttpClient::with_config(HttpClientConfig::default()).unwrap());
        RedirectResolver::new(
            http,
            Duration::from_secs(10),
            vec![
                "goo.gl".to_string(),
                "maps.app.goo.gl".to_string(),
                "google.co.za".to_string(),
            ],
        )
    }

    #[test]
    fn recognizes_short_link_hosts() {
        let resolver = resolver();
        assert!(resolver.is_short_link("https://goo.gl/maps/AbCdEf"));
        assert!(resolver.is_short_link("https://maps.app.goo.gl/XyZ"));
        assert!(resolver.is_short_link("https://google.co.za/maps/place/x"));
        assert!(!resolver.is_short_link("https://www.google.com/maps/@1.0,2.0,10z"));
    }

    #[tokio::test]
    async fn non_short_link_is_absent_without_network_io() {
        let resolver = resolver();
        let result = resolver
            .extract(
                "https://www.google.com/maps/@1.0,2.0,10z",
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result, None);
    }
}

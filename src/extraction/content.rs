//! Page-content scraping: fetch the target page and search the body for
//! coordinates in embedded links, JSON fragments, and geo meta tags.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{validate_coordinates, Coordinate, CoordinateRejection, StrategyKind};
use crate::extraction::{ExtractionStrategy, StrategyError};
use crate::infrastructure::http::HttpClient;

// "@lat,lng" inside page-internal links.
static AT_IN_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").unwrap());

// Map-viewport JSON fragment embedded in scripts.
static CENTER_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""center":\{"lat":(-?\d+\.\d+),"lng":(-?\d+\.\d+)\}"#).unwrap());

pub struct ContentScraper {
    http: Arc<HttpClient>,
    timeout: Duration,
}

impl ContentScraper {
    pub fn new(http: Arc<HttpClient>, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Search a fetched body. Split out from the fetch so the search
    /// order is testable without a server.
    pub(crate) fn extract_from_body(
        body: &str,
    ) -> Result<Option<Coordinate>, CoordinateRejection> {
        if let Some(caps) = AT_IN_BODY.captures(body) {
            if let Some((lat, lng)) = pair(&caps) {
                debug!(lat, lng, "found @-pair in page body");
                return validate_coordinates(lng, lat).map(Some);
            }
        }

        if let Some(caps) = CENTER_JSON.captures(body) {
            if let Some((lat, lng)) = pair(&caps) {
                debug!(lat, lng, "found center fragment in page body");
                return validate_coordinates(lng, lat).map(Some);
            }
        }

        if let Some((lat, lng)) = meta_geo_properties(body) {
            debug!(lat, lng, "found geo meta tags in page body");
            return validate_coordinates(lng, lat).map(Some);
        }

        Ok(None)
    }
}

fn pair(caps: &regex::Captures<'_>) -> Option<(f64, f64)> {
    let lat = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let lng = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some((lat, lng))
}

/// og:latitude / og:longitude meta properties. Both must be present and
/// numeric, otherwise the page contributes nothing.
fn meta_geo_properties(body: &str) -> Option<(f64, f64)> {
    let document = Html::parse_document(body);
    let lat_selector = Selector::parse(r#"meta[property="og:latitude"]"#).ok()?;
    let lng_selector = Selector::parse(r#"meta[property="og:longitude"]"#).ok()?;

    let lat = document
        .select(&lat_selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .and_then(|content| content.trim().parse::<f64>().ok())?;
    let lng = document
        .select(&lng_selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .and_then(|content| content.trim().parse::<f64>().ok())?;

    Some((lat, lng))
}

#[async_trait]
impl ExtractionStrategy for ContentScraper {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Content
    }

    async fn extract(
        &self,
        map_link: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Coordinate>, StrategyError> {
        let body = self
            .http
            .get_text(map_link, self.timeout, &cancel)
            .await
            .map_err(|e| {
                // Fetch failures here are routine (slow pages, dead hosts).
                debug!(map_link, error = %e, "content fetch failed");
                StrategyError::Network(e.to_string())
            })?;

        Self::extract_from_body(&body).map_err(StrategyError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_at_pair_in_body_links() {
        let body = r#"<html><a href="https://maps.example/@-26.108204,28.052706,17z">map</a></html>"#;
        let coord = ContentScraper::extract_from_body(body).unwrap().unwrap();
        assert_eq!(coord.latitude, -26.108204);
        assert_eq!(coord.longitude, 28.052706);
    }

    #[test]
    fn finds_center_json_fragment() {
        let body = r#"<script>var cfg = {"center":{"lat":-26.1,"lng":28.05}};</script>"#;
        let coord = ContentScraper::extract_from_body(body).unwrap().unwrap();
        assert_eq!(coord.latitude, -26.1);
        assert_eq!(coord.longitude, 28.05);
    }

    #[test]
    fn finds_geo_meta_tags() {
        let body = r#"<html><head>
            <meta property="og:latitude" content="-26.1" />
            <meta property="og:longitude" content="28.05" />
        </head></html>"#;
        let coord = ContentScraper::extract_from_body(body).unwrap().unwrap();
        assert_eq!(coord.latitude, -26.1);
        assert_eq!(coord.longitude, 28.05);
    }

    #[test]
    fn at_pair_takes_precedence_over_meta_tags() {
        let body = r#"<html><head>
            <meta property="og:latitude" content="1.0" />
            <meta property="og:longitude" content="2.0" />
        </head><body><a href="/@-26.1,28.05,10z">x</a></body></html>"#;
        let coord = ContentScraper::extract_from_body(body).unwrap().unwrap();
        assert_eq!(coord.latitude, -26.1);
    }

    #[test]
    fn meta_tags_require_both_axes() {
        let body = r#"<meta property="og:latitude" content="-26.1" />"#;
        assert_eq!(ContentScraper::extract_from_body(body).unwrap(), None);
    }

    #[test]
    fn out_of_range_body_pair_is_a_validation_rejection() {
        let body = r#"<a href="/@99.9999,28.0500,10z">x</a>"#;
        let err = ContentScraper::extract_from_body(body).unwrap_err();
        assert!(matches!(err, CoordinateRejection::InvalidLatitude { .. }));
    }

    #[test]
    fn empty_body_is_absent() {
        assert_eq!(ContentScraper::extract_from_body("").unwrap(), None);
    }
}

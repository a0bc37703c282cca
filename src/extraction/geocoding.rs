//! Geocoding lookup: derive a place query from the map link and resolve it
//! through an external places API. Degrades to absent when no API key is
//! configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::form_urlencoded;

use crate::domain::{validate_coordinates, Coordinate, StrategyKind};
use crate::extraction::{ExtractionStrategy, StrategyError};
use crate::infrastructure::http::HttpClient;

static QUERY_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]query=([^&]+)").unwrap());
static PLACE_SEG: Lazy<Regex> = Lazy::new(|| Regex::new(r"/place/([^/@?]+)").unwrap());
static SEARCH_SEG: Lazy<Regex> = Lazy::new(|| Regex::new(r"/search/([^/@?]+)").unwrap());

// A query= value that is already a bare coordinate pair; the pattern
// strategy owns those.
static BARE_COORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+\.?\d*(?:%2C|,)-?\d+\.?\d*$").unwrap());

pub struct GeocodingLookup {
    http: Arc<HttpClient>,
    api_key: Option<String>,
    endpoint: String,
    timeout: Duration,
}

impl GeocodingLookup {
    pub fn new(
        http: Arc<HttpClient>,
        api_key: Option<String>,
        endpoint: String,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            api_key,
            endpoint,
            timeout,
        }
    }

    /// Pull a human-readable place query out of the link: `query=` parameter
    /// first, then `/place/` and `/search/` path segments. Plus signs and
    /// percent escapes are decoded into plain text.
    pub(crate) fn place_query(map_link: &str) -> Option<String> {
        let raw = QUERY_PARAM
            .captures(map_link)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|value| !BARE_COORDS.is_match(value))
            .or_else(|| {
                PLACE_SEG
                    .captures(map_link)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str())
            })
            .or_else(|| {
                SEARCH_SEG
                    .captures(map_link)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str())
            })?;

        let spaced = raw.replace('+', " ");
        let decoded = urlencoding::decode(&spaced)
            .map(|cow| cow.into_owned())
            .unwrap_or(spaced);
        let trimmed = decoded.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Walk a places-API response defensively. Anything missing or mistyped
/// yields `None` rather than an error.
pub(crate) fn parse_places_response(payload: &Value) -> Option<(f64, f64)> {
    if payload.get("status").and_then(Value::as_str) != Some("OK") {
        return None;
    }

    let location = payload
        .get("results")?
        .as_array()?
        .first()?
        .get("geometry")?
        .get("location")?;

    let lat = location.get("lat")?.as_f64()?;
    let lng = location.get("lng")?.as_f64()?;
    Some((lat, lng))
}

#[async_trait]
impl ExtractionStrategy for GeocodingLookup {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Geocoding
    }

    async fn extract(
        &self,
        map_link: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Coordinate>, StrategyError> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("no geocoding API key configured, skipping lookup");
            return Ok(None);
        };

        let Some(query) = Self::place_query(map_link) else {
            debug!(map_link, "no place query derivable from link");
            return Ok(None);
        };

        debug!(query, "geocoding place query");

        let request_url = {
            let params = form_urlencoded::Serializer::new(String::new())
                .append_pair("query", &query)
                .append_pair("key", api_key)
                .finish();
            format!("{}?{}", self.endpoint, params)
        };

        let payload = self
            .http
            .get_json(&request_url, self.timeout, &cancel)
            .await
            .map_err(|e| StrategyError::Geocoding(e.to_string()))?;

        match parse_places_response(&payload) {
            Some((lat, lng)) => validate_coordinates(lng, lat)
                .map(Some)
                .map_err(StrategyError::from),
            None => {
                debug!(query, "geocoding returned no usable result");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_query_from_query_parameter() {
        let query = GeocodingLookup::place_query(
            "https://www.google.com/maps/search/?api=1&query=Sandton+City+Mall",
        );
        assert_eq!(query.as_deref(), Some("Sandton City Mall"));
    }

    #[test]
    fn bare_coordinate_query_is_not_a_place() {
        assert_eq!(
            GeocodingLookup::place_query("https://maps.example/?query=-26.1,28.05"),
            None
        );
        assert_eq!(
            GeocodingLookup::place_query("https://maps.example/?query=-26.1%2C28.05"),
            None
        );
    }

    #[test]
    fn derives_query_from_place_segment() {
        let query = GeocodingLookup::place_query(
            "https://www.google.com/maps/place/Nelson+Mandela+Square/@-26.1,28.05,17z",
        );
        assert_eq!(query.as_deref(), Some("Nelson Mandela Square"));
    }

    #[test]
    fn derives_query_from_search_segment() {
        let query =
            GeocodingLookup::place_query("https://www.google.com/maps/search/coffee+near+me/");
        assert_eq!(query.as_deref(), Some("coffee near me"));
    }

    #[test]
    fn percent_escapes_are_decoded() {
        let query = GeocodingLookup::place_query(
            "https://maps.example/?query=Caf%C3%A9%20Luna",
        );
        assert_eq!(query.as_deref(), Some("Café Luna"));
    }

    #[test]
    fn plain_link_yields_no_query() {
        assert_eq!(
            GeocodingLookup::place_query("https://www.google.com/maps/@-26.1,28.05,10z"),
            None
        );
    }

    #[test]
    fn parses_well_formed_places_response() {
        let payload = json!({
            "status": "OK",
            "results": [
                {"geometry": {"location": {"lat": -26.108204, "lng": 28.0527061}}}
            ]
        });
        assert_eq!(
            parse_places_response(&payload),
            Some((-26.108204, 28.0527061))
        );
    }

    #[test]
    fn non_ok_status_is_absent() {
        let payload = json!({"status": "ZERO_RESULTS", "results": []});
        assert_eq!(parse_places_response(&payload), None);
    }

    #[test]
    fn malformed_response_is_absent() {
        assert_eq!(parse_places_response(&json!({"status": "OK"})), None);
        assert_eq!(
            parse_places_response(&json!({"status": "OK", "results": []})),
            None
        );
        assert_eq!(
            parse_places_response(&json!({
                "status": "OK",
                "results": [{"geometry": {"location": {"lat": "oops", "lng": 1.0}}}]
            })),
            None
        );
    }
}

//! Pure-text pattern extraction: ordered regex rules applied to the URL
//! string, no I/O. The fastest and most trustworthy strategy for links
//! that carry explicit coordinates.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::coordinates::MAX_LATITUDE;
use crate::domain::{validate_coordinates, Coordinate, CoordinateRejection, StrategyKind};
use crate::extraction::{ExtractionStrategy, StrategyError};

// Rule 1: URL-encoded query parameter, e.g. ?api=1&query=47.5951518%2C-122.3316393
static QUERY_ENCODED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[?&]query=(-?\d+\.?\d*)%2C(-?\d+\.?\d*)").unwrap());

// Rule 2: "@" positional marker with optional zoom suffix,
// e.g. @-26.108204,28.0527061,17z — integer coordinates allowed.
static AT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?),?\d*z?").unwrap());

// Rule 3: plain q= query parameter, e.g. ?q=-26.108204,28.0527061
static Q_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]q=(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").unwrap());

// Rule 4: place path segment followed by an "@" pair.
static PLACE_AT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/place/[^/]+/@(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").unwrap());

// Rule 5: bare coordinate pair anywhere in the decoded text. Lowest
// priority because the axis roles must be guessed.
static BARE_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)").unwrap());

/// Synchronous strategy matching an ordered list of URL patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Apply the rules in order and return the first structural match,
    /// passed through the coordinate validator. A match that fails
    /// validation terminates the scan: rules 1-4 encode explicit axis
    /// roles, so a rejected pair means the link itself is bad.
    pub fn extract_from_text(
        &self,
        map_link: &str,
    ) -> Result<Option<Coordinate>, CoordinateRejection> {
        if map_link.trim().is_empty() {
            return Ok(None);
        }

        for (rule, regex) in [
            ("query-encoded", &*QUERY_ENCODED),
            ("at-marker", &*AT_MARKER),
            ("q-param", &*Q_PARAM),
            ("place-at", &*PLACE_AT),
        ] {
            if let Some(caps) = regex.captures(map_link) {
                if let Some((lat, lng)) = capture_pair(&caps) {
                    debug!(rule, lat, lng, "pattern rule matched");
                    return validate_coordinates(lng, lat).map(Some);
                }
            }
        }

        // Rule 5 works on the percent-decoded text so encoded separators
        // do not hide a pair.
        let decoded = urlencoding::decode(map_link)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| map_link.to_string());

        if let Some(caps) = BARE_PAIR.captures(&decoded) {
            if let Some((first, second)) = capture_pair(&caps) {
                let (lat, lng) = disambiguate_axes(first, second);
                debug!(rule = "bare-pair", lat, lng, "pattern rule matched");
                return validate_coordinates(lng, lat).map(Some);
            }
        }

        Ok(None)
    }
}

/// Decide which of a bare pair is latitude. Exactly one value inside the
/// latitude range wins the latitude role; on a tie — both fit or neither
/// fits — assume the first is latitude and let the validator arbitrate.
/// Deliberately isolated and unrefined: strengthening this heuristic
/// needs a labeled test set.
fn disambiguate_axes(first: f64, second: f64) -> (f64, f64) {
    let first_fits = first.abs() <= MAX_LATITUDE;
    let second_fits = second.abs() <= MAX_LATITUDE;

    if second_fits && !first_fits {
        (second, first)
    } else {
        (first, second)
    }
}

fn capture_pair(caps: &Captures<'_>) -> Option<(f64, f64)> {
    let a = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let b = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some((a, b))
}

#[async_trait]
impl ExtractionStrategy for PatternExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pattern
    }

    async fn extract(
        &self,
        map_link: &str,
        _cancel: CancellationToken,
    ) -> Result<Option<Coordinate>, StrategyError> {
        self.extract_from_text(map_link).map_err(StrategyError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(link: &str) -> Result<Option<Coordinate>, CoordinateRejection> {
        PatternExtractor::new().extract_from_text(link)
    }

    #[test]
    fn rule1_url_encoded_query_parameter() {
        let coord = extract(
            "https://www.google.com/maps/search/?api=1&query=47.5951518%2C-122.3316393",
        )
        .unwrap()
        .unwrap();
        assert_eq!(coord.latitude, 47.5951518);
        assert_eq!(coord.longitude, -122.3316393);
    }

    #[test]
    fn rule1_is_case_insensitive() {
        let coord = extract("https://maps.example/?QUERY=47.5%2C-122.3")
            .unwrap()
            .unwrap();
        assert_eq!(coord.latitude, 47.5);
    }

    #[test]
    fn rule2_at_marker_with_zoom() {
        let coord = extract("@-26.108204,28.0527061,17z").unwrap().unwrap();
        assert_eq!(coord.latitude, -26.108204);
        assert_eq!(coord.longitude, 28.0527061);
    }

    #[test]
    fn rule2_accepts_integer_coordinates() {
        let coord = extract("https://maps.example/@40,74,12z").unwrap().unwrap();
        assert_eq!(coord.latitude, 40.0);
        assert_eq!(coord.longitude, 74.0);
    }

    #[test]
    fn rule2_boundary_pair_accepted_exactly() {
        let coord = extract("@90.0,180.0").unwrap().unwrap();
        assert_eq!(coord.latitude, 90.0);
        assert_eq!(coord.longitude, 180.0);
    }

    #[test]
    fn rule3_q_parameter() {
        let coord = extract("https://maps.google.com/?q=-26.108204,28.0527061")
            .unwrap()
            .unwrap();
        assert_eq!(coord.latitude, -26.108204);
    }

    #[test]
    fn rule3_rejected_latitude_surfaces_the_value() {
        let err = extract("https://maps.example/?q=999.0,28.0").unwrap_err();
        assert_eq!(err, CoordinateRejection::InvalidLatitude { value: 999.0 });
    }

    #[test]
    fn rule4_place_path_segment() {
        let coord = extract("https://www.google.com/maps/place/Sandton/@-26.1076,28.0567,17z")
            .unwrap()
            .unwrap();
        assert_eq!(coord.latitude, -26.1076);
        assert_eq!(coord.longitude, 28.0567);
    }

    #[test]
    fn at_marker_takes_precedence_over_bare_pair() {
        // Unrelated bare numeric pair earlier in the URL must lose to the
        // explicit "@" marker.
        let coord = extract("https://maps.example/v=1.5,2.5/@-26.1,28.05,14z")
            .unwrap()
            .unwrap();
        assert_eq!(coord.latitude, -26.1);
        assert_eq!(coord.longitude, 28.05);
    }

    #[test]
    fn rule5_bare_pair_first_is_latitude_when_both_fit() {
        let coord = extract("some text 12.34, 56.78 more text").unwrap().unwrap();
        assert_eq!(coord.latitude, 12.34);
        assert_eq!(coord.longitude, 56.78);
    }

    #[test]
    fn rule5_swaps_axes_when_only_second_fits_latitude() {
        let coord = extract("122.3316393, -47.5951518").unwrap().unwrap();
        assert_eq!(coord.latitude, -47.5951518);
        assert_eq!(coord.longitude, 122.3316393);
    }

    #[test]
    fn rule5_decodes_percent_encoding_first() {
        let coord = extract("dest=12.34%2C56.78").unwrap().unwrap();
        assert_eq!(coord.latitude, 12.34);
        assert_eq!(coord.longitude, 56.78);
    }

    #[test]
    fn rule5_neither_fits_falls_back_to_first_is_latitude() {
        // Both values outside the latitude range: keep the textual order
        // and let the validator reject, so the failure reason is explicit.
        let err = extract("pair 95.0, 100.0 here").unwrap_err();
        assert_eq!(err, CoordinateRejection::InvalidLatitude { value: 95.0 });
    }

    #[test]
    fn no_match_is_absent_not_error() {
        assert_eq!(extract("https://maps.app.goo.gl/AbCdEf").unwrap(), None);
        assert_eq!(extract("").unwrap(), None);
        assert_eq!(extract("   ").unwrap(), None);
    }

    #[test]
    fn disambiguation_table() {
        assert_eq!(disambiguate_axes(12.0, 56.0), (12.0, 56.0));
        assert_eq!(disambiguate_axes(122.0, -47.0), (-47.0, 122.0));
        assert_eq!(disambiguate_axes(-47.0, 122.0), (-47.0, 122.0));
        assert_eq!(disambiguate_axes(95.0, 100.0), (95.0, 100.0));
    }
}

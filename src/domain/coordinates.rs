//! Coordinate value object and range validation.
//!
//! `validate_coordinates` is the single choke point every extraction
//! strategy passes its candidate pair through. No strategy accepts a pair
//! that has not gone through it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Inclusive latitude bounds in decimal degrees.
pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;

/// Inclusive longitude bounds in decimal degrees.
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// A complete, validated coordinate pair. Never partially populated:
/// either both axes exist and are in range, or the pair does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

/// Why a syntactically extracted pair was rejected. Carried through
/// strategy outcomes so row comments can cite the exact offending value.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordinateRejection {
    #[error("invalid latitude: {value} (must be between -90 and 90)")]
    InvalidLatitude { value: f64 },

    #[error("invalid longitude: {value} (must be between -180 and 180)")]
    InvalidLongitude { value: f64 },
}

/// Validate a (longitude, latitude) pair against the hard range invariant.
///
/// Returns the values unchanged on success — no clamping, no rounding.
/// Rejection is logged with the offending value and the violated bound;
/// it is an expected data condition, not a system error.
pub fn validate_coordinates(
    longitude: f64,
    latitude: f64,
) -> Result<Coordinate, CoordinateRejection> {
    if !(MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude) {
        warn!(
            latitude,
            "rejected coordinate pair: latitude outside [{}, {}]", MIN_LATITUDE, MAX_LATITUDE
        );
        return Err(CoordinateRejection::InvalidLatitude { value: latitude });
    }

    if !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude) {
        warn!(
            longitude,
            "rejected coordinate pair: longitude outside [{}, {}]", MIN_LONGITUDE, MAX_LONGITUDE
        );
        return Err(CoordinateRejection::InvalidLongitude { value: longitude });
    }

    Ok(Coordinate {
        longitude,
        latitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_values_in_range_unchanged() {
        let coord = validate_coordinates(28.0527061, -26.108204).unwrap();
        assert_eq!(coord.longitude, 28.0527061);
        assert_eq!(coord.latitude, -26.108204);
    }

    #[test]
    fn accepts_exact_boundaries() {
        assert!(validate_coordinates(180.0, 90.0).is_ok());
        assert!(validate_coordinates(-180.0, -90.0).is_ok());
        assert!(validate_coordinates(0.0, 0.0).is_ok());
    }

    #[test]
    fn rejects_just_past_boundaries() {
        assert!(validate_coordinates(0.0, 90.0001).is_err());
        assert!(validate_coordinates(0.0, -90.0001).is_err());
        assert!(validate_coordinates(180.0001, 0.0).is_err());
        assert!(validate_coordinates(-180.0001, 0.0).is_err());
    }

    #[test]
    fn rejection_names_the_offending_value() {
        let err = validate_coordinates(28.0, 999.0).unwrap_err();
        assert_eq!(err, CoordinateRejection::InvalidLatitude { value: 999.0 });
        assert!(err.to_string().contains("invalid latitude: 999"));

        let err = validate_coordinates(999.0, 28.0).unwrap_err();
        assert!(err.to_string().contains("invalid longitude: 999"));
    }

    #[test]
    fn latitude_checked_before_longitude() {
        // Both out of range: the latitude rejection wins, matching the
        // user-facing comment the row processor will surface.
        let err = validate_coordinates(999.0, 999.0).unwrap_err();
        assert!(matches!(err, CoordinateRejection::InvalidLatitude { .. }));
    }

    #[test]
    fn rejects_non_finite_values() {
        assert!(validate_coordinates(0.0, f64::NAN).is_err());
        assert!(validate_coordinates(f64::INFINITY, 0.0).is_err());
    }
}

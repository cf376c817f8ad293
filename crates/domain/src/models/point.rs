//! Geographic point type.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use validator::ValidationError;

/// A geographic coordinate in degrees.
///
/// Serialized as a two-element `[lng, lat]` array, GeoJSON coordinate order.
/// Longitude always comes first; every boundary in this codebase preserves
/// that order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    /// Creates a point from a (longitude, latitude) pair.
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Checks that both components are finite and within coordinate range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        shared::validation::validate_longitude(self.lng)?;
        shared::validation::validate_latitude(self.lat)?;
        Ok(())
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(p: GeoPoint) -> Self {
        [p.lng, p.lat]
    }
}

impl Serialize for GeoPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.lng, self.lat].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GeoPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [lng, lat] = <[f64; 2]>::deserialize(deserializer)?;
        Ok(Self { lng, lat })
    }
}

/// `validator`-compatible wrapper for request payloads carrying a point.
pub fn validate_geo_point(point: &GeoPoint) -> Result<(), ValidationError> {
    point.validate()
}

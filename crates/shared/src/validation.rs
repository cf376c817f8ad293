//! Common validation utilities.

use validator::ValidationError;

/// Maximum geofence radius in meters.
pub const MAX_GEOFENCE_RADIUS_METERS: f64 = 10_000.0;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if lat.is_finite() && (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lng: f64) -> Result<(), ValidationError> {
    if lng.is_finite() && (-180.0..=180.0).contains(&lng) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates that a geofence radius is positive and at most 10 km.
pub fn validate_radius_meters(radius: f64) -> Result<(), ValidationError> {
    if radius.is_finite() && radius > 0.0 && radius <= MAX_GEOFENCE_RADIUS_METERS {
        Ok(())
    } else {
        let mut err = ValidationError::new("radius_range");
        err.message = Some("Radius must be between 0 (exclusive) and 10000 meters".into());
        Err(err)
    }
}

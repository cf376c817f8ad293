//! Geofence containment scan.

use thiserror::Error;
use tracing::warn;

use crate::models::{GeoPoint, Geofence};
use crate::services::geo::point_in_circle;

/// Failure to run a containment scan at all.
///
/// Distinct from an empty result: an invalid probe point is a caller error,
/// zero matches is a perfectly good answer.
#[derive(Debug, Error)]
pub enum GeofenceScanError {
    #[error("invalid point: {0}")]
    InvalidPoint(String),
}

/// Returns the geofences containing `point`, in input order.
///
/// A candidate with malformed geometry (center out of range or not finite,
/// non-positive or non-finite radius) is logged and skipped; one bad
/// geofence never aborts the scan.
pub fn find_containing_geofences(
    point: &GeoPoint,
    candidates: &[Geofence],
) -> Result<Vec<Geofence>, GeofenceScanError> {
    point
        .validate()
        .map_err(|err| GeofenceScanError::InvalidPoint(err.to_string()))?;

    let mut matches = Vec::new();
    for fence in candidates {
        if fence.center.validate().is_err()
            || !fence.radius_meters.is_finite()
            || fence.radius_meters <= 0.0
        {
            warn!(
                geofence_id = %fence.id,
                "Skipping geofence with malformed geometry"
            );
            continue;
        }

        if point_in_circle(point, &fence.center, fence.radius_meters) {
            matches.push(fence.clone());
        }
    }

    Ok(matches)
}

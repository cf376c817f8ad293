//! Great-circle geometry helpers.

use crate::models::GeoPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (haversine formula).
///
/// Symmetric, zero for identical points (modulo floating error), and total
/// over all inputs including antipodal pairs.
pub fn haversine_distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let phi_a = a.lat.to_radians();
    let phi_b = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lng - a.lng).to_radians();

    // Floating error can push h past 1.0 for near-antipodal inputs.
    let h = ((d_phi / 2.0).sin().powi(2)
        + phi_a.cos() * phi_b.cos() * (d_lambda / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Distance in kilometers from `p` to the closest point on the segment
/// `start`..`end`.
///
/// The closest point is found by projecting in the unprojected lng/lat plane
/// (an approximation that ignores meridian convergence, fine at the sub-10 km
/// scales route checks operate on), with the projection parameter clamped to
/// the segment; the final distance is haversine.
pub fn distance_point_to_segment_km(p: &GeoPoint, start: &GeoPoint, end: &GeoPoint) -> f64 {
    let dx = end.lng - start.lng;
    let dy = end.lat - start.lat;

    let closest = if dx == 0.0 && dy == 0.0 {
        // Degenerate segment
        *start
    } else {
        let t = ((p.lng - start.lng) * dx + (p.lat - start.lat) * dy) / (dx * dx + dy * dy);
        let t = t.clamp(0.0, 1.0);
        GeoPoint::new(start.lng + t * dx, start.lat + t * dy)
    };

    haversine_distance_meters(p, &closest) / 1000.0
}

/// Whether `p` lies within `radius_meters` of `center` (boundary inclusive).
pub fn point_in_circle(p: &GeoPoint, center: &GeoPoint, radius_meters: f64) -> bool {
    haversine_distance_meters(p, center) <= radius_meters
}

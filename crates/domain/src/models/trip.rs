//! Trip domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::point::GeoPoint;

/// Planned route for a trip: start, end, and intermediate waypoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRoute {
    pub start: GeoPoint,
    pub end: GeoPoint,
    #[serde(default)]
    pub waypoints: Vec<GeoPoint>,
}

impl TripRoute {
    /// Ordered point sequence: start, waypoints, end.
    pub fn points(&self) -> Vec<GeoPoint> {
        let mut points = Vec::with_capacity(self.waypoints.len() + 2);
        points.push(self.start);
        points.extend(self.waypoints.iter().copied());
        points.push(self.end);
        points
    }
}

/// A tourist's registered trip. A trip without a route cannot be checked for
/// route deviation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<TripRoute>,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    /// Creates a trip with fresh id and timestamp.
    pub fn new(user_id: Uuid, route: Option<TripRoute>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            route,
            created_at: Utc::now(),
        }
    }
}

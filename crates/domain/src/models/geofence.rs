//! Geofence domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::point::GeoPoint;

/// Alert level attached to a geofence, and reused as the severity of an
/// anomaly finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Danger,
}

impl AlertLevel {
    /// Returns the string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Danger => "danger",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(AlertLevel::Warning),
            "danger" => Ok(AlertLevel::Danger),
            _ => Err(format!(
                "Invalid alert level: {}. Must be one of: warning, danger",
                s
            )),
        }
    }
}

/// A circular region that triggers alerts for incidents reported inside it.
///
/// Geofences are standalone entities defined by admins; they may freely
/// overlap or nest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    pub id: Uuid,
    /// Center as a `[lng, lat]` pair.
    pub center: GeoPoint,
    pub radius_meters: f64,
    pub alert_level: AlertLevel,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Geofence {
    /// Creates an active geofence with fresh id and timestamps.
    pub fn new(center: GeoPoint, radius_meters: f64, alert_level: AlertLevel) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            center,
            radius_meters,
            alert_level,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Default active status for new geofences.
fn default_active() -> bool {
    true
}

/// Request payload for defining a geofence.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeofenceRequest {
    #[validate(custom(function = "crate::models::point::validate_geo_point"))]
    pub center: GeoPoint,

    #[validate(custom(function = "shared::validation::validate_radius_meters"))]
    pub radius_meters: f64,

    pub alert_level: AlertLevel,

    #[serde(default = "default_active")]
    pub active: bool,
}

impl CreateGeofenceRequest {
    /// Builds the geofence this request describes.
    pub fn into_geofence(self) -> Geofence {
        let mut fence = Geofence::new(self.center, self.radius_meters, self.alert_level);
        fence.active = self.active;
        fence
    }
}

/// Request payload for updating a geofence (partial update).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGeofenceRequest {
    #[validate(custom(function = "crate::models::point::validate_geo_point"))]
    pub center: Option<GeoPoint>,

    #[validate(custom(function = "shared::validation::validate_radius_meters"))]
    pub radius_meters: Option<f64>,

    pub alert_level: Option<AlertLevel>,

    pub active: Option<bool>,
}

impl UpdateGeofenceRequest {
    /// Applies the present fields to an existing geofence.
    pub fn apply(self, fence: &mut Geofence) {
        if let Some(center) = self.center {
            fence.center = center;
        }
        if let Some(radius) = self.radius_meters {
            fence.radius_meters = radius;
        }
        if let Some(level) = self.alert_level {
            fence.alert_level = level;
        }
        if let Some(active) = self.active {
            fence.active = active;
        }
        fence.updated_at = Utc::now();
    }
}

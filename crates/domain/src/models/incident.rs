//! Incident domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::models::geofence::AlertLevel;
use crate::models::point::GeoPoint;

/// Severity of a reported incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
}

impl IncidentSeverity {
    /// Returns the string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentSeverity::Low => "low",
            IncidentSeverity::Medium => "medium",
            IncidentSeverity::High => "high",
        }
    }
}

impl fmt::Display for IncidentSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IncidentSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(IncidentSeverity::Low),
            "medium" => Ok(IncidentSeverity::Medium),
            "high" => Ok(IncidentSeverity::High),
            _ => Err(format!(
                "Invalid incident severity: {}. Must be one of: low, medium, high",
                s
            )),
        }
    }
}

/// Workflow status of an incident. Transitions are admin-driven and happen
/// outside the intake pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncidentStatus {
    Reported,
    InProgress,
    Resolved,
}

impl IncidentStatus {
    /// Returns the string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Reported => "reported",
            IncidentStatus::InProgress => "inProgress",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-reported safety event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: Uuid,
    pub reporter_user_id: Uuid,
    pub description: String,
    /// Location as a `[lng, lat]` pair.
    pub location: GeoPoint,
    /// Back-filled from reverse geocoding when the reporter supplies none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub severity: IncidentSeverity,
    pub status: IncidentStatus,
    pub anomaly_detected: bool,
    pub anomaly_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_severity: Option<AlertLevel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Creates a freshly reported incident with fresh id and timestamps.
    pub fn new(
        reporter_user_id: Uuid,
        description: String,
        location: GeoPoint,
        severity: IncidentSeverity,
        address: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reporter_user_id,
            description,
            location,
            address,
            severity,
            status: IncidentStatus::Reported,
            anomaly_detected: false,
            anomaly_reasons: Vec::new(),
            suggested_severity: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Validated incident draft received from the caller boundary.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportIncidentRequest {
    pub reporter_user_id: Uuid,

    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: String,

    /// Location as a `[lng, lat]` pair.
    #[validate(custom(function = "crate::models::point::validate_geo_point"))]
    pub location: GeoPoint,

    pub trip_id: Option<Uuid>,

    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,

    pub severity: Option<IncidentSeverity>,
}

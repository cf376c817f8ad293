//! Rule-based anomaly detection over a reporter's recent activity.
//!
//! Three independent checks (sudden drop-off, inactivity, route deviation)
//! feed one combined verdict. The verdict augments incident intake; it never
//! gates it, so `detect_anomalies` is total and degrades to a neutral
//! verdict on any collaborator failure.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{AlertLevel, AnomalyFinding, AnomalyKind, AnomalyVerdict, GeoPoint, Incident, Trip, TripRoute};
use crate::services::geo::{distance_point_to_segment_km, haversine_distance_meters};
use crate::stores::IncidentStore;

/// Implied speed above which a drop-off is a danger rather than a warning.
const DROPOFF_DANGER_SPEED_KMH: f64 = 200.0;

/// Inactivity above this many hours escalates to danger.
const INACTIVITY_DANGER_HOURS: f64 = 24.0;

/// Route deviation above this many kilometers escalates to danger.
const DEVIATION_DANGER_KM: f64 = 5.0;

/// Tunable rule thresholds.
///
/// Deserializable so administrative tooling can source them from any config
/// layer; every field falls back to its default when absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyThresholds {
    /// Displacement beyond this many km counts as a drop-off candidate.
    #[serde(default = "default_dropoff_distance_km")]
    pub dropoff_distance_km: f64,

    /// ...when covered in less than this many minutes.
    #[serde(default = "default_dropoff_time_minutes")]
    pub dropoff_time_minutes: f64,

    /// Silence longer than this many hours counts as inactivity.
    #[serde(default = "default_inactivity_hours")]
    pub inactivity_hours: f64,

    /// Distance from the planned route beyond this many meters counts as a
    /// deviation.
    #[serde(default = "default_deviation_meters")]
    pub deviation_meters: f64,
}

fn default_dropoff_distance_km() -> f64 {
    5.0
}
fn default_dropoff_time_minutes() -> f64 {
    10.0
}
fn default_inactivity_hours() -> f64 {
    6.0
}
fn default_deviation_meters() -> f64 {
    500.0
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            dropoff_distance_km: default_dropoff_distance_km(),
            dropoff_time_minutes: default_dropoff_time_minutes(),
            inactivity_hours: default_inactivity_hours(),
            deviation_meters: default_deviation_meters(),
        }
    }
}

/// Stateless rule engine holding its threshold configuration.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    thresholds: AnomalyThresholds,
}

impl AnomalyDetector {
    /// Detector with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector with explicit thresholds.
    pub fn with_thresholds(thresholds: AnomalyThresholds) -> Self {
        Self { thresholds }
    }

    /// Current thresholds.
    pub fn thresholds(&self) -> &AnomalyThresholds {
        &self.thresholds
    }

    /// Replaces the thresholds, for administrative runtime updates.
    pub fn set_thresholds(&mut self, thresholds: AnomalyThresholds) {
        self.thresholds = thresholds;
    }

    /// Flags a long displacement covered in a short time.
    ///
    /// Triggers when the distance exceeds `dropoff_distance_km` while the
    /// elapsed time is under `dropoff_time_minutes`. Zero (or negative)
    /// elapsed time implies unbounded speed and is always a danger.
    pub fn check_sudden_drop_off(
        &self,
        last: &GeoPoint,
        current: &GeoPoint,
        last_at: DateTime<Utc>,
        current_at: DateTime<Utc>,
    ) -> Option<AnomalyFinding> {
        let distance_km = haversine_distance_meters(last, current) / 1000.0;
        let elapsed_minutes = ((current_at - last_at).num_seconds() as f64 / 60.0).max(0.0);

        if distance_km <= self.thresholds.dropoff_distance_km
            || elapsed_minutes >= self.thresholds.dropoff_time_minutes
        {
            return None;
        }

        let (severity, reason) = if elapsed_minutes > 0.0 {
            let speed_kmh = distance_km / (elapsed_minutes / 60.0);
            let severity = if speed_kmh > DROPOFF_DANGER_SPEED_KMH {
                AlertLevel::Danger
            } else {
                AlertLevel::Warning
            };
            (
                severity,
                format!(
                    "Sudden displacement of {:.1} km in {:.1} minutes (~{:.0} km/h)",
                    distance_km, elapsed_minutes, speed_kmh
                ),
            )
        } else {
            (
                AlertLevel::Danger,
                format!(
                    "Sudden displacement of {:.1} km with no elapsed time",
                    distance_km
                ),
            )
        };

        Some(AnomalyFinding {
            kind: AnomalyKind::SuddenDropOff,
            reason,
            severity,
        })
    }

    /// Flags a long silence since the reporter's last recorded activity.
    ///
    /// Danger above 24 hours, warning otherwise.
    pub fn check_inactivity(
        &self,
        last_activity_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<AnomalyFinding> {
        let hours_inactive = (now - last_activity_at).num_seconds() as f64 / 3600.0;

        if hours_inactive <= self.thresholds.inactivity_hours {
            return None;
        }

        let severity = if hours_inactive > INACTIVITY_DANGER_HOURS {
            AlertLevel::Danger
        } else {
            AlertLevel::Warning
        };

        Some(AnomalyFinding {
            kind: AnomalyKind::Inactivity,
            reason: format!("No activity for {:.1} hours", hours_inactive),
            severity,
        })
    }

    /// Flags a position far from the planned route.
    ///
    /// Minimum distance over every consecutive segment of
    /// start, waypoints, end; danger above 5 km off-route.
    pub fn check_route_deviation(
        &self,
        route: &TripRoute,
        current: &GeoPoint,
    ) -> Option<AnomalyFinding> {
        let points = route.points();
        let min_distance_km = points
            .windows(2)
            .map(|pair| distance_point_to_segment_km(current, &pair[0], &pair[1]))
            .fold(f64::INFINITY, f64::min);

        if min_distance_km <= self.thresholds.deviation_meters / 1000.0 {
            return None;
        }

        let severity = if min_distance_km > DEVIATION_DANGER_KM {
            AlertLevel::Danger
        } else {
            AlertLevel::Warning
        };

        Some(AnomalyFinding {
            kind: AnomalyKind::RouteDeviation,
            reason: format!(
                "Current position is {:.2} km from the planned route",
                min_distance_km
            ),
            severity,
        })
    }

    /// Runs every applicable check for a freshly reported incident.
    ///
    /// Drop-off and inactivity compare against the reporter's most recent
    /// other incident; route deviation runs only when the trip carries a
    /// route. A store failure degrades to the neutral verdict.
    pub async fn detect_anomalies(
        &self,
        incidents: &dyn IncidentStore,
        incident: &Incident,
        trip: Option<&Trip>,
    ) -> AnomalyVerdict {
        let detected_at = Utc::now();

        let previous = match incidents
            .latest_for_user_excluding(incident.reporter_user_id, incident.id)
            .await
        {
            Ok(previous) => previous,
            Err(err) => {
                warn!(
                    reporter_user_id = %incident.reporter_user_id,
                    error = %err,
                    "Incident history lookup failed; skipping anomaly detection"
                );
                return AnomalyVerdict::none(detected_at);
            }
        };

        let mut findings = Vec::new();

        if let Some(previous) = &previous {
            if let Some(finding) = self.check_sudden_drop_off(
                &previous.location,
                &incident.location,
                previous.created_at,
                incident.created_at,
            ) {
                findings.push(finding);
            }
            if let Some(finding) = self.check_inactivity(previous.created_at, detected_at) {
                findings.push(finding);
            }
        } else {
            debug!(
                reporter_user_id = %incident.reporter_user_id,
                "No prior incident for reporter; drop-off and inactivity checks skipped"
            );
        }

        if let Some(route) = trip.and_then(|t| t.route.as_ref()) {
            if let Some(finding) = self.check_route_deviation(route, &incident.location) {
                findings.push(finding);
            }
        }

        AnomalyVerdict::from_findings(findings, detected_at)
    }
}

//! Incident intake pipeline.
//!
//! One report runs the stages validate, geocode, persist, anomaly check,
//! geofence scan, and alert dispatch in order, exactly once. Every stage
//! except incident persistence degrades on failure: the incident still
//! lands, the response records which sub-results were degraded.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use validator::Validate;

use crate::models::{
    Alert, AlertLevel, AnomalyVerdict, Geofence, Incident, IncidentSeverity,
    ReportIncidentRequest, Trip,
};
use crate::services::alert_fanout::{AlertFanout, FanoutOptions, FanoutReport};
use crate::services::anomaly_detection::AnomalyDetector;
use crate::services::geocoding::{GeocodeOutcome, GeocodingService};
use crate::services::geofence_locator::find_containing_geofences;
use crate::stores::{GeofenceStore, IncidentStore, StoreError, TripStore};

/// Fatal intake failure. Everything else degrades.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("failed to persist incident: {0}")]
    Persistence(#[from] StoreError),
}

/// Geofence sub-result of the response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceScan {
    pub found: usize,
    pub list: Vec<Geofence>,
}

/// Alert sub-result of the response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDispatch {
    pub created: usize,
    pub list: Vec<Alert>,
    pub errors: Vec<String>,
}

/// Full response envelope for one processed report.
///
/// The incident itself being present means the report succeeded; each
/// sub-result records whether its stage ran cleanly or degraded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReportOutcome {
    pub incident: Incident,
    pub geocoding: GeocodeOutcome,
    pub anomaly_detection: AnomalyVerdict,
    pub geofences: GeofenceScan,
    pub alerts: AlertDispatch,
}

/// One-time severity upgrade from an anomaly suggestion. Never a downgrade.
fn escalated_severity(
    current: IncidentSeverity,
    suggested: AlertLevel,
) -> Option<IncidentSeverity> {
    match suggested {
        AlertLevel::Danger if current != IncidentSeverity::High => Some(IncidentSeverity::High),
        AlertLevel::Warning if current == IncidentSeverity::Low => Some(IncidentSeverity::Medium),
        _ => None,
    }
}

/// Orchestrates the intake pipeline over the collaborator seams.
#[derive(Clone)]
pub struct IncidentIntake {
    incidents: Arc<dyn IncidentStore>,
    geofences: Arc<dyn GeofenceStore>,
    trips: Arc<dyn TripStore>,
    geocoder: Arc<dyn GeocodingService>,
    detector: AnomalyDetector,
    fanout: AlertFanout,
}

impl IncidentIntake {
    pub fn new(
        incidents: Arc<dyn IncidentStore>,
        geofences: Arc<dyn GeofenceStore>,
        trips: Arc<dyn TripStore>,
        geocoder: Arc<dyn GeocodingService>,
        detector: AnomalyDetector,
        fanout: AlertFanout,
    ) -> Self {
        Self {
            incidents,
            geofences,
            trips,
            geocoder,
            detector,
            fanout,
        }
    }

    /// Processes one incident report through the full pipeline.
    ///
    /// Returns `Err` only when the request is invalid or the incident cannot
    /// be persisted; any other stage failure is reported through the
    /// envelope's sub-results.
    pub async fn report(
        &self,
        request: ReportIncidentRequest,
    ) -> Result<IncidentReportOutcome, IntakeError> {
        request
            .validate()
            .map_err(|err| IntakeError::Validation(err.to_string()))?;

        let geocoding = self.geocode_stage(&request).await;
        let address = geocoding.address.clone().or_else(|| request.address.clone());

        let mut incident = Incident::new(
            request.reporter_user_id,
            request.description.clone(),
            request.location,
            request.severity.unwrap_or(IncidentSeverity::Low),
            address,
        );

        // The single fatal stage: without the incident row there is nothing
        // to alert on.
        self.incidents.insert(&incident).await?;
        info!(incident_id = %incident.id, reporter_user_id = %incident.reporter_user_id, "Incident persisted");

        let trip = self.trip_stage(&request).await;
        let verdict = self
            .detector
            .detect_anomalies(self.incidents.as_ref(), &incident, trip.as_ref())
            .await;
        self.apply_verdict_stage(&mut incident, &verdict).await;

        let geofences = self.geofence_stage(&incident).await;
        let alerts = self.alert_stage(&incident, &geofences).await;

        Ok(IncidentReportOutcome {
            geocoding,
            anomaly_detection: verdict,
            geofences: GeofenceScan {
                found: geofences.len(),
                list: geofences,
            },
            alerts,
            incident,
        })
    }

    /// Resolves an address, preferring a reporter-supplied one.
    async fn geocode_stage(&self, request: &ReportIncidentRequest) -> GeocodeOutcome {
        if let Some(address) = &request.address {
            return GeocodeOutcome {
                success: true,
                message: "Address supplied by reporter".to_string(),
                address: Some(address.clone()),
            };
        }

        let outcome = self
            .geocoder
            .reverse_geocode(request.location.lat, request.location.lng)
            .await;
        if !outcome.success {
            warn!(message = %outcome.message, "Reverse geocoding degraded; continuing without address");
        }
        outcome
    }

    /// Fetches the referenced trip; a missing or unreadable trip degrades to
    /// no route check.
    async fn trip_stage(&self, request: &ReportIncidentRequest) -> Option<Trip> {
        let trip_id = request.trip_id?;
        match self.trips.find_by_id(trip_id).await {
            Ok(Some(trip)) => Some(trip),
            Ok(None) => {
                warn!(trip_id = %trip_id, "Referenced trip not found; skipping route checks");
                None
            }
            Err(err) => {
                warn!(trip_id = %trip_id, error = %err, "Trip lookup failed; skipping route checks");
                None
            }
        }
    }

    /// Writes the verdict and any severity escalation back to the store.
    ///
    /// A write-back failure keeps the incident at its persisted state rather
    /// than reporting an escalation that never landed.
    async fn apply_verdict_stage(&self, incident: &mut Incident, verdict: &AnomalyVerdict) {
        if !verdict.is_anomaly {
            return;
        }

        let mut updated = incident.clone();
        updated.anomaly_detected = true;
        updated.anomaly_reasons = verdict.reasons.clone();
        updated.suggested_severity = verdict.suggested_severity;
        if let Some(suggested) = verdict.suggested_severity {
            if let Some(severity) = escalated_severity(updated.severity, suggested) {
                info!(
                    incident_id = %incident.id,
                    from = %updated.severity,
                    to = %severity,
                    "Escalating incident severity from anomaly verdict"
                );
                updated.severity = severity;
            }
        }
        updated.updated_at = Utc::now();

        match self.incidents.update(&updated).await {
            Ok(()) => *incident = updated,
            Err(err) => {
                warn!(
                    incident_id = %incident.id,
                    error = %err,
                    "Failed to record anomaly verdict; incident remains unescalated"
                );
            }
        }
    }

    /// Scans active geofences for containment; any failure degrades to zero
    /// matches.
    async fn geofence_stage(&self, incident: &Incident) -> Vec<Geofence> {
        let active = match self.geofences.list_active().await {
            Ok(active) => active,
            Err(err) => {
                warn!(error = %err, "Active geofence listing failed; continuing without geofences");
                return Vec::new();
            }
        };

        match find_containing_geofences(&incident.location, &active) {
            Ok(matches) => matches,
            Err(err) => {
                // Cannot normally happen after request validation.
                warn!(error = %err, "Geofence scan rejected the incident location");
                Vec::new()
            }
        }
    }

    /// Routes alert dispatch by final severity; a batch-level failure
    /// degrades to zero alerts with the error surfaced.
    async fn alert_stage(&self, incident: &Incident, geofences: &[Geofence]) -> AlertDispatch {
        let options = FanoutOptions {
            reporter_user_id: Some(incident.reporter_user_id),
            ..Default::default()
        };

        let result = if incident.severity == IncidentSeverity::High {
            self.fanout
                .create_emergency_alerts(incident, geofences, &options)
                .await
        } else {
            // Non-emergency incidents only alert danger-level geofences.
            self.fanout
                .create_alerts_for_geofence_levels(
                    incident,
                    geofences,
                    &[AlertLevel::Danger],
                    &options,
                )
                .await
        };

        match result {
            Ok(FanoutReport { alerts, errors }) => AlertDispatch {
                created: alerts.len(),
                list: alerts,
                errors: errors.iter().map(|failure| failure.to_string()).collect(),
            },
            Err(err) => {
                warn!(incident_id = %incident.id, error = %err, "Alert dispatch failed");
                AlertDispatch {
                    created: 0,
                    list: Vec::new(),
                    errors: vec![err.to_string()],
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, User, UserRole};
    use crate::services::geocoding::MockGeocodingService;
    use crate::stores::{AlertStore, UserStore};
    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct TestState {
        incidents: Mutex<Vec<Incident>>,
        fail_insert: bool,
        fail_update: bool,
    }

    #[async_trait]
    impl IncidentStore for TestState {
        async fn insert(&self, incident: &Incident) -> Result<(), StoreError> {
            if self.fail_insert {
                return Err(StoreError::Backend("insert refused".into()));
            }
            self.incidents.lock().await.push(incident.clone());
            Ok(())
        }

        async fn update(&self, incident: &Incident) -> Result<(), StoreError> {
            if self.fail_update {
                return Err(StoreError::Backend("update refused".into()));
            }
            let mut incidents = self.incidents.lock().await;
            match incidents.iter_mut().find(|i| i.id == incident.id) {
                Some(stored) => {
                    *stored = incident.clone();
                    Ok(())
                }
                None => Err(StoreError::NotFound),
            }
        }

        async fn latest_for_user_excluding(
            &self,
            user_id: Uuid,
            exclude_incident: Uuid,
        ) -> Result<Option<Incident>, StoreError> {
            Ok(self
                .incidents
                .lock()
                .await
                .iter()
                .filter(|i| i.reporter_user_id == user_id && i.id != exclude_incident)
                .max_by_key(|i| i.created_at)
                .cloned())
        }
    }

    struct TestFences {
        fences: Vec<Geofence>,
    }

    #[async_trait]
    impl GeofenceStore for TestFences {
        async fn list_active(&self) -> Result<Vec<Geofence>, StoreError> {
            Ok(self.fences.iter().filter(|f| f.active).cloned().collect())
        }
    }

    struct BrokenFences;

    #[async_trait]
    impl GeofenceStore for BrokenFences {
        async fn list_active(&self) -> Result<Vec<Geofence>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
    }

    struct NoTrips;

    #[async_trait]
    impl TripStore for NoTrips {
        async fn find_by_id(&self, _id: Uuid) -> Result<Option<Trip>, StoreError> {
            Ok(None)
        }
    }

    struct TestUsers {
        users: Vec<User>,
    }

    #[async_trait]
    impl UserStore for TestUsers {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            Ok(self.users.iter().find(|u| u.id == id).cloned())
        }

        async fn list_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>, StoreError> {
            Ok(self
                .users
                .iter()
                .filter(|u| roles.contains(&u.role))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct TestAlerts {
        stored: Mutex<Vec<Alert>>,
    }

    #[async_trait]
    impl AlertStore for TestAlerts {
        async fn insert(&self, alert: &Alert) -> Result<(), StoreError> {
            self.stored.lock().await.push(alert.clone());
            Ok(())
        }

        async fn exists(
            &self,
            recipient_user_id: Uuid,
            incident_id: Option<Uuid>,
            geofence_id: Option<Uuid>,
        ) -> Result<bool, StoreError> {
            Ok(self.stored.lock().await.iter().any(|a| {
                a.recipient_user_id == recipient_user_id
                    && a.incident_id == incident_id
                    && a.geofence_id == geofence_id
            }))
        }
    }

    struct Fixture {
        intake: IncidentIntake,
        incidents: Arc<TestState>,
        alerts: Arc<TestAlerts>,
        recipient: User,
    }

    fn fixture(state: TestState, fences: Vec<Geofence>) -> Fixture {
        let incidents = Arc::new(state);
        let alerts = Arc::new(TestAlerts::default());
        let recipient = User::new("Ravi".to_string(), UserRole::Admin);
        let users = Arc::new(TestUsers {
            users: vec![recipient.clone()],
        });
        let intake = IncidentIntake::new(
            incidents.clone(),
            Arc::new(TestFences { fences }),
            Arc::new(NoTrips),
            Arc::new(MockGeocodingService::resolving("Connaught Place")),
            AnomalyDetector::new(),
            AlertFanout::new(users, alerts.clone()),
        );
        Fixture {
            intake,
            incidents,
            alerts,
            recipient,
        }
    }

    fn request() -> ReportIncidentRequest {
        ReportIncidentRequest {
            reporter_user_id: Uuid::new_v4(),
            description: "Harassment near the fountain".to_string(),
            location: GeoPoint::new(77.209, 28.6139),
            trip_id: None,
            address: None,
            severity: None,
        }
    }

    #[test]
    fn test_escalation_rules() {
        use AlertLevel::*;
        use IncidentSeverity::*;

        assert_eq!(escalated_severity(Low, Danger), Some(High));
        assert_eq!(escalated_severity(Medium, Danger), Some(High));
        assert_eq!(escalated_severity(High, Danger), None);
        assert_eq!(escalated_severity(Low, Warning), Some(Medium));
        assert_eq!(escalated_severity(Medium, Warning), None);
        assert_eq!(escalated_severity(High, Warning), None);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let f = fixture(TestState::default(), vec![]);
        let mut bad = request();
        bad.description = String::new();

        let result = f.intake.report(bad).await;
        assert!(matches!(result, Err(IntakeError::Validation(_))));
        assert!(f.incidents.incidents.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_fatal_and_nothing_downstream_runs() {
        let f = fixture(
            TestState {
                fail_insert: true,
                ..Default::default()
            },
            vec![Geofence::new(
                GeoPoint::new(77.209, 28.6139),
                500.0,
                AlertLevel::Danger,
            )],
        );

        let result = f.intake.report(request()).await;
        assert!(matches!(result, Err(IntakeError::Persistence(_))));
        assert!(f.alerts.stored.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_low_severity_report_only_alerts_danger_fences() {
        let danger = Geofence::new(GeoPoint::new(77.209, 28.6139), 500.0, AlertLevel::Danger);
        let warning = Geofence::new(GeoPoint::new(77.209, 28.6139), 500.0, AlertLevel::Warning);
        let f = fixture(TestState::default(), vec![danger.clone(), warning]);

        let outcome = f.intake.report(request()).await.unwrap();

        assert_eq!(outcome.incident.severity, IncidentSeverity::Low);
        assert_eq!(outcome.geofences.found, 2);
        assert_eq!(outcome.alerts.created, 1);
        assert_eq!(outcome.alerts.list[0].geofence_id, Some(danger.id));
        assert_eq!(outcome.alerts.list[0].recipient_user_id, f.recipient.id);
        assert!(outcome.alerts.errors.is_empty());
    }

    #[tokio::test]
    async fn test_high_severity_report_goes_emergency_across_levels() {
        let danger = Geofence::new(GeoPoint::new(77.209, 28.6139), 500.0, AlertLevel::Danger);
        let warning = Geofence::new(GeoPoint::new(77.209, 28.6139), 500.0, AlertLevel::Warning);
        let f = fixture(TestState::default(), vec![danger, warning]);

        let mut high = request();
        high.severity = Some(IncidentSeverity::High);
        let outcome = f.intake.report(high).await.unwrap();

        assert_eq!(outcome.alerts.created, 2);
        assert!(outcome
            .alerts
            .list
            .iter()
            .all(|a| a.message.starts_with("EMERGENCY:")));
    }

    #[tokio::test]
    async fn test_geocoding_failure_degrades_to_no_address() {
        let incidents = Arc::new(TestState::default());
        let alerts = Arc::new(TestAlerts::default());
        let users = Arc::new(TestUsers { users: vec![] });
        let intake = IncidentIntake::new(
            incidents.clone(),
            Arc::new(TestFences { fences: vec![] }),
            Arc::new(NoTrips),
            Arc::new(MockGeocodingService::failing()),
            AnomalyDetector::new(),
            AlertFanout::new(users, alerts),
        );

        let outcome = intake.report(request()).await.unwrap();
        assert!(!outcome.geocoding.success);
        assert!(outcome.incident.address.is_none());
    }

    #[tokio::test]
    async fn test_reporter_address_short_circuits_geocoding() {
        let f = fixture(TestState::default(), vec![]);
        let mut with_address = request();
        with_address.address = Some("Hotel Saratoga, Room 4".to_string());

        let outcome = f.intake.report(with_address).await.unwrap();
        assert!(outcome.geocoding.success);
        assert_eq!(
            outcome.incident.address.as_deref(),
            Some("Hotel Saratoga, Room 4")
        );
        assert_eq!(outcome.geocoding.message, "Address supplied by reporter");
    }

    #[tokio::test]
    async fn test_geofence_store_failure_degrades_to_zero() {
        let incidents = Arc::new(TestState::default());
        let alerts = Arc::new(TestAlerts::default());
        let users = Arc::new(TestUsers { users: vec![] });
        let intake = IncidentIntake::new(
            incidents.clone(),
            Arc::new(BrokenFences),
            Arc::new(NoTrips),
            Arc::new(MockGeocodingService::resolving("A")),
            AnomalyDetector::new(),
            AlertFanout::new(users, alerts),
        );

        let outcome = intake.report(request()).await.unwrap();
        assert_eq!(outcome.geofences.found, 0);
        assert_eq!(outcome.alerts.created, 0);
    }

    #[tokio::test]
    async fn test_anomaly_escalates_and_persists_severity() {
        let reporter = Uuid::new_v4();
        let state = TestState::default();
        // Prior incident 5 minutes ago, ~28 km away: a danger drop-off.
        let mut previous = Incident::new(
            reporter,
            "Checked in at hotel".to_string(),
            GeoPoint::new(77.209, 28.6139),
            IncidentSeverity::Low,
            None,
        );
        previous.created_at = Utc::now() - chrono::Duration::minutes(5);
        state.incidents.try_lock().unwrap().push(previous);

        let danger = Geofence::new(GeoPoint::new(77.4, 28.8), 500.0, AlertLevel::Danger);
        let f = fixture(state, vec![danger]);

        let mut moved = request();
        moved.reporter_user_id = reporter;
        moved.location = GeoPoint::new(77.4, 28.8);

        let outcome = f.intake.report(moved).await.unwrap();

        assert!(outcome.anomaly_detection.is_anomaly);
        assert_eq!(outcome.incident.severity, IncidentSeverity::High);
        assert!(outcome.incident.anomaly_detected);
        assert!(!outcome.incident.anomaly_reasons.is_empty());

        // The escalation was written back, and emergency routing kicked in.
        let stored = f.incidents.incidents.lock().await;
        let persisted = stored.iter().find(|i| i.id == outcome.incident.id).unwrap();
        assert_eq!(persisted.severity, IncidentSeverity::High);
        assert_eq!(outcome.alerts.created, 1);
        assert!(outcome.alerts.list[0].message.starts_with("EMERGENCY:"));
    }

    #[tokio::test]
    async fn test_verdict_write_back_failure_keeps_incident_unescalated() {
        let reporter = Uuid::new_v4();
        let state = TestState {
            fail_update: true,
            ..Default::default()
        };
        let mut previous = Incident::new(
            reporter,
            "Checked in".to_string(),
            GeoPoint::new(77.209, 28.6139),
            IncidentSeverity::Low,
            None,
        );
        previous.created_at = Utc::now() - chrono::Duration::minutes(5);
        state.incidents.try_lock().unwrap().push(previous);

        let f = fixture(state, vec![]);
        let mut moved = request();
        moved.reporter_user_id = reporter;
        moved.location = GeoPoint::new(77.4, 28.8);

        let outcome = f.intake.report(moved).await.unwrap();

        // The verdict is still reported, but the incident stays as persisted.
        assert!(outcome.anomaly_detection.is_anomaly);
        assert_eq!(outcome.incident.severity, IncidentSeverity::Low);
        assert!(!outcome.incident.anomaly_detected);
    }
}

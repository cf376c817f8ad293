//! Domain services for the tourist-safety backend.
//!
//! Services contain the intake pipeline logic that operates on domain models.

pub mod alert_fanout;
pub mod anomaly_detection;
pub mod geo;
pub mod geocoding;
pub mod geofence_locator;
pub mod incident_intake;

pub use alert_fanout::{
    generate_alert_message, AlertFanout, FanoutError, FanoutFailure, FanoutOptions, FanoutReport,
    MessageOptions,
};
pub use anomaly_detection::{AnomalyDetector, AnomalyThresholds};
pub use geocoding::{GeocodeOutcome, GeocodingService, MockGeocodingService};
pub use geofence_locator::{find_containing_geofences, GeofenceScanError};
pub use incident_intake::{
    AlertDispatch, GeofenceScan, IncidentIntake, IncidentReportOutcome, IntakeError,
};

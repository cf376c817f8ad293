//! Domain models for the tourist-safety backend.

pub mod alert;
pub mod anomaly;
pub mod geofence;
pub mod incident;
pub mod point;
pub mod trip;
pub mod user;

pub use alert::Alert;
pub use anomaly::{AnomalyFinding, AnomalyKind, AnomalyVerdict};
pub use geofence::{AlertLevel, Geofence};
pub use incident::{Incident, IncidentSeverity, IncidentStatus, ReportIncidentRequest};
pub use point::GeoPoint;
pub use trip::{Trip, TripRoute};
pub use user::{User, UserRole};

//! Alert domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A per-recipient notification record produced by the fan-out engine.
///
/// The (recipient, incident, geofence) triple is unique; the fan-out engine
/// enforces this with a check-then-create pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub recipient_user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geofence_id: Option<Uuid>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Creates an unread alert with fresh id and timestamp.
    pub fn new(
        recipient_user_id: Uuid,
        incident_id: Option<Uuid>,
        geofence_id: Option<Uuid>,
        message: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_user_id,
            incident_id,
            geofence_id,
            message,
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_alert_defaults() {
        let recipient = Uuid::new_v4();
        let incident = Uuid::new_v4();
        let alert = Alert::new(recipient, Some(incident), None, "Stay alert".to_string());

        assert_eq!(alert.recipient_user_id, recipient);
        assert_eq!(alert.incident_id, Some(incident));
        assert!(alert.geofence_id.is_none());
        assert!(!alert.read);
    }

    #[test]
    fn test_alert_serialization() {
        let alert = Alert::new(Uuid::nil(), None, None, "Message".to_string());
        let json = serde_json::to_string(&alert).unwrap();

        assert!(json.contains("\"recipientUserId\""));
        assert!(json.contains("\"read\":false"));
        // Optional links are skipped when absent
        assert!(!json.contains("\"incidentId\""));
        assert!(!json.contains("\"geofenceId\""));
    }
}

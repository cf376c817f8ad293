//! Alert fan-out engine.
//!
//! Given an incident and the geofences containing it, resolves the recipient
//! set, builds one message per (recipient, geofence) pair, and persists alert
//! records. Per-pair failures are collected, never fatal; only a failure to
//! resolve recipients at all aborts a batch.
//!
//! Recipient selection is role-based, not geofence-membership-based: a
//! tourist registered anywhere receives alerts for geofences anywhere. That
//! mirrors the product behavior this engine replaces and is tracked as an
//! open product question.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Alert, AlertLevel, Geofence, Incident, IncidentSeverity, User, UserRole};
use crate::stores::{AlertStore, StoreError, UserStore};

/// Message composition switches.
#[derive(Debug, Clone)]
pub struct MessageOptions {
    pub include_severity: bool,
    pub include_location: bool,
    pub include_geofence_details: bool,
    /// Overrides all composition when present.
    pub custom_message: Option<String>,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            include_severity: true,
            include_location: true,
            include_geofence_details: true,
            custom_message: None,
        }
    }
}

/// Recipient selection and message options for one fan-out batch.
#[derive(Debug, Clone)]
pub struct FanoutOptions {
    /// Explicit allowlist; takes precedence over role selection. Entries are
    /// still role-filtered.
    pub specific_user_ids: Option<Vec<Uuid>>,
    /// Roles eligible to receive alerts.
    pub roles: Vec<UserRole>,
    /// Drop the reporter from role-selected recipients.
    pub exclude_reporter: bool,
    pub reporter_user_id: Option<Uuid>,
    pub message: MessageOptions,
}

impl Default for FanoutOptions {
    fn default() -> Self {
        Self {
            specific_user_ids: None,
            roles: vec![UserRole::Tourist, UserRole::Admin],
            exclude_reporter: true,
            reporter_user_id: None,
            message: MessageOptions::default(),
        }
    }
}

/// One (recipient, geofence) pair that could not be alerted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutFailure {
    pub geofence_id: Uuid,
    pub recipient_user_id: Uuid,
    pub error: String,
}

impl fmt::Display for FanoutFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alert for user {} in geofence {} failed: {}",
            self.recipient_user_id, self.geofence_id, self.error
        )
    }
}

/// Outcome of a fan-out batch. Partial success is success.
#[derive(Debug, Clone, Default)]
pub struct FanoutReport {
    pub alerts: Vec<Alert>,
    pub errors: Vec<FanoutFailure>,
}

/// Batch-level failure: the recipient set could not be resolved.
#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("failed to resolve alert recipients: {0}")]
    RecipientResolution(#[from] StoreError),
}

/// Builds the notification text for one (incident, geofence) pair.
///
/// Deterministic composition from the options; `custom_message` wins
/// outright when present.
pub fn generate_alert_message(
    incident: &Incident,
    geofence: &Geofence,
    options: &MessageOptions,
) -> String {
    if let Some(custom) = &options.custom_message {
        return custom.clone();
    }

    let mut message = format!("Safety alert: {}", incident.description);

    if options.include_severity {
        message.push_str(&format!(" [severity: {}]", incident.severity));
    }

    if options.include_location {
        if let Some(address) = &incident.address {
            message.push_str(&format!(" near {}", address));
        }
    }

    if options.include_geofence_details {
        message.push_str(&format!(
            " ({} zone, radius {:.0} m)",
            geofence.alert_level, geofence.radius_meters
        ));
    }

    message.push_str(&format!(
        " (reported {})",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));

    message
}

/// Fixed template used when an incident escalates to an emergency.
fn emergency_message(incident: &Incident) -> String {
    let location = incident
        .address
        .as_deref()
        .unwrap_or("an unverified location");
    format!(
        "EMERGENCY: {} near {}. Authorities have been notified; avoid the area and check in with your contacts.",
        incident.description, location
    )
}

/// Alert fan-out engine over the user and alert stores.
#[derive(Clone)]
pub struct AlertFanout {
    users: Arc<dyn UserStore>,
    alerts: Arc<dyn AlertStore>,
}

impl AlertFanout {
    pub fn new(users: Arc<dyn UserStore>, alerts: Arc<dyn AlertStore>) -> Self {
        Self { users, alerts }
    }

    /// Resolves the recipient set for a batch.
    ///
    /// An explicit allowlist takes precedence and is role-filtered; missing
    /// allowlist entries are skipped with a warning. Otherwise every user
    /// holding one of the configured roles is selected, minus the reporter
    /// when exclusion is on.
    pub async fn resolve_target_users(
        &self,
        options: &FanoutOptions,
    ) -> Result<Vec<User>, FanoutError> {
        if let Some(ids) = &options.specific_user_ids {
            let mut recipients = Vec::with_capacity(ids.len());
            for id in ids {
                match self.users.find_by_id(*id).await? {
                    Some(user) if options.roles.contains(&user.role) => recipients.push(user),
                    Some(user) => {
                        debug!(user_id = %user.id, role = %user.role, "Allowlisted user outside eligible roles");
                    }
                    None => {
                        warn!(user_id = %id, "Allowlisted alert recipient not found");
                    }
                }
            }
            return Ok(recipients);
        }

        let mut recipients = self.users.list_by_roles(&options.roles).await?;
        if options.exclude_reporter {
            if let Some(reporter) = options.reporter_user_id {
                recipients.retain(|user| user.id != reporter);
            }
        }
        Ok(recipients)
    }

    /// Creates one alert unless the (recipient, incident, geofence) triple
    /// already has one.
    ///
    /// The existence check and insert are not atomic; under concurrent
    /// duplicate submissions at most one extra row can slip through, which
    /// downstream consumers tolerate.
    pub async fn create_single_alert(
        &self,
        incident: &Incident,
        geofence: &Geofence,
        recipient: &User,
        options: &FanoutOptions,
    ) -> Result<Option<Alert>, StoreError> {
        let exists = self
            .alerts
            .exists(recipient.id, Some(incident.id), Some(geofence.id))
            .await?;
        if exists {
            debug!(
                recipient_user_id = %recipient.id,
                incident_id = %incident.id,
                geofence_id = %geofence.id,
                "Alert already exists; skipping duplicate"
            );
            return Ok(None);
        }

        let message = generate_alert_message(incident, geofence, &options.message);
        let alert = Alert::new(recipient.id, Some(incident.id), Some(geofence.id), message);
        self.alerts.insert(&alert).await?;
        Ok(Some(alert))
    }

    /// Fans out over the cross product of geofences and resolved recipients.
    ///
    /// Per-pair failures land in the report's error list without aborting
    /// the rest of the batch.
    pub async fn create_alerts_for_geofences(
        &self,
        incident: &Incident,
        geofences: &[Geofence],
        options: &FanoutOptions,
    ) -> Result<FanoutReport, FanoutError> {
        let recipients = self.resolve_target_users(options).await?;
        let mut report = FanoutReport::default();

        for geofence in geofences {
            for recipient in &recipients {
                match self
                    .create_single_alert(incident, geofence, recipient, options)
                    .await
                {
                    Ok(Some(alert)) => report.alerts.push(alert),
                    Ok(None) => {}
                    Err(err) => report.errors.push(FanoutFailure {
                        geofence_id: geofence.id,
                        recipient_user_id: recipient.id,
                        error: err.to_string(),
                    }),
                }
            }
        }

        info!(
            incident_id = %incident.id,
            geofences = geofences.len(),
            recipients = recipients.len(),
            created = report.alerts.len(),
            failed = report.errors.len(),
            "Alert fan-out complete"
        );

        Ok(report)
    }

    /// Fans out only over geofences carrying one of the given alert levels.
    ///
    /// An empty filtered set is a success with zero alerts.
    pub async fn create_alerts_for_geofence_levels(
        &self,
        incident: &Incident,
        geofences: &[Geofence],
        levels: &[AlertLevel],
        options: &FanoutOptions,
    ) -> Result<FanoutReport, FanoutError> {
        let filtered: Vec<Geofence> = geofences
            .iter()
            .filter(|fence| levels.contains(&fence.alert_level))
            .cloned()
            .collect();

        if filtered.is_empty() {
            debug!(incident_id = %incident.id, "No geofences match the requested alert levels");
            return Ok(FanoutReport::default());
        }

        self.create_alerts_for_geofences(incident, &filtered, options)
            .await
    }

    /// Emergency fan-out for high-severity incidents.
    ///
    /// A no-op success below high severity. Otherwise forces role-wide
    /// delivery including the reporter, with a fixed emergency message.
    pub async fn create_emergency_alerts(
        &self,
        incident: &Incident,
        geofences: &[Geofence],
        options: &FanoutOptions,
    ) -> Result<FanoutReport, FanoutError> {
        if incident.severity != IncidentSeverity::High {
            return Ok(FanoutReport::default());
        }

        let mut options = options.clone();
        options.specific_user_ids = None;
        options.exclude_reporter = false;
        options.message.custom_message = Some(emergency_message(incident));

        self.create_alerts_for_geofences(incident, geofences, &options)
            .await
    }
}

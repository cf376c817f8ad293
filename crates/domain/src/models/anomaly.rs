//! Anomaly detection result types.
//!
//! These are ephemeral values carried through the intake pipeline and the
//! response envelope; they are not persisted as their own entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::geofence::AlertLevel;

/// Kind of rule that flagged an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    SuddenDropOff,
    Inactivity,
    RouteDeviation,
}

impl AnomalyKind {
    /// Returns the string representation for logs and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::SuddenDropOff => "sudden_drop_off",
            AnomalyKind::Inactivity => "inactivity",
            AnomalyKind::RouteDeviation => "route_deviation",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One triggered rule check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyFinding {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub reason: String,
    pub severity: AlertLevel,
}

/// Combined verdict over all rule checks for one incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_severity: Option<AlertLevel>,
    pub anomalies: Vec<AnomalyFinding>,
    pub detected_at: DateTime<Utc>,
}

impl AnomalyVerdict {
    /// The neutral verdict: nothing triggered.
    pub fn none(detected_at: DateTime<Utc>) -> Self {
        Self {
            is_anomaly: false,
            reasons: Vec::new(),
            suggested_severity: None,
            anomalies: Vec::new(),
            detected_at,
        }
    }

    /// Aggregates triggered findings into a single verdict.
    ///
    /// The suggested severity is danger if any finding is danger, warning if
    /// anything triggered at all, and absent otherwise.
    pub fn from_findings(findings: Vec<AnomalyFinding>, detected_at: DateTime<Utc>) -> Self {
        if findings.is_empty() {
            return Self::none(detected_at);
        }

        let suggested = if findings.iter().any(|f| f.severity == AlertLevel::Danger) {
            AlertLevel::Danger
        } else {
            AlertLevel::Warning
        };

        Self {
            is_anomaly: true,
            reasons: findings.iter().map(|f| f.reason.clone()).collect(),
            suggested_severity: Some(suggested),
            anomalies: findings,
            detected_at,
        }
    }
}

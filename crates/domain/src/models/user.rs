//! User domain model.
//!
//! Only the surface the fan-out engine needs: identity, display name and
//! role. Registration, profiles and authentication live outside this core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role a user holds in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Tourist,
    Admin,
}

impl UserRole {
    /// Returns the string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Tourist => "tourist",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tourist" => Ok(UserRole::Tourist),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!(
                "Invalid user role: {}. Must be one of: tourist, admin",
                s
            )),
        }
    }
}

/// A registered user able to report incidents and receive alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a user with fresh id and timestamp.
    pub fn new(display_name: String, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name,
            role,
            created_at: Utc::now(),
        }
    }
}

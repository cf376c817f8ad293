//! Data-access trait seams.
//!
//! The intake pipeline only assumes a document store reachable by simple
//! key/filter queries. Each trait below is one such seam; the persistence
//! crate provides an in-memory implementation, and production deployments
//! can substitute any backend that satisfies the same contracts.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Alert, Geofence, Incident, Trip, User, UserRole};

/// Failure from a store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Lookup of alert recipients and reporters.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// All users holding any of the given roles.
    async fn list_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>, StoreError>;
}

/// Persistence of incidents and lookup of a reporter's history.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn insert(&self, incident: &Incident) -> Result<(), StoreError>;

    /// Replaces the stored incident with the given state.
    async fn update(&self, incident: &Incident) -> Result<(), StoreError>;

    /// The reporter's most recently created incident other than
    /// `exclude_incident`, if any.
    async fn latest_for_user_excluding(
        &self,
        user_id: Uuid,
        exclude_incident: Uuid,
    ) -> Result<Option<Incident>, StoreError>;
}

/// Listing of geofences eligible for containment scans.
#[async_trait]
pub trait GeofenceStore: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Geofence>, StoreError>;
}

/// Persistence of alerts and the duplicate check backing fan-out idempotency.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert(&self, alert: &Alert) -> Result<(), StoreError>;

    /// Whether an alert already exists for the exact
    /// (recipient, incident, geofence) triple, `None` components included.
    async fn exists(
        &self,
        recipient_user_id: Uuid,
        incident_id: Option<Uuid>,
        geofence_id: Option<Uuid>,
    ) -> Result<bool, StoreError>;
}

/// Lookup of registered trips.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Trip>, StoreError>;
}

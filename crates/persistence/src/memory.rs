//! In-memory document store.
//!
//! Backs every domain store seam with `RwLock`-guarded maps. Suitable for
//! tests, demos, and single-process deployments; any document store
//! reachable by key/filter queries can replace it behind the same traits.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use domain::models::{Alert, Geofence, Incident, Trip, User, UserRole};
use domain::stores::{
    AlertStore, GeofenceStore, IncidentStore, StoreError, TripStore, UserStore,
};

use crate::metrics::{record_collection_size, OperationTimer};

/// Shared in-memory store for all collections.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    incidents: RwLock<HashMap<Uuid, Incident>>,
    geofences: RwLock<HashMap<Uuid, Geofence>>,
    alerts: RwLock<HashMap<Uuid, Alert>>,
    trips: RwLock<HashMap<Uuid, Trip>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user.
    pub async fn put_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    /// Registers a geofence.
    pub async fn put_geofence(&self, geofence: Geofence) {
        let mut geofences = self.geofences.write().await;
        geofences.insert(geofence.id, geofence);
        record_collection_size("geofences", geofences.len());
    }

    /// Registers a trip.
    pub async fn put_trip(&self, trip: Trip) {
        self.trips.write().await.insert(trip.id, trip);
    }

    /// Snapshot of all stored alerts, newest last.
    pub async fn list_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.alerts.read().await.values().cloned().collect();
        alerts.sort_by_key(|a| a.created_at);
        alerts
    }

    /// Snapshot of one stored incident.
    pub async fn get_incident(&self, id: Uuid) -> Option<Incident> {
        self.incidents.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let timer = OperationTimer::new("find_user_by_id");
        let user = self.users.read().await.get(&id).cloned();
        timer.record();
        Ok(user)
    }

    async fn list_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>, StoreError> {
        let timer = OperationTimer::new("list_users_by_roles");
        let mut users: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|user| roles.contains(&user.role))
            .cloned()
            .collect();
        // Deterministic order for stable fan-out batches.
        users.sort_by_key(|user| user.created_at);
        timer.record();
        Ok(users)
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn insert(&self, incident: &Incident) -> Result<(), StoreError> {
        let timer = OperationTimer::new("insert_incident");
        let mut incidents = self.incidents.write().await;
        incidents.insert(incident.id, incident.clone());
        record_collection_size("incidents", incidents.len());
        timer.record();
        debug!(incident_id = %incident.id, "Stored incident");
        Ok(())
    }

    async fn update(&self, incident: &Incident) -> Result<(), StoreError> {
        let timer = OperationTimer::new("update_incident");
        let mut incidents = self.incidents.write().await;
        let result = match incidents.get_mut(&incident.id) {
            Some(stored) => {
                *stored = incident.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        };
        timer.record();
        result
    }

    async fn latest_for_user_excluding(
        &self,
        user_id: Uuid,
        exclude_incident: Uuid,
    ) -> Result<Option<Incident>, StoreError> {
        let timer = OperationTimer::new("latest_incident_for_user");
        let latest = self
            .incidents
            .read()
            .await
            .values()
            .filter(|incident| {
                incident.reporter_user_id == user_id && incident.id != exclude_incident
            })
            .max_by_key(|incident| incident.created_at)
            .cloned();
        timer.record();
        Ok(latest)
    }
}

#[async_trait]
impl GeofenceStore for MemoryStore {
    async fn list_active(&self) -> Result<Vec<Geofence>, StoreError> {
        let timer = OperationTimer::new("list_active_geofences");
        let mut geofences: Vec<Geofence> = self
            .geofences
            .read()
            .await
            .values()
            .filter(|fence| fence.active)
            .cloned()
            .collect();
        geofences.sort_by_key(|fence| fence.created_at);
        timer.record();
        Ok(geofences)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert(&self, alert: &Alert) -> Result<(), StoreError> {
        let timer = OperationTimer::new("insert_alert");
        let mut alerts = self.alerts.write().await;
        alerts.insert(alert.id, alert.clone());
        record_collection_size("alerts", alerts.len());
        timer.record();
        Ok(())
    }

    async fn exists(
        &self,
        recipient_user_id: Uuid,
        incident_id: Option<Uuid>,
        geofence_id: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let timer = OperationTimer::new("alert_exists");
        let exists = self.alerts.read().await.values().any(|alert| {
            alert.recipient_user_id == recipient_user_id
                && alert.incident_id == incident_id
                && alert.geofence_id == geofence_id
        });
        timer.record();
        Ok(exists)
    }
}

#[async_trait]
impl TripStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        let timer = OperationTimer::new("find_trip_by_id");
        let trip = self.trips.read().await.get(&id).cloned();
        timer.record();
        Ok(trip)
    }
}

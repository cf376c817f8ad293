//! Domain layer for the tourist-safety backend.
//!
//! This crate contains:
//! - Domain models (GeoPoint, Geofence, Incident, Alert, Trip, User)
//! - The incident intake pipeline and its services
//! - Store and geocoding trait seams with mock implementations for tests

pub mod models;
pub mod services;
pub mod stores;

//! Reverse-geocoding collaborator seam.
//!
//! Provider failures are part of normal operation: the outcome type carries
//! `success: false` instead of an error, so the intake pipeline can degrade
//! to an address-less incident without special casing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Result of a reverse-geocoding attempt. Infallible by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl GeocodeOutcome {
    /// An address was resolved.
    pub fn found(address: impl Into<String>) -> Self {
        Self {
            success: true,
            message: "Address resolved".to_string(),
            address: Some(address.into()),
        }
    }

    /// The provider answered but had no address for the coordinates.
    pub fn not_found() -> Self {
        Self {
            success: false,
            message: "No address found for coordinates".to_string(),
            address: None,
        }
    }

    /// The provider could not be reached or failed.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            address: None,
        }
    }
}

/// Reverse-geocoding service seam.
#[async_trait]
pub trait GeocodingService: Send + Sync {
    /// Resolves a human-readable address for the given coordinates.
    ///
    /// Takes (latitude, longitude) in that order, matching the upstream
    /// provider convention rather than the `[lng, lat]` storage order.
    async fn reverse_geocode(&self, lat: f64, lng: f64) -> GeocodeOutcome;
}

/// Mock geocoding service for development and testing.
#[derive(Debug, Clone, Default)]
pub struct MockGeocodingService {
    /// Address returned on success.
    pub address: Option<String>,
    /// Whether to simulate provider failure.
    pub simulate_failure: bool,
}

impl MockGeocodingService {
    /// Mock that resolves every lookup to the given address.
    pub fn resolving(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            simulate_failure: false,
        }
    }

    /// Mock that simulates an unreachable provider.
    pub fn failing() -> Self {
        Self {
            address: None,
            simulate_failure: true,
        }
    }
}

#[async_trait]
impl GeocodingService for MockGeocodingService {
    async fn reverse_geocode(&self, lat: f64, lng: f64) -> GeocodeOutcome {
        if self.simulate_failure {
            return GeocodeOutcome::unavailable("Mock geocoding failure");
        }

        info!(lat, lng, "Mock: resolving address");
        match &self.address {
            Some(address) => GeocodeOutcome::found(address.clone()),
            None => GeocodeOutcome::not_found(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_resolves_fixed_address() {
        let service = MockGeocodingService::resolving("12 Janpath, New Delhi");
        let outcome = service.reverse_geocode(28.6139, 77.209).await;

        assert!(outcome.success);
        assert_eq!(outcome.address.as_deref(), Some("12 Janpath, New Delhi"));
    }

    #[tokio::test]
    async fn test_mock_failure_is_not_a_panic() {
        let service = MockGeocodingService::failing();
        let outcome = service.reverse_geocode(0.0, 0.0).await;

        assert!(!outcome.success);
        assert!(outcome.address.is_none());
    }

    #[tokio::test]
    async fn test_mock_without_address_reports_not_found() {
        let service = MockGeocodingService::default();
        let outcome = service.reverse_geocode(0.0, 0.0).await;

        assert!(!outcome.success);
        assert_eq!(outcome.message, "No address found for coordinates");
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = GeocodeOutcome::found("Somewhere 1");
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"address\":\"Somewhere 1\""));

        let failed = GeocodeOutcome::unavailable("offline");
        let json = serde_json::to_string(&failed).unwrap();
        assert!(!json.contains("\"address\""));
    }
}

//! Nominatim reverse-geocoding client.
//!
//! Wraps the provider behind the domain's `GeocodingService` seam: every
//! failure mode (disabled, rate limited, circuit open, timeout, provider
//! error) surfaces as a `GeocodeOutcome` with `success: false`, never as an
//! error crossing the seam.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use domain::services::geocoding::{GeocodeOutcome, GeocodingService};

use crate::config::GeocodingConfig;

/// Errors that can occur during a reverse-geocoding request.
#[derive(Debug, Error)]
pub enum GeocodingError {
    #[error("Reverse geocoding is disabled")]
    Disabled,

    #[error("Geocoding service URL not configured")]
    NotConfigured,

    #[error("Circuit breaker is open, service temporarily unavailable")]
    CircuitOpen,

    #[error("Rate limit exceeded, try again later")]
    RateLimited,

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response from geocoding service: {0}")]
    InvalidResponse(String),

    #[error("Geocoding service error: {0}")]
    ServiceError(String),

    #[error("No address found for coordinates")]
    NoAddress,
}

/// Nominatim `/reverse` response structure (`format=jsonv2`).
#[derive(Debug, Deserialize)]
struct NominatimReverseResponse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Simple token bucket refilled once per minute.
struct RateLimiter {
    tokens: AtomicU32,
    max_tokens: u32,
    /// Last refill timestamp (unix millis).
    last_refill: AtomicU64,
}

impl RateLimiter {
    fn new(requests_per_minute: u32) -> Self {
        Self {
            tokens: AtomicU32::new(requests_per_minute),
            max_tokens: requests_per_minute,
            last_refill: AtomicU64::new(now_millis()),
        }
    }

    /// Try to acquire a token. Returns true if allowed.
    fn try_acquire(&self) -> bool {
        let now = now_millis();
        let elapsed = now.saturating_sub(self.last_refill.load(Ordering::Relaxed));
        if elapsed >= 60_000 {
            self.tokens.store(self.max_tokens, Ordering::Relaxed);
            self.last_refill.store(now, Ordering::Relaxed);
        }

        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current == 0 {
                return false;
            }
            if self
                .tokens
                .compare_exchange_weak(current, current - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Circuit breaker protecting the external provider from hammering while it
/// is failing.
struct CircuitBreaker {
    is_open: AtomicBool,
    failure_count: AtomicU32,
    failure_threshold: u32,
    reset_timeout: Duration,
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    fn new(failure_threshold: u32, reset_timeout_secs: u64) -> Self {
        Self {
            is_open: AtomicBool::new(false),
            failure_count: AtomicU32::new(0),
            failure_threshold,
            reset_timeout: Duration::from_secs(reset_timeout_secs),
            opened_at: RwLock::new(None),
        }
    }

    /// Whether a request may go out. Allows a single probe once the reset
    /// timeout has elapsed.
    async fn is_allowed(&self) -> bool {
        if !self.is_open.load(Ordering::Relaxed) {
            return true;
        }

        let opened_at = *self.opened_at.read().await;
        if let Some(opened) = opened_at {
            if opened.elapsed() >= self.reset_timeout {
                debug!("Geocoding circuit breaker allowing half-open probe");
                return true;
            }
        }

        false
    }

    async fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if self.is_open.load(Ordering::Relaxed) {
            info!("Geocoding circuit breaker closed after successful request");
            self.is_open.store(false, Ordering::Relaxed);
            *self.opened_at.write().await = None;
        }
    }

    async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;

        if count >= self.failure_threshold && !self.is_open.load(Ordering::Relaxed) {
            warn!(
                failure_count = count,
                threshold = self.failure_threshold,
                "Geocoding circuit breaker opened due to consecutive failures"
            );
            self.is_open.store(true, Ordering::Relaxed);
            *self.opened_at.write().await = Some(Instant::now());
        }
    }

    #[allow(dead_code)] // Used for testing
    fn is_open_now(&self) -> bool {
        self.is_open.load(Ordering::Relaxed)
    }
}

/// Reverse-geocoding client for a Nominatim-compatible provider.
pub struct ReverseGeocoder {
    client: Client,
    config: GeocodingConfig,
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
}

impl ReverseGeocoder {
    /// Create a new client from configuration.
    pub fn new(config: GeocodingConfig) -> Result<Self, GeocodingError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(GeocodingError::Http)?;

        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute);
        let circuit_breaker = CircuitBreaker::new(
            config.circuit_breaker_failures,
            config.circuit_breaker_reset_secs,
        );

        Ok(Self {
            client,
            config,
            rate_limiter,
            circuit_breaker,
        })
    }

    /// Whether the client is enabled and configured.
    pub fn is_available(&self) -> bool {
        self.config.enabled && !self.config.url.is_empty()
    }

    /// Resolve an address for the given coordinates.
    pub async fn lookup(&self, lat: f64, lng: f64) -> Result<String, GeocodingError> {
        if !self.config.enabled {
            return Err(GeocodingError::Disabled);
        }
        if self.config.url.is_empty() {
            return Err(GeocodingError::NotConfigured);
        }
        if !self.circuit_breaker.is_allowed().await {
            return Err(GeocodingError::CircuitOpen);
        }
        if !self.rate_limiter.try_acquire() {
            return Err(GeocodingError::RateLimited);
        }

        let start = Instant::now();
        let result = self.call_reverse(lat, lng).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(address) => {
                self.circuit_breaker.record_success().await;
                debug!(lat, lng, duration_ms, "Reverse geocoding successful");
                Ok(address)
            }
            // An address-less spot is a valid provider answer, not an outage.
            Err(GeocodingError::NoAddress) => {
                self.circuit_breaker.record_success().await;
                Err(GeocodingError::NoAddress)
            }
            Err(err) => {
                self.circuit_breaker.record_failure().await;
                warn!(lat, lng, duration_ms, error = %err, "Reverse geocoding failed");
                Err(err)
            }
        }
    }

    fn reverse_url(&self, lat: f64, lng: f64) -> String {
        format!(
            "{}/reverse?format=jsonv2&lat={}&lon={}",
            self.config.url.trim_end_matches('/'),
            lat,
            lng
        )
    }

    async fn call_reverse(&self, lat: f64, lng: f64) -> Result<String, GeocodingError> {
        let url = self.reverse_url(lat, lng);
        debug!(url = %url, "Calling reverse geocoding API");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                GeocodingError::Timeout(self.config.timeout_ms)
            } else {
                GeocodingError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeocodingError::ServiceError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: NominatimReverseResponse = response
            .json()
            .await
            .map_err(|e| GeocodingError::InvalidResponse(e.to_string()))?;

        extract_address(parsed)
    }
}

/// Maps a provider response body to an address.
fn extract_address(response: NominatimReverseResponse) -> Result<String, GeocodingError> {
    if let Some(error) = response.error {
        // Nominatim reports "Unable to geocode" for coordinates it has no
        // coverage for, e.g. open ocean.
        if error == "Unable to geocode" {
            return Err(GeocodingError::NoAddress);
        }
        return Err(GeocodingError::ServiceError(error));
    }
    match response.display_name {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(GeocodingError::NoAddress),
    }
}

#[async_trait]
impl GeocodingService for ReverseGeocoder {
    async fn reverse_geocode(&self, lat: f64, lng: f64) -> GeocodeOutcome {
        match self.lookup(lat, lng).await {
            Ok(address) => GeocodeOutcome::found(address),
            Err(GeocodingError::NoAddress) => GeocodeOutcome::not_found(),
            Err(err) => GeocodeOutcome::unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_config() -> GeocodingConfig {
        GeocodingConfig {
            url: "https://nominatim.example.org".to_string(),
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_reverse_url_shape() {
        let geocoder = ReverseGeocoder::new(enabled_config()).unwrap();
        assert_eq!(
            geocoder.reverse_url(28.6139, 77.209),
            "https://nominatim.example.org/reverse?format=jsonv2&lat=28.6139&lon=77.209"
        );
    }

    #[test]
    fn test_reverse_url_trims_trailing_slash() {
        let mut config = enabled_config();
        config.url = "https://nominatim.example.org/".to_string();
        let geocoder = ReverseGeocoder::new(config).unwrap();
        assert!(geocoder
            .reverse_url(1.0, 2.0)
            .starts_with("https://nominatim.example.org/reverse"));
    }

    #[test]
    fn test_is_available() {
        assert!(ReverseGeocoder::new(enabled_config()).unwrap().is_available());
        assert!(!ReverseGeocoder::new(GeocodingConfig::default())
            .unwrap()
            .is_available());
    }

    #[tokio::test]
    async fn test_disabled_client_reports_unavailable_outcome() {
        let geocoder = ReverseGeocoder::new(GeocodingConfig::default()).unwrap();
        let outcome = geocoder.reverse_geocode(28.6139, 77.209).await;
        assert!(!outcome.success);
        assert!(outcome.address.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_url_is_an_error() {
        let mut config = GeocodingConfig::default();
        config.enabled = true;
        let geocoder = ReverseGeocoder::new(config).unwrap();
        assert!(matches!(
            geocoder.lookup(0.0, 0.0).await,
            Err(GeocodingError::NotConfigured)
        ));
    }

    #[test]
    fn test_rate_limiter_denies_after_budget() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_threshold() {
        let breaker = CircuitBreaker::new(2, 60);
        assert!(breaker.is_allowed().await);

        breaker.record_failure().await;
        assert!(!breaker.is_open_now());
        breaker.record_failure().await;
        assert!(breaker.is_open_now());
        assert!(!breaker.is_allowed().await);
    }

    #[tokio::test]
    async fn test_circuit_breaker_closes_on_success() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure().await;
        assert!(breaker.is_open_now());

        // Zero reset timeout: the next probe is allowed immediately.
        assert!(breaker.is_allowed().await);
        breaker.record_success().await;
        assert!(!breaker.is_open_now());
    }

    #[test]
    fn test_extract_address_from_display_name() {
        let response: NominatimReverseResponse = serde_json::from_str(
            r#"{"place_id": 42, "display_name": "Connaught Place, New Delhi, India"}"#,
        )
        .unwrap();
        assert_eq!(
            extract_address(response).unwrap(),
            "Connaught Place, New Delhi, India"
        );
    }

    #[test]
    fn test_extract_address_uncovered_coordinates_is_no_address() {
        let response: NominatimReverseResponse =
            serde_json::from_str(r#"{"error": "Unable to geocode"}"#).unwrap();
        assert!(matches!(
            extract_address(response),
            Err(GeocodingError::NoAddress)
        ));
    }

    #[test]
    fn test_extract_address_other_provider_error_is_service_error() {
        let response: NominatimReverseResponse =
            serde_json::from_str(r#"{"error": "Internal error"}"#).unwrap();
        assert!(matches!(
            extract_address(response),
            Err(GeocodingError::ServiceError(_))
        ));
    }

    #[test]
    fn test_extract_address_empty_body_is_no_address() {
        let response: NominatimReverseResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            extract_address(response),
            Err(GeocodingError::NoAddress)
        ));
    }
}

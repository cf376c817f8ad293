//! Reverse-geocoding client for the tourist-safety backend.
//!
//! This crate contains:
//! - Configuration for a Nominatim-compatible provider
//! - An HTTP client with rate limiting and a circuit breaker
//! - The production implementation of `domain`'s `GeocodingService` seam

pub mod client;
pub mod config;

pub use client::{GeocodingError, ReverseGeocoder};
pub use config::GeocodingConfig;

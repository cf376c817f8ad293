use serde::Deserialize;

/// Configuration for the reverse-geocoding provider.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL of a Nominatim-compatible service (required if enabled).
    #[serde(default)]
    pub url: String,

    /// User-Agent header; public Nominatim instances require an identifying
    /// agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Rate limit: max requests per minute to the external service.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// Number of failures before the circuit breaker opens.
    #[serde(default = "default_circuit_breaker_failures")]
    pub circuit_breaker_failures: u32,

    /// Seconds to keep the circuit breaker open before retry.
    #[serde(default = "default_circuit_breaker_reset_secs")]
    pub circuit_breaker_reset_secs: u64,

    /// Whether reverse geocoding is enabled.
    #[serde(default)]
    pub enabled: bool,
}

// Default value functions
fn default_user_agent() -> String {
    "tourist-safety-backend".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_rate_limit() -> u32 {
    60
}
fn default_circuit_breaker_failures() -> u32 {
    5
}
fn default_circuit_breaker_reset_secs() -> u64 {
    60
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            rate_limit_per_minute: default_rate_limit(),
            circuit_breaker_failures: default_circuit_breaker_failures(),
            circuit_breaker_reset_secs: default_circuit_breaker_reset_secs(),
            enabled: false,
        }
    }
}

impl GeocodingConfig {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/geocoding.toml - optional base configuration
    /// 2. Environment variables with TS_GEOCODING__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/geocoding").required(false))
            .add_source(config::Environment::with_prefix("TS_GEOCODING").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from explicit overrides, for tests.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeocodingConfig::default();
        assert!(!config.enabled);
        assert!(config.url.is_empty());
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.rate_limit_per_minute, 60);
        assert_eq!(config.circuit_breaker_failures, 5);
        assert_eq!(config.user_agent, "tourist-safety-backend");
    }

    #[test]
    fn test_empty_sources_fall_back_to_defaults() {
        let config = GeocodingConfig::load_for_test(&[]).expect("Failed to load config");
        assert_eq!(config.timeout_ms, GeocodingConfig::default().timeout_ms);
    }

    #[test]
    fn test_overrides() {
        let config = GeocodingConfig::load_for_test(&[
            ("url", "https://nominatim.example.org"),
            ("enabled", "true"),
            ("timeout_ms", "2500"),
        ])
        .expect("Failed to load config");

        assert!(config.enabled);
        assert_eq!(config.url, "https://nominatim.example.org");
        assert_eq!(config.timeout_ms, 2500);
    }
}

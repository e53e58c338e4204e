//! Endpoints, timeouts and request spacing for the Census geocoder,
//! Google Maps and the ACS data API.
//!
//! Definitions live in `services/*.toml` and are baked into the binary.
//! Credentials are never stored here, only the names of the environment
//! variables that hold them.

use std::time::Duration;

use serde::Deserialize;

/// An external service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Unique identifier (e.g., `"census_geocoder"`, `"google_maps"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum delay between requests in milliseconds.
    #[serde(default)]
    pub rate_limit_ms: u64,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// US Census Bureau geocoder (`geographies` endpoints).
    CensusGeocoder {
        /// API base URL (e.g., `"https://geocoding.geo.census.gov/geocoder"`).
        base_url: String,
        /// Address range benchmark.
        benchmark: String,
        /// Geography vintage.
        vintage: String,
    },
    /// Google Maps Geocoding API.
    GoogleMaps {
        /// API endpoint.
        base_url: String,
        /// Environment variable holding the API key.
        api_key_env: String,
    },
    /// Census Data API, ACS 5-year detailed tables.
    CensusAcs {
        /// Dataset URL.
        base_url: String,
        /// Environment variable holding the optional API key.
        api_key_env: String,
        /// Survey label stamped on records.
        survey: String,
        /// Survey vintage year.
        year: String,
        /// Confidence label.
        confidence: String,
        /// Snapshot release date.
        last_updated: String,
    },
}

const fn default_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    /// Returns the provider's base URL regardless of variant.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::CensusGeocoder { base_url, .. }
            | ProviderConfig::GoogleMaps { base_url, .. }
            | ProviderConfig::CensusAcs { base_url, .. } => base_url,
        }
    }

    /// Environment variable holding this provider's credential, if it
    /// takes one.
    #[must_use]
    pub fn api_key_env(&self) -> Option<&str> {
        match &self.provider {
            ProviderConfig::CensusGeocoder { .. } => None,
            ProviderConfig::GoogleMaps { api_key_env, .. }
            | ProviderConfig::CensusAcs { api_key_env, .. } => Some(api_key_env),
        }
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

const SERVICE_TOMLS: &[(&str, &str)] = &[
    ("census_geocoder", include_str!("../services/census_geocoder.toml")),
    ("google_maps", include_str!("../services/google_maps.toml")),
    ("census_acs", include_str!("../services/census_acs.toml")),
];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 3;

/// Returns every service configuration.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_services() -> Vec<ServiceConfig> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse service config '{name}': {e}"))
        })
        .collect()
}

/// Returns the service with the given id.
#[must_use]
pub fn service(id: &str) -> Option<ServiceConfig> {
    all_services().into_iter().find(|s| s.id == id)
}

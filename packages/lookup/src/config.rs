//! Runtime settings: service endpoints from the embedded registry plus
//! credentials and file locations from the environment.

use std::path::PathBuf;

use thiserror::Error;
use tract_income_demographics::DemographicsError;
use tract_income_demographics::acs::AcsConfig;
use tract_income_ffiec::DEFAULT_CANDIDATES;
use tract_income_geocoder::GeocodeError;
use tract_income_geocoder::census::CensusConfig;
use tract_income_geocoder::google::GoogleConfig;
use tract_income_lookup_models::DataSource;

use crate::service_registry::{ProviderConfig, ServiceConfig, all_services};

/// Overrides the FFIEC reference file location. Tried before the
/// default candidates.
pub const FFIEC_PATH_ENV: &str = "FFIEC_TRACT_LIST_PATH";

/// Errors from building a lookup from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required service is missing from the registry.
    #[error("No service configured with id '{0}'")]
    MissingService(&'static str),

    /// A service id is bound to an unexpected provider type.
    #[error("Service '{id}' has an unexpected provider type")]
    UnexpectedProvider {
        /// The service id.
        id: String,
    },

    /// A geocoder client could not be built.
    #[error(transparent)]
    Geocoder(#[from] GeocodeError),

    /// The survey client could not be built.
    #[error(transparent)]
    Demographics(#[from] DemographicsError),
}

/// Everything needed to wire up a [`TractLookup`](crate::TractLookup).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Census geocoder endpoint.
    pub census: CensusConfig,
    /// Google geocoder endpoint.
    pub google: GoogleConfig,
    /// Google API key; without one the secondary provider is skipped.
    pub google_api_key: Option<String>,
    /// ACS endpoint.
    pub acs: AcsConfig,
    /// Optional Census Data API key.
    pub census_api_key: Option<String>,
    /// FFIEC reference file candidates, in priority order.
    pub ffiec_candidates: Vec<PathBuf>,
}

impl Settings {
    /// Reads settings from the embedded registry and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required service is missing or
    /// misconfigured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_services(&all_services(), |name| std::env::var(name).ok())
    }

    /// Builds settings from service definitions and an environment
    /// lookup. Blank variables count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required service is missing or
    /// misconfigured.
    pub fn from_services(
        services: &[ServiceConfig],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let census_svc = find(services, "census_geocoder")?;
        let ProviderConfig::CensusGeocoder {
            base_url,
            benchmark,
            vintage,
        } = &census_svc.provider
        else {
            return Err(unexpected(census_svc));
        };
        let census = CensusConfig {
            base_url: base_url.clone(),
            benchmark: benchmark.clone(),
            vintage: vintage.clone(),
            timeout: census_svc.timeout(),
            rate_limit_ms: census_svc.rate_limit_ms,
        };

        let google_svc = find(services, "google_maps")?;
        let ProviderConfig::GoogleMaps {
            base_url,
            api_key_env,
        } = &google_svc.provider
        else {
            return Err(unexpected(google_svc));
        };
        let google = GoogleConfig {
            base_url: base_url.clone(),
            timeout: google_svc.timeout(),
            rate_limit_ms: google_svc.rate_limit_ms,
        };
        let google_api_key = var(api_key_env.as_str());

        let acs_svc = find(services, "census_acs")?;
        let ProviderConfig::CensusAcs {
            base_url,
            api_key_env,
            survey,
            year,
            confidence,
            last_updated,
        } = &acs_svc.provider
        else {
            return Err(unexpected(acs_svc));
        };
        let acs = AcsConfig {
            base_url: base_url.clone(),
            timeout: acs_svc.timeout(),
            rate_limit_ms: acs_svc.rate_limit_ms,
            data_source: DataSource {
                survey: survey.clone(),
                year: year.clone(),
                confidence: confidence.clone(),
                last_updated: last_updated.clone(),
            },
        };
        let census_api_key = var(api_key_env.as_str());

        let ffiec_candidates = var(FFIEC_PATH_ENV)
            .map(PathBuf::from)
            .into_iter()
            .chain(DEFAULT_CANDIDATES.iter().map(PathBuf::from))
            .collect();

        Ok(Self {
            census,
            google,
            google_api_key,
            acs,
            census_api_key,
            ffiec_candidates,
        })
    }
}

fn find<'a>(
    services: &'a [ServiceConfig],
    id: &'static str,
) -> Result<&'a ServiceConfig, ConfigError> {
    services
        .iter()
        .find(|s| s.id == id)
        .ok_or(ConfigError::MissingService(id))
}

fn unexpected(service: &ServiceConfig) -> ConfigError {
    ConfigError::UnexpectedProvider {
        id: service.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn reads_credentials_and_override_path() {
        let settings = Settings::from_services(
            &all_services(),
            env_from(&[
                ("GOOGLE_MAPS_API_KEY", "g-key"),
                ("CENSUS_API_KEY", "c-key"),
                ("FFIEC_TRACT_LIST_PATH", "/srv/ffiec.xlsx"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.google_api_key.as_deref(), Some("g-key"));
        assert_eq!(settings.census_api_key.as_deref(), Some("c-key"));
        assert_eq!(settings.ffiec_candidates[0], PathBuf::from("/srv/ffiec.xlsx"));
        assert_eq!(settings.ffiec_candidates.len(), DEFAULT_CANDIDATES.len() + 1);
        assert_eq!(settings.census.benchmark, "2020");
        assert_eq!(settings.acs.data_source.year, "2022");
    }

    #[test]
    fn blank_variables_are_unset() {
        let settings = Settings::from_services(
            &all_services(),
            env_from(&[("GOOGLE_MAPS_API_KEY", "  "), ("FFIEC_TRACT_LIST_PATH", "")]),
        )
        .unwrap();

        assert_eq!(settings.google_api_key, None);
        assert_eq!(settings.census_api_key, None);
        assert_eq!(settings.ffiec_candidates.len(), DEFAULT_CANDIDATES.len());
    }

    #[test]
    fn client_configs_follow_the_registry() {
        let settings = Settings::from_services(&all_services(), env_from(&[])).unwrap();

        for (id, base_url, timeout, rate_limit_ms) in [
            (
                "census_geocoder",
                &settings.census.base_url,
                settings.census.timeout,
                settings.census.rate_limit_ms,
            ),
            (
                "google_maps",
                &settings.google.base_url,
                settings.google.timeout,
                settings.google.rate_limit_ms,
            ),
            (
                "census_acs",
                &settings.acs.base_url,
                settings.acs.timeout,
                settings.acs.rate_limit_ms,
            ),
        ] {
            let svc = crate::service_registry::service(id).unwrap();
            assert_eq!(base_url, svc.base_url(), "{id} base_url");
            assert_eq!(timeout, svc.timeout(), "{id} timeout");
            assert_eq!(rate_limit_ms, svc.rate_limit_ms, "{id} rate_limit_ms");
        }
        assert_eq!(settings.acs.data_source.last_updated, "2023-12-14");
    }

    #[test]
    fn missing_service_is_an_error() {
        let services: Vec<ServiceConfig> = all_services()
            .into_iter()
            .filter(|s| s.id != "census_acs")
            .collect();
        assert!(matches!(
            Settings::from_services(&services, env_from(&[])),
            Err(ConfigError::MissingService("census_acs"))
        ));
    }

    #[test]
    fn mismatched_provider_is_an_error() {
        let mut services = all_services();
        let google = services.iter().find(|s| s.id == "google_maps").unwrap().clone();
        for svc in &mut services {
            if svc.id == "census_geocoder" {
                svc.provider = google.provider.clone();
            }
        }
        assert!(matches!(
            Settings::from_services(&services, env_from(&[])),
            Err(ConfigError::UnexpectedProvider { ref id }) if id == "census_geocoder"
        ));
    }
}

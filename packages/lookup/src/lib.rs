#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address to census tract income lookup.
//!
//! [`TractLookup`] runs the whole pipeline for one address:
//!
//! 1. geocode through the fallback chain (Census, then Google, then a
//!    Census retry or reverse geocode),
//! 2. fetch ACS statistics for the resolved tract,
//! 3. classify the tract against the FFIEC reference table.
//!
//! Each stage only adds to the result; a later failure is recorded as an
//! annotation and never discards what earlier stages found.

pub mod batch;
pub mod config;
pub mod service_registry;

use std::sync::Arc;

use tract_income_address::parse;
use tract_income_cache::ResolutionCache;
use tract_income_demographics::DemographicsFetcher;
use tract_income_demographics::acs::AcsClient;
use tract_income_ffiec::{FfiecClassifier, TractIncomeTable};
use tract_income_geocoder::census::CensusGeocoder;
use tract_income_geocoder::google::GoogleGeocoder;
use tract_income_geocoder::resolver::{GeocodeOutcome, Resolver};
use tract_income_geocoder::{PrimaryGeocoder, SecondaryGeocoder};
use tract_income_lookup_models::{
    AddressInput, ErrorKind, FfiecClassification, LookupFailure, LookupRecord, LookupResult,
};

pub use config::{ConfigError, Settings};

/// Title of every invalid-input failure.
pub const INVALID_FORMAT: &str = "Invalid address format";

/// The full lookup pipeline over shared providers, cache and reference
/// table.
#[derive(Debug, Clone)]
pub struct TractLookup {
    resolver: Resolver,
    demographics: DemographicsFetcher,
    ffiec: FfiecClassifier,
    cache: Arc<ResolutionCache>,
}

impl TractLookup {
    /// Assembles a pipeline from already-built stages. All stages should
    /// share `cache`.
    #[must_use]
    pub const fn new(
        resolver: Resolver,
        demographics: DemographicsFetcher,
        ffiec: FfiecClassifier,
        cache: Arc<ResolutionCache>,
    ) -> Self {
        Self {
            resolver,
            demographics,
            ffiec,
            cache,
        }
    }

    /// Builds the production pipeline from settings.
    ///
    /// The Google geocoder is only wired in when an API key is present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an HTTP client cannot be built.
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let cache = Arc::new(ResolutionCache::new());

        let primary: Arc<dyn PrimaryGeocoder> = Arc::new(CensusGeocoder::new(settings.census)?);
        let secondary = match settings.google_api_key {
            Some(key) => {
                let google: Arc<dyn SecondaryGeocoder> =
                    Arc::new(GoogleGeocoder::new(settings.google, key)?);
                Some(google)
            }
            None => {
                log::info!("GOOGLE_MAPS_API_KEY not set; Google fallback disabled");
                None
            }
        };
        let resolver = Resolver::new(primary, secondary, Arc::clone(&cache));

        let data_source = settings.acs.data_source.clone();
        let acs = AcsClient::new(settings.acs, settings.census_api_key)?;
        let demographics = DemographicsFetcher::new(Arc::new(acs), Arc::clone(&cache), data_source);

        let table = Arc::new(TractIncomeTable::new(settings.ffiec_candidates));
        let ffiec = FfiecClassifier::new(table, Arc::clone(&cache));

        Ok(Self::new(resolver, demographics, ffiec, cache))
    }

    /// Builds the production pipeline from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if configuration is invalid or an HTTP
    /// client cannot be built.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_settings(Settings::from_env()?)
    }

    /// The cache shared by every stage.
    #[must_use]
    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Looks up one structured address.
    ///
    /// With `use_fuzzy` off only the literal address is sent to the
    /// Census geocoder.
    pub async fn lookup(&self, input: &AddressInput, use_fuzzy: bool) -> LookupResult {
        if let Some(field) = input.missing_field() {
            return LookupResult::Failed(LookupFailure::new(
                ErrorKind::InvalidInput,
                INVALID_FORMAT,
                format!("{field} is required"),
            ));
        }

        log::info!(
            "Looking up {}, {}, {}",
            input.street,
            input.city,
            input.state
        );

        let geo = match self.resolver.resolve(input, use_fuzzy).await {
            GeocodeOutcome::Matched(geo) => geo,
            GeocodeOutcome::Partial { secondary, error } => {
                return LookupResult::Found(Box::new(LookupRecord {
                    address: secondary.to_resolved(),
                    geography: None,
                    secondary_enhanced: true,
                    secondary: Some(secondary),
                    demographics: None,
                    ffiec: None,
                    error: Some(error),
                }));
            }
            GeocodeOutcome::NotFound(failure) => return LookupResult::Failed(failure),
        };

        let mut record = LookupRecord::from_geo(geo);
        let Some(geography) = record.geography.clone() else {
            return LookupResult::Found(Box::new(record));
        };

        match self.demographics.fetch_geography(&geography).await {
            Ok(demographics) => record.demographics = Some(demographics),
            Err(e) => {
                log::warn!("Demographics unavailable for {}: {e}", geography.tract_id);
                record.error = Some(e.to_lookup_error());
                return LookupResult::Found(Box::new(record));
            }
        }

        record.ffiec = Some(self.classify_ffiec(&geography.tract_id).await);
        LookupResult::Found(Box::new(record))
    }

    /// Parses a one-line address and looks it up.
    ///
    /// Returns an [`ErrorKind::InvalidInput`] failure without calling any
    /// provider when street, city or state cannot be recovered.
    pub async fn lookup_full_address(&self, full_address: &str, use_fuzzy: bool) -> LookupResult {
        let parsed = parse(full_address);
        let (Some(street), Some(city), Some(state)) = (&parsed.street, &parsed.city, &parsed.state)
        else {
            return LookupResult::Failed(LookupFailure::new(
                ErrorKind::InvalidInput,
                INVALID_FORMAT,
                format!("Could not determine street, city and state from '{full_address}'"),
            ));
        };

        let input = AddressInput::new(street, city, state, parsed.zip.as_deref());
        self.lookup(&input, use_fuzzy).await
    }

    /// FFIEC classification that never fails: unexpected errors become an
    /// explanatory, unavailable classification.
    async fn classify_ffiec(&self, tract_id: &str) -> FfiecClassification {
        let classifier = self.ffiec.clone();
        let id = tract_id.to_string();
        let outcome = tokio::task::spawn_blocking(move || classifier.classify(&id)).await;

        let error = match outcome {
            Ok(Ok(classification)) => return classification,
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        log::warn!("FFIEC lookup failed for {tract_id}: {error}");
        FfiecClassification::unavailable(format!("Unexpected FFIEC processing error: {error}"))
    }
}

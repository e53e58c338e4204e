#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tract statistics from the American Community Survey.
//!
//! [`DemographicsFetcher`] asks a [`SurveyProvider`] for five ACS
//! variables for a single tract, turns the raw table into a
//! [`DemographicsRecord`] with derived metrics, and memoizes the record
//! in the resolution cache.

pub mod acs;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tract_income_cache::{ResolutionCache, demographics_key};
use tract_income_lookup_models::{
    CensusGeography, DataSource, DemographicsRecord, ErrorKind, IncomeLevel, LookupError,
};

/// Median household income.
pub const MEDIAN_HOUSEHOLD_INCOME: &str = "B19013_001E";
/// Total population.
pub const TOTAL_POPULATION: &str = "B01003_001E";
/// Total occupied housing units.
pub const TOTAL_HOUSING_UNITS: &str = "B25003_001E";
/// Owner-occupied housing units.
pub const OWNER_OCCUPIED_HOUSING: &str = "B25003_002E";
/// Workers commuting by public transportation.
pub const PUBLIC_TRANSPORTATION_COMMUTERS: &str = "B08301_010E";

/// Every variable requested for a tract, in request order.
pub const VARIABLES: &[&str] = &[
    MEDIAN_HOUSEHOLD_INCOME,
    TOTAL_POPULATION,
    TOTAL_HOUSING_UNITS,
    OWNER_OCCUPIED_HOUSING,
    PUBLIC_TRANSPORTATION_COMMUTERS,
];

/// Errors from fetching tract statistics.
#[derive(Debug, Error)]
pub enum DemographicsError {
    /// The survey has no row for the tract.
    #[error("No ACS data found for tract {tract}")]
    NoData {
        /// The tract code queried.
        tract: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The survey endpoint answered with an error status.
    #[error("Census API returned status {0}")]
    Status(u16),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

impl DemographicsError {
    /// The annotation attached to a lookup that failed at this stage.
    #[must_use]
    pub fn to_lookup_error(&self) -> LookupError {
        match self {
            Self::NoData { .. } => LookupError::new(
                ErrorKind::TractDataUnavailable,
                "No Census data available",
                self.to_string(),
            ),
            Self::Http(_) | Self::Status(_) | Self::Parse { .. } => LookupError::new(
                ErrorKind::ProviderUnavailable,
                "Census API error",
                self.to_string(),
            ),
        }
    }
}

/// A statistical survey that can be queried for a single tract.
#[async_trait]
pub trait SurveyProvider: Send + Sync {
    /// Returns the survey table for one tract: a header row of variable
    /// names followed by data rows. Missing cells are empty strings.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError`] on transport, status or parse failure.
    async fn query_tract(
        &self,
        state_fips: &str,
        county_fips: &str,
        tract_fips: &str,
        variables: &[&str],
    ) -> Result<Vec<Vec<String>>, DemographicsError>;
}

/// Classifies a median household income into an income band.
///
/// Each boundary belongs to the band above it. `None` (suppressed or
/// missing income) is [`IncomeLevel::DataNotAvailable`].
#[must_use]
pub const fn classify_income_level(income: Option<i64>) -> IncomeLevel {
    match income {
        None => IncomeLevel::DataNotAvailable,
        Some(i) if i < 30_000 => IncomeLevel::VeryLow,
        Some(i) if i < 50_000 => IncomeLevel::Low,
        Some(i) if i < 75_000 => IncomeLevel::Moderate,
        Some(i) if i < 100_000 => IncomeLevel::Middle,
        Some(i) if i < 150_000 => IncomeLevel::UpperMiddle,
        Some(_) => IncomeLevel::High,
    }
}

/// Owner-occupied units / total units rounded to 3 decimal places, or
/// `None` when there are no units.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn owner_occupied_rate(owner_occupied: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let rate = owner_occupied as f64 / total as f64;
    Some((rate * 1000.0).round() / 1000.0)
}

/// Parses an ACS median income cell.
///
/// ACS encodes suppressed or unavailable estimates as large negative
/// annotation values (`-666666666`, `-666666`, `-999999999`, ...); every
/// negative value becomes `None`.
fn parse_income(raw: &str) -> Result<Option<i64>, DemographicsError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = parse_number(MEDIAN_HOUSEHOLD_INCOME, raw)?;
    Ok((value >= 0).then_some(value))
}

/// Parses an ACS count cell. Missing and negative values count as zero.
fn parse_count(variable: &str, raw: &str) -> Result<u64, DemographicsError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    Ok(u64::try_from(parse_number(variable, raw)?).unwrap_or(0))
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn parse_number(variable: &str, raw: &str) -> Result<i64, DemographicsError> {
    raw.parse::<i64>()
        .or_else(|_| {
            raw.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
                .ok_or(())
        })
        .map_err(|()| DemographicsError::Parse {
            message: format!("{variable} value '{raw}' is not a number"),
        })
}

/// Builds a record from a survey table (header row + data row).
///
/// # Errors
///
/// Returns [`DemographicsError::NoData`] if the table has no data row,
/// or [`DemographicsError::Parse`] if a cell is not numeric.
pub fn record_from_rows(
    tract_fips: &str,
    rows: &[Vec<String>],
    data_source: DataSource,
) -> Result<DemographicsRecord, DemographicsError> {
    let (Some(header), Some(values)) = (rows.first(), rows.get(1)) else {
        return Err(DemographicsError::NoData {
            tract: tract_fips.to_string(),
        });
    };

    let cell = |variable: &str| {
        header
            .iter()
            .position(|h| h == variable)
            .and_then(|i| values.get(i))
            .map_or("", String::as_str)
    };

    let median_household_income = parse_income(cell(MEDIAN_HOUSEHOLD_INCOME))?;
    let total_housing_units = parse_count(TOTAL_HOUSING_UNITS, cell(TOTAL_HOUSING_UNITS))?;
    let owner_occupied_housing =
        parse_count(OWNER_OCCUPIED_HOUSING, cell(OWNER_OCCUPIED_HOUSING))?;

    Ok(DemographicsRecord {
        median_household_income,
        total_population: parse_count(TOTAL_POPULATION, cell(TOTAL_POPULATION))?,
        total_housing_units,
        owner_occupied_housing,
        public_transportation_commuters: parse_count(
            PUBLIC_TRANSPORTATION_COMMUTERS,
            cell(PUBLIC_TRANSPORTATION_COMMUTERS),
        )?,
        owner_occupied_rate: owner_occupied_rate(owner_occupied_housing, total_housing_units),
        income_level: classify_income_level(median_household_income),
        data_source,
    })
}

/// Fetches and caches tract statistics.
#[derive(Clone)]
pub struct DemographicsFetcher {
    provider: Arc<dyn SurveyProvider>,
    cache: Arc<ResolutionCache>,
    data_source: DataSource,
}

impl std::fmt::Debug for DemographicsFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemographicsFetcher")
            .field("data_source", &self.data_source)
            .finish_non_exhaustive()
    }
}

impl DemographicsFetcher {
    /// Creates a fetcher. `data_source` is stamped on every record.
    #[must_use]
    pub fn new(
        provider: Arc<dyn SurveyProvider>,
        cache: Arc<ResolutionCache>,
        data_source: DataSource,
    ) -> Self {
        Self {
            provider,
            cache,
            data_source,
        }
    }

    /// Statistics for the tract identified by its FIPS components.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::NoData`] when the survey has no row
    /// for the tract, or a transport/parse error from the provider.
    pub async fn fetch(
        &self,
        state_fips: &str,
        county_fips: &str,
        tract_fips: &str,
    ) -> Result<DemographicsRecord, DemographicsError> {
        let key = demographics_key(state_fips, county_fips, tract_fips);
        if let Some(cached) = self.cache.demographics(&key) {
            return Ok(cached);
        }

        log::info!("Fetching Census data for tract {tract_fips}");
        let rows = self
            .provider
            .query_tract(state_fips, county_fips, tract_fips, VARIABLES)
            .await?;
        let record = record_from_rows(tract_fips, &rows, self.data_source.clone())?;

        self.cache.insert_demographics(key, record.clone());
        Ok(record)
    }

    /// Statistics for a resolved geography.
    ///
    /// # Errors
    ///
    /// See [`DemographicsFetcher::fetch`].
    pub async fn fetch_geography(
        &self,
        geography: &CensusGeography,
    ) -> Result<DemographicsRecord, DemographicsError> {
        self.fetch(
            &geography.state_fips,
            &geography.county_fips,
            &geography.tract_fips,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn source() -> DataSource {
        DataSource {
            survey: "American Community Survey 5-Year Estimates".to_string(),
            year: "2022".to_string(),
            confidence: "High".to_string(),
            last_updated: "2023-12-14".to_string(),
        }
    }

    fn table(values: [&str; 5]) -> Vec<Vec<String>> {
        let mut header: Vec<String> = VARIABLES.iter().map(|v| (*v).to_string()).collect();
        header.extend(["state", "county", "tract"].map(String::from));
        let mut row: Vec<String> = values.iter().map(|v| (*v).to_string()).collect();
        row.extend(["36", "119", "006900"].map(String::from));
        vec![header, row]
    }

    struct StubSurvey {
        rows: Vec<Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SurveyProvider for StubSurvey {
        async fn query_tract(
            &self,
            _state_fips: &str,
            _county_fips: &str,
            _tract_fips: &str,
            variables: &[&str],
        ) -> Result<Vec<Vec<String>>, DemographicsError> {
            assert_eq!(variables, VARIABLES);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.clone())
        }
    }

    #[test]
    fn income_bands_include_lower_boundary() {
        assert_eq!(classify_income_level(Some(0)), IncomeLevel::VeryLow);
        assert_eq!(classify_income_level(Some(29_999)), IncomeLevel::VeryLow);
        assert_eq!(classify_income_level(Some(30_000)), IncomeLevel::Low);
        assert_eq!(classify_income_level(Some(50_000)), IncomeLevel::Moderate);
        assert_eq!(classify_income_level(Some(75_000)), IncomeLevel::Middle);
        assert_eq!(classify_income_level(Some(100_000)), IncomeLevel::UpperMiddle);
        assert_eq!(classify_income_level(Some(149_999)), IncomeLevel::UpperMiddle);
        assert_eq!(classify_income_level(Some(150_000)), IncomeLevel::High);
        assert_eq!(classify_income_level(None), IncomeLevel::DataNotAvailable);
    }

    #[test]
    fn income_bands_are_monotonic() {
        let mut previous = classify_income_level(Some(-1));
        for income in (0..400_000).step_by(500) {
            let level = classify_income_level(Some(income));
            assert!(level >= previous, "band decreased at {income}");
            previous = level;
        }
    }

    #[test]
    fn owner_rate_rounds_and_handles_zero() {
        assert_eq!(owner_occupied_rate(0, 0), None);
        assert_eq!(owner_occupied_rate(10, 0), None);
        assert_eq!(owner_occupied_rate(1, 3), Some(0.333));
        assert_eq!(owner_occupied_rate(2, 3), Some(0.667));
        assert_eq!(owner_occupied_rate(5, 5), Some(1.0));
    }

    #[test]
    fn sentinels_become_null() {
        for sentinel in ["-666666666", "-666666", "-999999999", "-222222222"] {
            let record =
                record_from_rows("006900", &table([sentinel, "4000", "0", "0", "12"]), source())
                    .unwrap();
            assert_eq!(record.median_household_income, None, "{sentinel}");
            assert_eq!(record.income_level, IncomeLevel::DataNotAvailable);
            assert_eq!(record.owner_occupied_rate, None);
        }
    }

    #[test]
    fn builds_record_with_derived_metrics() {
        let record = record_from_rows(
            "006900",
            &table(["61250", "4012", "1500", "600", "-5"]),
            source(),
        )
        .unwrap();
        assert_eq!(record.median_household_income, Some(61_250));
        assert_eq!(record.total_population, 4012);
        assert_eq!(record.public_transportation_commuters, 0);
        assert_eq!(record.owner_occupied_rate, Some(0.4));
        assert_eq!(record.income_level, IncomeLevel::Moderate);
        assert_eq!(record.data_source.year, "2022");
    }

    #[test]
    fn header_only_is_no_data() {
        let rows = vec![VARIABLES.iter().map(|v| (*v).to_string()).collect()];
        let err = record_from_rows("006900", &rows, source()).unwrap_err();
        assert!(matches!(err, DemographicsError::NoData { ref tract } if tract == "006900"));
        assert_eq!(err.to_lookup_error().kind, ErrorKind::TractDataUnavailable);
        assert!(record_from_rows("006900", &[], source()).is_err());
    }

    #[test]
    fn non_numeric_cell_is_parse_error() {
        let err = record_from_rows("006900", &table(["61250", "many", "1", "1", "1"]), source())
            .unwrap_err();
        assert!(matches!(err, DemographicsError::Parse { .. }));
        assert_eq!(err.to_lookup_error().kind, ErrorKind::ProviderUnavailable);
    }

    #[tokio::test]
    async fn fetch_is_cached_by_fips() {
        let survey = Arc::new(StubSurvey {
            rows: table(["61250", "4012", "1500", "600", "120"]),
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(ResolutionCache::new());
        let fetcher = DemographicsFetcher::new(
            Arc::clone(&survey) as Arc<dyn SurveyProvider>,
            Arc::clone(&cache),
            source(),
        );

        let first = fetcher.fetch("36", "119", "006900").await.unwrap();
        let second = fetcher.fetch("36", "119", "006900").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(survey.calls.load(Ordering::SeqCst), 1);
        assert!(cache.demographics("36119006900").is_some());
    }

    #[tokio::test]
    async fn no_data_is_not_cached() {
        let survey = Arc::new(StubSurvey {
            rows: Vec::new(),
            calls: AtomicUsize::new(0),
        });
        let fetcher = DemographicsFetcher::new(
            Arc::clone(&survey) as Arc<dyn SurveyProvider>,
            Arc::new(ResolutionCache::new()),
            source(),
        );

        assert!(fetcher.fetch("36", "119", "006900").await.is_err());
        assert!(fetcher.fetch("36", "119", "006900").await.is_err());
        assert_eq!(survey.calls.load(Ordering::SeqCst), 2);
    }
}

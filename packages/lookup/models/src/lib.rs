#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Value types shared by the tract income lookup pipeline.
//!
//! Everything here is an immutable value once built. A lookup produces a
//! [`LookupResult`]: either a [`LookupRecord`] whose optional sections
//! (geography, demographics, FFIEC classification) are filled as far as
//! the pipeline got, or a terminal [`LookupFailure`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use tract_income_geography_models::CensusGeography;

/// Remediation hints attached to every "address not found" failure.
pub const NOT_FOUND_SUGGESTIONS: &[&str] = &[
    "Check address spelling",
    "Try without apartment/unit numbers",
    "Use ZIP code for better accuracy",
    "Consider using Google Maps API key for better matching",
];

/// A structured address as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    /// Street line (e.g., "25 Drake Ave").
    pub street: String,
    /// City name.
    pub city: String,
    /// State name or two-letter abbreviation.
    pub state: String,
    /// ZIP code, if available. Advisory only.
    pub zip: Option<String>,
}

impl AddressInput {
    /// Creates an input, dropping a blank ZIP.
    #[must_use]
    pub fn new(street: &str, city: &str, state: &str, zip: Option<&str>) -> Self {
        Self {
            street: street.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            zip: zip
                .map(str::trim)
                .filter(|z| !z.is_empty())
                .map(String::from),
        }
    }

    /// Name of the first required field that is blank, if any.
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    /// Cache key for geocoding results: the tuple joined with `", "`,
    /// lower-cased and trimmed.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}, {}, {}, {}",
            self.street,
            self.city,
            self.state,
            self.zip.as_deref().unwrap_or("")
        )
        .to_lowercase()
        .trim()
        .to_string()
    }
}

/// WGS84 coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

/// An address as resolved by a geocoding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    /// The query string that produced the match.
    pub input: String,
    /// The provider's standardized form of the address.
    pub standardized: String,
    /// Location of the match.
    pub coordinates: Coordinates,
}

/// A geocoded address together with its census tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoMatch {
    /// The resolved address.
    pub address: ResolvedAddress,
    /// The tract containing the address.
    pub geography: CensusGeography,
    /// Whether the secondary provider was needed to find the tract.
    pub secondary_enhanced: bool,
}

/// A secondary provider match: coordinates and a standardized address
/// but no tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryMatch {
    /// The query string sent to the provider.
    pub input: String,
    /// Provider-formatted address.
    pub standardized: String,
    /// Location of the match.
    pub coordinates: Coordinates,
    /// Provider place identifier.
    pub place_id: Option<String>,
    /// Address components keyed by component type (e.g. `"locality"`).
    pub components: BTreeMap<String, String>,
}

impl SecondaryMatch {
    /// The resolved-address view of this match.
    #[must_use]
    pub fn to_resolved(&self) -> ResolvedAddress {
        ResolvedAddress {
            input: self.input.clone(),
            standardized: self.standardized.clone(),
            coordinates: self.coordinates,
        }
    }
}

/// Income band derived from a tract's median household income.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum IncomeLevel {
    /// Below $30,000.
    #[serde(rename = "Very Low Income")]
    #[strum(serialize = "Very Low Income")]
    VeryLow,
    /// $30,000 to $49,999.
    #[serde(rename = "Low Income")]
    #[strum(serialize = "Low Income")]
    Low,
    /// $50,000 to $74,999.
    #[serde(rename = "Moderate Income")]
    #[strum(serialize = "Moderate Income")]
    Moderate,
    /// $75,000 to $99,999.
    #[serde(rename = "Middle Income")]
    #[strum(serialize = "Middle Income")]
    Middle,
    /// $100,000 to $149,999.
    #[serde(rename = "Upper Middle Income")]
    #[strum(serialize = "Upper Middle Income")]
    UpperMiddle,
    /// $150,000 and above.
    #[serde(rename = "High Income")]
    #[strum(serialize = "High Income")]
    High,
    /// The survey suppressed or omitted the median income.
    #[serde(rename = "Data Not Available")]
    #[strum(serialize = "Data Not Available")]
    DataNotAvailable,
}

/// Where a demographics record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Survey name.
    pub survey: String,
    /// Survey vintage year.
    pub year: String,
    /// Confidence label.
    pub confidence: String,
    /// Snapshot release date.
    pub last_updated: String,
}

/// Survey statistics for one tract plus derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicsRecord {
    /// Median household income; `None` when the survey suppressed it.
    pub median_household_income: Option<i64>,
    /// Total population.
    pub total_population: u64,
    /// Total occupied housing units.
    pub total_housing_units: u64,
    /// Owner-occupied housing units.
    pub owner_occupied_housing: u64,
    /// Workers commuting by public transportation.
    pub public_transportation_commuters: u64,
    /// Owner-occupied / total housing units, 3 decimals; `None` when
    /// there are no housing units.
    pub owner_occupied_rate: Option<f64>,
    /// Income band derived from the median income.
    pub income_level: IncomeLevel,
    /// Survey provenance.
    pub data_source: DataSource,
}

/// Official FFIEC income level for a tract, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FfiecClassification {
    /// Label from the reference file (e.g. `"Moderate"`).
    pub income_level: Option<String>,
    /// Reference file name the label came from.
    pub source: Option<String>,
    /// Why no label is available.
    pub error: Option<String>,
}

impl FfiecClassification {
    /// A classification found in the reference file.
    #[must_use]
    pub fn found(income_level: &str, source: &str) -> Self {
        Self {
            income_level: Some(income_level.to_string()),
            source: Some(source.to_string()),
            error: None,
        }
    }

    /// An absent classification with an explanation.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            income_level: None,
            source: None,
            error: Some(reason.into()),
        }
    }
}

/// Machine-readable failure categories.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Network, timeout or transport failure.
    ProviderUnavailable,
    /// The provider answered but had nothing usable.
    NoMatch,
    /// The address was geocoded but no tract statistics exist.
    TractDataUnavailable,
    /// The FFIEC reference table is missing or lacks the tract.
    ReferenceDataUnavailable,
    /// The address is blank or could not be split into components.
    InvalidInput,
    /// Every geocoding stage was exhausted.
    AddressNotFound,
}

/// A failure kind with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupError {
    /// Failure category.
    pub kind: ErrorKind,
    /// Short error title (e.g. "Census tract data not available").
    pub error: String,
    /// Longer explanation.
    pub message: String,
}

impl LookupError {
    /// Creates an error annotation.
    #[must_use]
    pub fn new(kind: ErrorKind, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            error: error.into(),
            message: message.into(),
        }
    }
}

/// A lookup that produced at least a location.
///
/// Sections are filled in pipeline order; `error` annotates the first
/// stage that failed after geocoding succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRecord {
    /// The resolved address.
    pub address: ResolvedAddress,
    /// The containing tract, when known.
    pub geography: Option<CensusGeography>,
    /// Whether the secondary provider was needed.
    pub secondary_enhanced: bool,
    /// The secondary provider's raw match, when it was consulted.
    pub secondary: Option<SecondaryMatch>,
    /// Tract statistics.
    pub demographics: Option<DemographicsRecord>,
    /// Official FFIEC classification.
    pub ffiec: Option<FfiecClassification>,
    /// Annotation for a stage that failed after geocoding.
    pub error: Option<LookupError>,
}

impl LookupRecord {
    /// A record for a fully geocoded address with nothing else yet.
    #[must_use]
    pub fn from_geo(geo: GeoMatch) -> Self {
        Self {
            address: geo.address,
            geography: Some(geo.geography),
            secondary_enhanced: geo.secondary_enhanced,
            secondary: None,
            demographics: None,
            ffiec: None,
            error: None,
        }
    }

    /// The FFIEC label, if one was found.
    #[must_use]
    pub fn ffiec_income_level(&self) -> Option<&str> {
        self.ffiec.as_ref().and_then(|f| f.income_level.as_deref())
    }
}

/// A lookup that produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupFailure {
    /// Failure category.
    pub kind: ErrorKind,
    /// Short error title.
    pub error: String,
    /// Longer explanation.
    pub message: String,
    /// Every query string tried, for [`ErrorKind::AddressNotFound`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tried_variations: Vec<String>,
    /// Remediation hints, for [`ErrorKind::AddressNotFound`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl LookupFailure {
    /// A failure with no variation list.
    #[must_use]
    pub fn new(kind: ErrorKind, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            error: error.into(),
            message: message.into(),
            tried_variations: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// The terminal "address not found" failure.
    #[must_use]
    pub fn address_not_found(tried_variations: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::AddressNotFound,
            error: "Address not found".to_string(),
            message: format!(
                "Could not find address after trying {} variations",
                tried_variations.len()
            ),
            tried_variations,
            suggestions: NOT_FOUND_SUGGESTIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

/// Outcome of a single address lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupResult {
    /// The address was located; see the record for how far enrichment got.
    Found(Box<LookupRecord>),
    /// The address could not be located.
    Failed(LookupFailure),
}

impl LookupResult {
    /// Whether the lookup completed with no error annotation.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Found(record) => record.error.is_none(),
            Self::Failed(_) => false,
        }
    }

    /// The record, if the address was located.
    #[must_use]
    pub fn record(&self) -> Option<&LookupRecord> {
        match self {
            Self::Found(record) => Some(&**record),
            Self::Failed(_) => None,
        }
    }

    /// The kind of the failure or annotation, if any.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Found(record) => record.error.as_ref().map(|e| e.kind),
            Self::Failed(failure) => Some(failure.kind),
        }
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding for tract income lookups.
//!
//! Resolves a street address to coordinates and the census tract that
//! contains it, using two providers behind async traits:
//!
//! 1. **US Census Bureau Geocoder** ([`PrimaryGeocoder`]): free, no API
//!    key, returns coordinates plus census geographies for a one-line
//!    address, and tracts for a coordinate pair.
//! 2. **Google Maps Geocoding API** ([`SecondaryGeocoder`]): needs an
//!    API key, better at messy input, but knows nothing about tracts.
//!
//! The [`resolver`] drives the fallback chain between them.

pub mod census;
pub mod google;
pub mod resolver;

use async_trait::async_trait;
use thiserror::Error;
use tract_income_lookup_models::{CensusGeography, ResolvedAddress, SecondaryMatch};

/// A primary provider match: a located address and, when the provider
/// reported one, the tract containing it.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryMatch {
    /// The located address.
    pub address: ResolvedAddress,
    /// The containing tract. A match without one is not usable.
    pub geography: Option<CensusGeography>,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The provider answered with an error status.
    #[error("{provider} returned status {status}")]
    Status {
        /// Provider name.
        provider: &'static str,
        /// The status reported (HTTP code or API status string).
        status: String,
    },
}

impl GeocodeError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

/// A geocoder that can place an address inside a census tract.
#[async_trait]
pub trait PrimaryGeocoder: Send + Sync {
    /// Geocodes a one-line address.
    ///
    /// Returns `Ok(None)` when the provider has no match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport, status or parse failure.
    async fn geocode(&self, address: &str) -> Result<Option<PrimaryMatch>, GeocodeError>;

    /// Finds the tract containing a point.
    ///
    /// Returns `Ok(None)` when the point is not inside any known tract.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport, status or parse failure.
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<CensusGeography>, GeocodeError>;
}

/// A geocoder that standardizes addresses and locates them but does not
/// know about tracts.
#[async_trait]
pub trait SecondaryGeocoder: Send + Sync {
    /// Geocodes a one-line address.
    ///
    /// Returns `Ok(None)` when the provider has no match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport, status or parse failure.
    async fn geocode(&self, address: &str) -> Result<Option<SecondaryMatch>, GeocodeError>;
}

/// Builds the shared HTTP client for a provider.
///
/// # Errors
///
/// Returns [`GeocodeError::Http`] if the client cannot be constructed.
pub fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, GeocodeError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

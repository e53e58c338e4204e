//! US Census Bureau Geocoder client.
//!
//! Uses the `geographies` endpoints, which return census geographies
//! alongside the match so a single request yields both coordinates and
//! the containing tract. No API key required.
//!
//! - Address: `GET /geographies/onelineaddress`
//! - Point: `GET /geographies/coordinates`
//!
//! See <https://geocoding.geo.census.gov/geocoder/Geocoding_Services_API.html>

use std::time::Duration;

use async_trait::async_trait;
use tract_income_lookup_models::{CensusGeography, Coordinates, ResolvedAddress};
use tract_income_throttle::Throttle;

use crate::{GeocodeError, PrimaryGeocoder, PrimaryMatch};

/// Key of the tract layer inside a `geographies` object.
const TRACT_LAYER: &str = "Census Tracts";

/// Connection settings for the Census geocoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusConfig {
    /// API base URL (e.g., `"https://geocoding.geo.census.gov/geocoder"`).
    pub base_url: String,
    /// Address range benchmark (e.g., `"2020"`).
    pub benchmark: String,
    /// Geography vintage (e.g., `"2020"`).
    pub vintage: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum delay between requests in milliseconds.
    pub rate_limit_ms: u64,
}

/// Census Bureau geocoder.
#[derive(Debug)]
pub struct CensusGeocoder {
    client: reqwest::Client,
    config: CensusConfig,
    throttle: Throttle,
}

impl CensusGeocoder {
    /// Creates a client for the given settings.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(config: CensusConfig) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: crate::http_client(config.timeout)?,
            throttle: Throttle::from_millis(config.rate_limit_ms),
            config,
        })
    }

    async fn get(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, GeocodeError> {
        self.throttle.wait().await;

        let url = format!("{}/geographies/{endpoint}", self.config.base_url);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .query(&[
                ("benchmark", self.config.benchmark.as_str()),
                ("vintage", self.config.vintage.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !resp.status().is_success() {
            return Err(GeocodeError::Status {
                provider: "Census geocoder",
                status: resp.status().as_u16().to_string(),
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PrimaryGeocoder for CensusGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<PrimaryMatch>, GeocodeError> {
        log::debug!("Census geocode: {address}");
        let body = self.get("onelineaddress", &[("address", address)]).await?;
        parse_address_response(address, &body)
    }

    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<CensusGeography>, GeocodeError> {
        log::debug!("Census reverse geocode: {latitude}, {longitude}");
        let x = longitude.to_string();
        let y = latitude.to_string();
        let body = self
            .get("coordinates", &[("x", x.as_str()), ("y", y.as_str())])
            .await?;
        parse_coordinates_response(&body)
    }
}

/// Parses the response from the one-line address endpoint.
///
/// `coordinates.x` is longitude and `coordinates.y` is latitude.
fn parse_address_response(
    input: &str,
    body: &serde_json::Value,
) -> Result<Option<PrimaryMatch>, GeocodeError> {
    let matches = body["result"]["addressMatches"]
        .as_array()
        .ok_or_else(|| GeocodeError::parse("Missing addressMatches array"))?;

    let Some(first) = matches.first() else {
        return Ok(None);
    };

    let x = first["coordinates"]["x"]
        .as_f64()
        .ok_or_else(|| GeocodeError::parse("Missing x coordinate"))?;
    let y = first["coordinates"]["y"]
        .as_f64()
        .ok_or_else(|| GeocodeError::parse("Missing y coordinate"))?;

    let standardized = first["matchedAddress"]
        .as_str()
        .map_or_else(|| input.to_string(), String::from);

    Ok(Some(PrimaryMatch {
        address: ResolvedAddress {
            input: input.to_string(),
            standardized,
            coordinates: Coordinates {
                latitude: y,
                longitude: x,
            },
        },
        geography: parse_tract(&first["geographies"])?,
    }))
}

/// Parses the response from the coordinates endpoint.
///
/// The tract layer normally sits at `result.geographies`; some
/// benchmarks nest it under the first address match instead.
fn parse_coordinates_response(
    body: &serde_json::Value,
) -> Result<Option<CensusGeography>, GeocodeError> {
    let result = &body["result"];
    if !result.is_object() {
        return Err(GeocodeError::parse("Missing result object"));
    }

    if let Some(geography) = parse_tract(&result["geographies"])? {
        return Ok(Some(geography));
    }
    parse_tract(&result["addressMatches"][0]["geographies"])
}

/// Extracts the first tract from a `geographies` object.
fn parse_tract(geographies: &serde_json::Value) -> Result<Option<CensusGeography>, GeocodeError> {
    let Some(tract) = geographies[TRACT_LAYER]
        .as_array()
        .and_then(|tracts| tracts.first())
    else {
        return Ok(None);
    };

    let component = |key: &str| {
        field_text(&tract[key])
            .ok_or_else(|| GeocodeError::parse(format!("Missing {key} in tract")))
    };
    let state = component("STATE")?;
    let county = component("COUNTY")?;
    let tract_code = component("TRACT")?;
    let block_group = field_text(&tract["BLKGRP"]);

    CensusGeography::new(&state, &county, &tract_code, block_group.as_deref())
        .map(Some)
        .map_err(|e| GeocodeError::parse(e.to_string()))
}

/// A string or numeric JSON field as text.
fn field_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

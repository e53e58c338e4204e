#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census tract geography types.
//!
//! A tract is identified by an 11-character GEOID built from the state
//! FIPS code (2 digits), county FIPS code (3 digits) and tract code
//! (6 digits). [`CensusGeography`] guarantees that shape at
//! construction time so downstream lookups can key on
//! [`CensusGeography::tract_id`] without re-validating it.

pub mod fips;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of the state FIPS component.
pub const STATE_FIPS_LEN: usize = 2;
/// Width of the county FIPS component.
pub const COUNTY_FIPS_LEN: usize = 3;
/// Width of the tract code component.
pub const TRACT_FIPS_LEN: usize = 6;
/// Width of a full tract GEOID.
pub const TRACT_ID_LEN: usize = STATE_FIPS_LEN + COUNTY_FIPS_LEN + TRACT_FIPS_LEN;

/// Errors from building geography values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeographyError {
    /// A FIPS component contained something other than ASCII digits.
    #[error("{component} FIPS code '{value}' is not numeric")]
    NotNumeric {
        /// Which component was rejected (`state`, `county`, `tract`).
        component: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A FIPS component was longer than its fixed width.
    #[error("{component} FIPS code '{value}' is longer than {width} digits")]
    TooLong {
        /// Which component was rejected.
        component: &'static str,
        /// The rejected value.
        value: String,
        /// The fixed width for the component.
        width: usize,
    },
}

/// The census geography a point or address resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusGeography {
    /// Two-digit state FIPS code.
    pub state_fips: String,
    /// Three-digit county FIPS code.
    pub county_fips: String,
    /// Six-digit tract code.
    pub tract_fips: String,
    /// State + county + tract, always [`TRACT_ID_LEN`] characters.
    pub tract_id: String,
    /// Block group, when the provider reported one.
    pub block_group: Option<String>,
}

impl CensusGeography {
    /// Builds a geography from its three FIPS components.
    ///
    /// Short numeric components are zero-padded to their fixed width.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if a component is empty, non-numeric,
    /// or wider than its fixed width.
    pub fn new(
        state_fips: &str,
        county_fips: &str,
        tract_fips: &str,
        block_group: Option<&str>,
    ) -> Result<Self, GeographyError> {
        let state_fips = pad_component("state", state_fips, STATE_FIPS_LEN)?;
        let county_fips = pad_component("county", county_fips, COUNTY_FIPS_LEN)?;
        let tract_fips = pad_component("tract", tract_fips, TRACT_FIPS_LEN)?;
        let tract_id = format!("{state_fips}{county_fips}{tract_fips}");

        let block_group = block_group
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from);

        Ok(Self {
            state_fips,
            county_fips,
            tract_fips,
            tract_id,
            block_group,
        })
    }

    /// Two-letter abbreviation of the geography's state, `"??"` if unknown.
    #[must_use]
    pub fn state_abbr(&self) -> &'static str {
        fips::state_abbr(&self.state_fips)
    }
}

fn pad_component(
    component: &'static str,
    value: &str,
    width: usize,
) -> Result<String, GeographyError> {
    let value = value.trim();

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GeographyError::NotNumeric {
            component,
            value: value.to_string(),
        });
    }

    if value.len() > width {
        return Err(GeographyError::TooLong {
            component,
            value: value.to_string(),
            width,
        });
    }

    Ok(format!("{value:0>width$}"))
}

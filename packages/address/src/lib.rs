#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address string handling for tract lookups.
//!
//! - [`normalize`]: abbreviation expansion and the ordered set of fuzzy
//!   variations tried against the geocoders.
//! - [`parse`]: best-effort split of a single combined address string
//!   into street, city, state and ZIP.
//!
//! Nothing in this crate touches the network.

pub mod normalize;
pub mod parse;

pub use normalize::{generate_variations, literal_variation, normalize};
pub use parse::{ParsedAddress, parse};

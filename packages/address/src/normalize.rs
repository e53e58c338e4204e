//! Abbreviation expansion and fuzzy address variations.
//!
//! Geocoders disagree on how they want street addresses spelled, so a
//! lookup tries a handful of rewrites of the same input:
//!
//! 1. The literal input: `"25 Main St., Apt 4, New Rochelle, NY 10805"`
//! 2. Normalized: `"25 main street, apt 4, New Rochelle, NY 10805"`
//! 3. Without the unit: `"25 Main St., New Rochelle, NY 10805"`
//! 4. Without punctuation: `"25 Main St Apt 4, New Rochelle, NY 10805"`
//!
//! The literal input is always first.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Abbreviation → expanded word. Keys are lower-case without the
/// trailing period; the matcher accepts an optional period.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("st", "street"),
    ("str", "street"),
    ("ave", "avenue"),
    ("av", "avenue"),
    ("blvd", "boulevard"),
    ("blv", "boulevard"),
    ("rd", "road"),
    ("dr", "drive"),
    ("ln", "lane"),
    ("ct", "court"),
    ("pl", "place"),
    ("cir", "circle"),
    ("n", "north"),
    ("s", "south"),
    ("e", "east"),
    ("w", "west"),
    ("ne", "northeast"),
    ("nw", "northwest"),
    ("se", "southeast"),
    ("sw", "southwest"),
];

static EXPANSIONS: LazyLock<BTreeMap<&'static str, &'static str>> =
    LazyLock::new(|| ABBREVIATIONS.iter().copied().collect());

/// Whole-word match of any abbreviation, optionally followed by a period.
static ABBREVIATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<&str> = ABBREVIATIONS.iter().map(|(abbr, _)| *abbr).collect();
    Regex::new(&format!(r"\b({})\b\.?", alternatives.join("|"))).expect("valid regex")
});

/// A unit designator and everything after it.
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:apt|apartment|unit|ste|suite)\b|#).*$").expect("valid regex")
});

static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Lower-cases a street and expands directional and street-type
/// abbreviations ("st" → "street", "n" → "north").
///
/// Only whole words are rewritten: "1st" and "stone" are left alone.
#[must_use]
pub fn normalize(street: &str) -> String {
    let lower = street.trim().to_lowercase();
    ABBREVIATION_RE
        .replace_all(&lower, |caps: &Captures<'_>| {
            EXPANSIONS
                .get(&caps[1])
                .map_or_else(|| caps[0].to_string(), |full| (*full).to_string())
        })
        .into_owned()
}

/// Formats one geocoder query string.
fn format_candidate(street: &str, city: &str, state: &str, zip: Option<&str>) -> String {
    let mut candidate = format!("{street}, {city}, {state}");
    if let Some(zip) = zip.map(str::trim).filter(|z| !z.is_empty()) {
        candidate.push(' ');
        candidate.push_str(zip);
    }
    candidate
}

/// The literal input as a single query string, with no rewriting.
#[must_use]
pub fn literal_variation(street: &str, city: &str, state: &str, zip: Option<&str>) -> String {
    format_candidate(street, city, state, zip)
}

/// Removes a trailing unit designator (`Apt 4`, `Suite 200`, `#3`).
fn strip_unit(street: &str) -> String {
    UNIT_RE
        .replace(street, "")
        .trim()
        .trim_end_matches(',')
        .trim()
        .to_string()
}

/// Removes punctuation and collapses runs of whitespace.
fn strip_punctuation(street: &str) -> String {
    let no_punct = PUNCTUATION_RE.replace_all(street, "");
    WHITESPACE_RE.replace_all(&no_punct, " ").trim().to_string()
}

/// Builds the ordered, de-duplicated list of query strings to try for
/// an address.
///
/// The literal input is always first; later entries are only kept when
/// they differ from every earlier one.
#[must_use]
pub fn generate_variations(
    street: &str,
    city: &str,
    state: &str,
    zip: Option<&str>,
) -> Vec<String> {
    let mut variations = vec![format_candidate(street, city, state, zip)];

    variations.push(format_candidate(&normalize(street), city, state, zip));

    let without_unit = strip_unit(street);
    if without_unit != street && !without_unit.is_empty() {
        variations.push(format_candidate(&without_unit, city, state, zip));
    }

    let without_punct = strip_punctuation(street);
    if without_punct != street && !without_punct.is_empty() {
        variations.push(format_candidate(&without_punct, city, state, zip));
    }

    let mut unique: Vec<String> = Vec::with_capacity(variations.len());
    for variation in variations {
        if !unique.contains(&variation) {
            unique.push(variation);
        }
    }
    unique
}

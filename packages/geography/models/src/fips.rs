//! US state FIPS code utilities.
//!
//! A single table of the 50 US states + DC carrying the two-digit FIPS
//! code, the USPS abbreviation and the official name. Lookups by any of
//! the three keys are case-insensitive.

/// One row of the state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsState {
    /// Two-digit FIPS code (e.g. `"36"`).
    pub fips: &'static str,
    /// Two-letter USPS abbreviation (e.g. `"NY"`).
    pub abbr: &'static str,
    /// Official name (e.g. `"New York"`).
    pub name: &'static str,
}

const fn state(fips: &'static str, abbr: &'static str, name: &'static str) -> UsState {
    UsState { fips, abbr, name }
}

/// The 50 US states + DC, ordered by FIPS code.
pub const STATES: &[UsState] = &[
    state("01", "AL", "Alabama"),
    state("02", "AK", "Alaska"),
    state("04", "AZ", "Arizona"),
    state("05", "AR", "Arkansas"),
    state("06", "CA", "California"),
    state("08", "CO", "Colorado"),
    state("09", "CT", "Connecticut"),
    state("10", "DE", "Delaware"),
    state("11", "DC", "District of Columbia"),
    state("12", "FL", "Florida"),
    state("13", "GA", "Georgia"),
    state("15", "HI", "Hawaii"),
    state("16", "ID", "Idaho"),
    state("17", "IL", "Illinois"),
    state("18", "IN", "Indiana"),
    state("19", "IA", "Iowa"),
    state("20", "KS", "Kansas"),
    state("21", "KY", "Kentucky"),
    state("22", "LA", "Louisiana"),
    state("23", "ME", "Maine"),
    state("24", "MD", "Maryland"),
    state("25", "MA", "Massachusetts"),
    state("26", "MI", "Michigan"),
    state("27", "MN", "Minnesota"),
    state("28", "MS", "Mississippi"),
    state("29", "MO", "Missouri"),
    state("30", "MT", "Montana"),
    state("31", "NE", "Nebraska"),
    state("32", "NV", "Nevada"),
    state("33", "NH", "New Hampshire"),
    state("34", "NJ", "New Jersey"),
    state("35", "NM", "New Mexico"),
    state("36", "NY", "New York"),
    state("37", "NC", "North Carolina"),
    state("38", "ND", "North Dakota"),
    state("39", "OH", "Ohio"),
    state("40", "OK", "Oklahoma"),
    state("41", "OR", "Oregon"),
    state("42", "PA", "Pennsylvania"),
    state("44", "RI", "Rhode Island"),
    state("45", "SC", "South Carolina"),
    state("46", "SD", "South Dakota"),
    state("47", "TN", "Tennessee"),
    state("48", "TX", "Texas"),
    state("49", "UT", "Utah"),
    state("50", "VT", "Vermont"),
    state("51", "VA", "Virginia"),
    state("53", "WA", "Washington"),
    state("54", "WV", "West Virginia"),
    state("55", "WI", "Wisconsin"),
    state("56", "WY", "Wyoming"),
];

/// Finds a state by its two-digit FIPS code.
#[must_use]
pub fn by_fips(fips: &str) -> Option<&'static UsState> {
    let fips = fips.trim();
    STATES.iter().find(|s| s.fips == fips)
}

/// Finds a state by its two-letter abbreviation (case-insensitive).
#[must_use]
pub fn by_abbr(abbr: &str) -> Option<&'static UsState> {
    let abbr = abbr.trim();
    STATES.iter().find(|s| s.abbr.eq_ignore_ascii_case(abbr))
}

/// Finds a state by its full name (case-insensitive, surrounding
/// whitespace ignored). Inner whitespace must be a single space.
#[must_use]
pub fn by_name(name: &str) -> Option<&'static UsState> {
    let name = name.trim();
    STATES.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

/// Maps a two-digit FIPS code to the corresponding two-letter state
/// abbreviation.
///
/// Returns `"??"` for unrecognized codes.
#[must_use]
pub fn state_abbr(fips: &str) -> &'static str {
    by_fips(fips).map_or("??", |s| s.abbr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_count() {
        assert_eq!(STATES.len(), 51);
    }

    #[test]
    fn abbr_roundtrip() {
        for s in STATES {
            assert_eq!(by_abbr(s.abbr), Some(s), "abbr lookup failed for {}", s.abbr);
            assert_eq!(by_fips(s.fips), Some(s), "fips lookup failed for {}", s.fips);
            assert_eq!(by_name(s.name), Some(s), "name lookup failed for {}", s.name);
        }
    }

    #[test]
    fn unknown_values() {
        assert_eq!(state_abbr("99"), "??");
        assert!(by_abbr("XX").is_none());
        assert!(by_name("Atlantis").is_none());
    }

    #[test]
    fn case_insensitive_lookups() {
        assert_eq!(by_abbr("ny").map(|s| s.fips), Some("36"));
        assert_eq!(by_name("new york").map(|s| s.abbr), Some("NY"));
        assert_eq!(by_name("DISTRICT OF COLUMBIA").map(|s| s.abbr), Some("DC"));
    }
}

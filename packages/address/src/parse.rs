//! Heuristic splitting of a one-line US address.
//!
//! Spreadsheets and form exports often carry the whole address in a
//! single cell: `"25 Drake Ave, New Rochelle, New York 10805"`. This
//! parser looks for a trailing ZIP, then for a state name or
//! abbreviation, and uses commas, street suffixes and capitalization
//! to guess where the street ends and the city begins.
//!
//! This is a best-effort heuristic, not a grammar. Inputs without commas
//! or capitalization cues can put part of a multi-word city into the
//! street (`"25 Drake Ave New Rochelle NY"` yields city `"Rochelle"`).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tract_income_geography_models::fips::{self, UsState};

/// Trailing country marker.
static COUNTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\s,]*\b(?:united\s+states|usa)\b\.?[\s,]*$").expect("valid regex")
});

/// Trailing 5-digit or ZIP+4 code.
static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{5}(?:-\d{4})?)\s*$").expect("valid regex"));

/// Tokens that end the street portion of an address.
const STREET_SUFFIXES: &[&str] = &[
    "ave", "avenue", "st", "street", "rd", "road", "dr", "drive", "blvd", "boulevard", "ln",
    "lane", "ct", "court", "pl", "place",
];

/// Words that usually start a two-word city name.
const CITY_PREFIXES: &[&str] = &["new", "north", "south", "east", "west", "st", "saint", "fort"];

/// The components recovered from a one-line address. Any component the
/// heuristics could not place is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAddress {
    /// Street line, e.g. `"25 Drake Ave"`.
    pub street: Option<String>,
    /// City, e.g. `"New Rochelle"`.
    pub city: Option<String>,
    /// State as written: official name for full names (`"New York"`),
    /// upper-case for abbreviations (`"NY"`).
    pub state: Option<String>,
    /// 5-digit or ZIP+4 code.
    pub zip: Option<String>,
}

impl ParsedAddress {
    /// Whether street, city and state were all recovered.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.street.is_some() && self.city.is_some() && self.state.is_some()
    }
}

/// How a state was written in the input.
enum StateMatch {
    Name(&'static UsState),
    Abbr(&'static UsState),
}

impl StateMatch {
    fn canonical(&self) -> String {
        match self {
            Self::Name(s) => s.name.to_string(),
            Self::Abbr(s) => s.abbr.to_string(),
        }
    }
}

fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| c == ',' || c == '.')
}

/// Matches one or two tokens against the state table.
fn match_state(tokens: &[&str]) -> Option<StateMatch> {
    let joined = tokens
        .iter()
        .map(|t| clean_token(t))
        .collect::<Vec<_>>()
        .join(" ");

    if let Some(state) = fips::by_name(&joined) {
        return Some(StateMatch::Name(state));
    }
    if tokens.len() == 1 && joined.len() == 2 {
        return fips::by_abbr(&joined).map(StateMatch::Abbr);
    }
    None
}

fn is_title_case(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_uppercase)
}

fn join(tokens: &[&str]) -> Option<String> {
    non_empty(&tokens.join(" "))
}

/// Trims whitespace and stray commas; empty becomes `None`.
fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_matches(',').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Splits a one-line address into street, city, state and ZIP.
///
/// See the module documentation for the heuristics and their limits.
#[must_use]
pub fn parse(full_address: &str) -> ParsedAddress {
    let trimmed = full_address.trim();
    if trimmed.is_empty() {
        return ParsedAddress::default();
    }

    let without_country = COUNTRY_RE.replace(trimmed, "");
    let mut addr = without_country.trim().to_string();

    let mut zip = None;
    let found_zip = ZIP_RE.captures(&addr).and_then(|caps| {
        let start = caps.get(0)?.start();
        Some((start, caps[1].to_string()))
    });
    if let Some((start, code)) = found_zip {
        zip = Some(code);
        addr = addr[..start]
            .trim_end_matches(|c: char| c == ',' || c.is_whitespace())
            .to_string();
    }

    let mut parsed = if addr.contains(',') {
        parse_with_comma(&addr)
    } else {
        parse_without_comma(&addr)
    };
    parsed.zip = zip;
    parsed
}

fn parse_with_comma(addr: &str) -> ParsedAddress {
    let (left, right) = addr.rsplit_once(',').unwrap_or((addr, ""));
    let mut left = left.trim().to_string();
    let right_tokens: Vec<&str> = right.split_whitespace().collect();

    let n = right_tokens.len();
    let (mut state, mut city) = if n >= 2
        && let Some(found) = match_state(&right_tokens[n - 2..])
    {
        (Some(found), join(&right_tokens[..n - 2]))
    } else if n >= 1
        && let Some(found) = match_state(&right_tokens[n - 1..])
    {
        (Some(found), join(&right_tokens[..n - 1]))
    } else {
        (None, join(&right_tokens))
    };

    let street;

    if state.is_some() {
        if city.is_none() {
            // "street, city, state": the city is still on the left.
            if let Some((street_part, city_part)) = left.rsplit_once(',') {
                city = non_empty(city_part);
                left = street_part.to_string();
            } else {
                let tokens: Vec<&str> = left.split_whitespace().collect();
                let n = tokens.len();
                if n >= 2 && is_title_case(tokens[n - 2]) && is_title_case(tokens[n - 1]) {
                    city = join(&tokens[n - 2..]);
                    left = tokens[..n - 2].join(" ");
                }
            }
        }
        street = non_empty(&left);
    } else {
        let tokens: Vec<&str> = left.split_whitespace().collect();
        let n = tokens.len();

        if let Some(found) = tokens.last().and_then(|t| match_state(std::slice::from_ref(t))) {
            state = Some(found);
            street = join(&tokens[..n - 1]);
        } else if tokens
            .first()
            .is_some_and(|t| t.chars().any(|c| c.is_ascii_digit()))
        {
            let suffix_idx = tokens.iter().rposition(|t| {
                STREET_SUFFIXES.contains(&clean_token(t).to_lowercase().as_str())
            });

            match suffix_idx {
                Some(idx) if idx < n - 1 => {
                    city = join(&tokens[idx + 1..]);
                    street = join(&tokens[..=idx]);
                }
                // The suffix closes the left segment: it is all street.
                Some(_) => street = non_empty(&left),
                None if n >= 2
                    && ((is_title_case(tokens[n - 2]) && is_title_case(tokens[n - 1]))
                        || CITY_PREFIXES.contains(&tokens[n - 2].to_lowercase().as_str())) =>
                {
                    city = join(&tokens[n - 2..]);
                    street = join(&tokens[..n - 2]);
                }
                None => {
                    city = join(&tokens[n - 1..]);
                    street = join(&tokens[..n - 1]);
                }
            }
        } else {
            street = non_empty(&left);
        }
    }

    let mut street = street;

    if city.is_none()
        && let Some(current) = street.clone()
    {
        let parts: Vec<&str> = current.split_whitespace().collect();
        if parts.len() >= 2 && parts[0].chars().any(|c| c.is_ascii_digit()) {
            city = join(&parts[parts.len() - 1..]);
            street = join(&parts[..parts.len() - 1]);
        }
    }

    ParsedAddress {
        street,
        city,
        state: state.map(|s| s.canonical()),
        zip: None,
    }
}

fn parse_without_comma(addr: &str) -> ParsedAddress {
    let tokens: Vec<&str> = addr.split_whitespace().collect();
    let n = tokens.len();

    for i in (0..n).rev() {
        if i >= 1
            && let Some(found) = match_state(&tokens[i - 1..=i])
        {
            let (street, city) = if i >= 2 {
                (join(&tokens[..i - 2]), join(&tokens[i - 2..i - 1]))
            } else {
                (None, None)
            };
            return ParsedAddress {
                street,
                city,
                state: Some(found.canonical()),
                zip: None,
            };
        }

        if let Some(found) = match_state(&tokens[i..=i]) {
            let (street, city) = if i >= 1 {
                (join(&tokens[..i - 1]), join(&tokens[i - 1..i]))
            } else {
                (None, None)
            };
            return ParsedAddress {
                street,
                city,
                state: Some(found.canonical()),
                zip: None,
            };
        }
    }

    ParsedAddress {
        street: join(&tokens[..n.saturating_sub(2)]),
        city: (n >= 2).then(|| tokens[n - 2].to_string()),
        state: None,
        zip: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(street: &str, city: &str, state: &str, zip: Option<&str>) -> ParsedAddress {
        ParsedAddress {
            street: Some(street.to_string()),
            city: Some(city.to_string()),
            state: Some(state.to_string()),
            zip: zip.map(String::from),
        }
    }

    #[test]
    fn parses_full_state_name_with_commas() {
        assert_eq!(
            parse("25 Drake Ave, New Rochelle, New York 10805"),
            parsed("25 Drake Ave", "New Rochelle", "New York", Some("10805"))
        );
    }

    #[test]
    fn parses_city_and_abbreviation_after_last_comma() {
        assert_eq!(
            parse("100 Main St, Springfield IL 62701"),
            parsed("100 Main St", "Springfield", "IL", Some("62701"))
        );
    }

    #[test]
    fn parses_three_segment_address_with_abbreviation() {
        assert_eq!(
            parse("1600 Pennsylvania Ave NW, Washington, DC 20500"),
            parsed("1600 Pennsylvania Ave NW", "Washington", "DC", Some("20500"))
        );
    }

    #[test]
    fn strips_country_marker_and_zip_plus_four() {
        assert_eq!(
            parse("100 Main St, Springfield IL 62701-1234, United States"),
            parsed("100 Main St", "Springfield", "IL", Some("62701-1234"))
        );
        assert_eq!(
            parse("100 Main St, Springfield IL 62701 USA"),
            parsed("100 Main St", "Springfield", "IL", Some("62701"))
        );
    }

    #[test]
    fn title_case_city_moves_from_left_segment() {
        assert_eq!(
            parse("25 Drake Ave New Rochelle, New York"),
            parsed("25 Drake Ave", "New Rochelle", "New York", None)
        );
    }

    #[test]
    fn street_suffix_marks_city_boundary_without_state() {
        let result = parse("25 Drake Ave New Rochelle, Nowhere 10805");
        assert_eq!(result.street.as_deref(), Some("25 Drake Ave"));
        assert_eq!(result.city.as_deref(), Some("New Rochelle"));
        assert_eq!(result.state, None);
        assert_eq!(result.zip.as_deref(), Some("10805"));
    }

    #[test]
    fn state_at_end_of_left_segment() {
        let result = parse("500 Elm Street Dallas TX, Suite 4");
        assert_eq!(result.state.as_deref(), Some("TX"));
        assert_eq!(result.street.as_deref(), Some("500 Elm Street Dallas"));
        assert_eq!(result.city.as_deref(), Some("Suite 4"));
    }

    #[test]
    fn parses_without_commas() {
        assert_eq!(
            parse("742 Evergreen Terrace Springfield Oregon 97403"),
            parsed("742 Evergreen Terrace", "Springfield", "Oregon", Some("97403"))
        );
    }

    #[test]
    fn two_word_state_without_commas_keeps_single_word_city() {
        // Documented limitation: only one token is taken for the city.
        assert_eq!(
            parse("25 Drake Ave New Rochelle New York 10805"),
            parsed("25 Drake Ave New", "Rochelle", "New York", Some("10805"))
        );
    }

    #[test]
    fn no_state_without_commas_falls_back_to_positions() {
        let result = parse("12 Somewhere Rd Smallville 12345");
        assert_eq!(result.street.as_deref(), Some("12 Somewhere"));
        assert_eq!(result.city.as_deref(), Some("Rd"));
        assert_eq!(result.state, None);
    }

    #[test]
    fn blank_input_is_all_none() {
        assert_eq!(parse("   "), ParsedAddress::default());
        assert!(!parse("").is_complete());
    }

    #[test]
    fn complete_when_street_city_state_present() {
        assert!(parse("25 Drake Ave, New Rochelle, NY").is_complete());
    }

    #[test]
    fn city_prefix_word_takes_two_tokens() {
        let result = parse("12 Elmwood fort lee, Nowhere");
        assert_eq!(result.street.as_deref(), Some("12 Elmwood"));
        assert_eq!(result.city.as_deref(), Some("fort lee"));
        assert_eq!(result.state, None);
    }

    #[test]
    fn two_title_case_tokens_become_city() {
        let result = parse("12 Elmwood Glen Cove, Nowhere");
        assert_eq!(result.street.as_deref(), Some("12 Elmwood"));
        assert_eq!(result.city.as_deref(), Some("Glen Cove"));
        assert_eq!(result.state, None);
    }

    #[test]
    fn single_trailing_token_becomes_city() {
        let result = parse("12 Elmwood smalltown, Nowhere");
        assert_eq!(result.street.as_deref(), Some("12 Elmwood"));
        assert_eq!(result.city.as_deref(), Some("smalltown"));
        assert_eq!(result.state, None);
    }
}

//! Google Maps Geocoding API client.
//!
//! Used only after every Census variation fails. Google is far more
//! forgiving of typos and odd formatting, and its standardized address
//! often matches at the Census geocoder where the raw input did not.
//! Requires an API key.
//!
//! See <https://developers.google.com/maps/documentation/geocoding/requests-geocoding>

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tract_income_lookup_models::{Coordinates, SecondaryMatch};
use tract_income_throttle::Throttle;

use crate::{GeocodeError, SecondaryGeocoder};

/// Connection settings for the Google geocoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleConfig {
    /// API endpoint (e.g., `"https://maps.googleapis.com/maps/api/geocode/json"`).
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum delay between requests in milliseconds.
    pub rate_limit_ms: u64,
}

/// Google Maps geocoder.
pub struct GoogleGeocoder {
    client: reqwest::Client,
    config: GoogleConfig,
    api_key: String,
    throttle: Throttle,
}

impl std::fmt::Debug for GoogleGeocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleGeocoder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GoogleGeocoder {
    /// Creates a client for the given settings and API key.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(config: GoogleConfig, api_key: impl Into<String>) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: crate::http_client(config.timeout)?,
            throttle: Throttle::from_millis(config.rate_limit_ms),
            api_key: api_key.into(),
            config,
        })
    }
}

#[async_trait]
impl SecondaryGeocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<SecondaryMatch>, GeocodeError> {
        self.throttle.wait().await;
        log::debug!("Google geocode: {address}");

        let resp = self
            .client
            .get(&self.config.base_url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !resp.status().is_success() {
            return Err(GeocodeError::Status {
                provider: "Google Maps",
                status: resp.status().as_u16().to_string(),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(address, &body)
    }
}

/// Parses a Geocoding API response.
///
/// `ZERO_RESULTS` is a miss, `OVER_QUERY_LIMIT` is a rate limit, and any
/// other non-`OK` status is an error.
fn parse_response(
    input: &str,
    body: &serde_json::Value,
) -> Result<Option<SecondaryMatch>, GeocodeError> {
    let status = body["status"].as_str().unwrap_or("Unknown");
    match status {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(None),
        "OVER_QUERY_LIMIT" => return Err(GeocodeError::RateLimited),
        other => {
            return Err(GeocodeError::Status {
                provider: "Google Maps",
                status: other.to_string(),
            });
        }
    }

    let Some(first) = body["results"].as_array().and_then(|r| r.first()) else {
        return Ok(None);
    };

    let location = &first["geometry"]["location"];
    let latitude = location["lat"]
        .as_f64()
        .ok_or_else(|| GeocodeError::parse("Missing lat in Google response"))?;
    let longitude = location["lng"]
        .as_f64()
        .ok_or_else(|| GeocodeError::parse("Missing lng in Google response"))?;

    let standardized = first["formatted_address"]
        .as_str()
        .ok_or_else(|| GeocodeError::parse("Missing formatted_address in Google response"))?
        .to_string();

    let mut components = BTreeMap::new();
    for component in first["address_components"].as_array().into_iter().flatten() {
        let Some(long_name) = component["long_name"].as_str() else {
            continue;
        };
        for kind in component["types"].as_array().into_iter().flatten() {
            if let Some(kind) = kind.as_str() {
                components.insert(kind.to_string(), long_name.to_string());
            }
        }
    }

    Ok(Some(SecondaryMatch {
        input: input.to_string(),
        standardized,
        coordinates: Coordinates {
            latitude,
            longitude,
        },
        place_id: first["place_id"].as_str().map(String::from),
        components,
    }))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn ok_body() -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "results": [{
                "formatted_address": "25 Drake Ave, New Rochelle, NY 10805, USA",
                "place_id": "ChIJ-test",
                "geometry": { "location": { "lat": 40.9119, "lng": -73.7821 } },
                "address_components": [
                    { "long_name": "25", "types": ["street_number"] },
                    { "long_name": "New Rochelle", "types": ["locality", "political"] },
                    { "long_name": "10805", "types": ["postal_code"] }
                ]
            }]
        })
    }

    #[test]
    fn parses_first_result() {
        let result = parse_response("25 Drake Av, New Rochele, NY", &ok_body())
            .unwrap()
            .unwrap();
        assert_eq!(result.input, "25 Drake Av, New Rochele, NY");
        assert_eq!(
            result.standardized,
            "25 Drake Ave, New Rochelle, NY 10805, USA"
        );
        assert!((result.coordinates.latitude - 40.9119).abs() < 1e-6);
        assert!((result.coordinates.longitude - -73.7821).abs() < 1e-6);
        assert_eq!(result.place_id.as_deref(), Some("ChIJ-test"));
        assert_eq!(result.components["locality"], "New Rochelle");
        assert_eq!(result.components["political"], "New Rochelle");
        assert_eq!(result.components["postal_code"], "10805");
    }

    #[test]
    fn zero_results_is_a_miss() {
        let body = serde_json::json!({ "status": "ZERO_RESULTS", "results": [] });
        assert!(parse_response("x", &body).unwrap().is_none());
    }

    #[test]
    fn denied_request_is_an_error() {
        let body = serde_json::json!({ "status": "REQUEST_DENIED", "results": [] });
        assert!(matches!(
            parse_response("x", &body),
            Err(GeocodeError::Status { ref status, .. }) if status == "REQUEST_DENIED"
        ));
        let body = serde_json::json!({ "status": "OVER_QUERY_LIMIT" });
        assert!(matches!(parse_response("x", &body), Err(GeocodeError::RateLimited)));
    }

    #[tokio::test]
    async fn sends_address_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("address", "25 Drake Av, New Rochele, NY"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;

        let geocoder = GoogleGeocoder::new(
            GoogleConfig {
                base_url: server.uri(),
                timeout: Duration::from_secs(5),
                rate_limit_ms: 0,
            },
            "test-key",
        )
        .unwrap();

        let result = geocoder
            .geocode("25 Drake Av, New Rochele, NY")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.components["street_number"], "25");
    }
}

//! Census Data API client for the ACS 5-year detailed tables.
//!
//! Queries a single tract:
//! `GET {base}?get=VARS&for=tract:T&in=state:S&in=county:C[&key=K]`.
//! The response is a JSON array of arrays whose first row is the header.
//!
//! See <https://www.census.gov/data/developers/data-sets/acs-5year.html>

use std::time::Duration;

use async_trait::async_trait;
use tract_income_lookup_models::DataSource;
use tract_income_throttle::Throttle;

use crate::{DemographicsError, SurveyProvider};

/// Connection settings for the ACS endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcsConfig {
    /// Dataset URL (e.g., `"https://api.census.gov/data/2022/acs/acs5"`).
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum delay between requests in milliseconds.
    pub rate_limit_ms: u64,
    /// Provenance stamped on every record from this dataset.
    pub data_source: DataSource,
}

/// ACS 5-year client.
pub struct AcsClient {
    client: reqwest::Client,
    config: AcsConfig,
    api_key: Option<String>,
    throttle: Throttle,
}

impl std::fmt::Debug for AcsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcsClient")
            .field("config", &self.config)
            .field("has_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl AcsClient {
    /// Creates a client. The API key is optional; keyless requests are
    /// subject to a lower daily quota.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::Http`] if the HTTP client cannot be built.
    pub fn new(config: AcsConfig, api_key: Option<String>) -> Result<Self, DemographicsError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(config.timeout).build()?,
            throttle: Throttle::from_millis(config.rate_limit_ms),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            config,
        })
    }

    /// Provenance of this dataset.
    #[must_use]
    pub const fn data_source(&self) -> &DataSource {
        &self.config.data_source
    }
}

#[async_trait]
impl SurveyProvider for AcsClient {
    async fn query_tract(
        &self,
        state_fips: &str,
        county_fips: &str,
        tract_fips: &str,
        variables: &[&str],
    ) -> Result<Vec<Vec<String>>, DemographicsError> {
        self.throttle.wait().await;

        let get = variables.join(",");
        let tract = format!("tract:{tract_fips}");
        let state = format!("state:{state_fips}");
        let county = format!("county:{county_fips}");

        let mut query = vec![
            ("get", get.as_str()),
            ("for", tract.as_str()),
            ("in", state.as_str()),
            ("in", county.as_str()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }

        let resp = self
            .client
            .get(&self.config.base_url)
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DemographicsError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        parse_table(&body)
    }
}

/// Parses an ACS response body.
///
/// The API answers an unknown tract with `204 No Content`, so an empty
/// body is an empty table. Null cells become empty strings.
fn parse_table(body: &str) -> Result<Vec<Vec<String>>, DemographicsError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<Vec<serde_json::Value>> =
        serde_json::from_str(body).map_err(|e| DemographicsError::Parse {
            message: format!("Failed to parse ACS response: {e}"),
        })?;

    Ok(rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    serde_json::Value::Null => String::new(),
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tract_income_cache::ResolutionCache;
    use tract_income_lookup_models::IncomeLevel;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::{DemographicsFetcher, VARIABLES};

    fn config(base_url: String) -> AcsConfig {
        AcsConfig {
            base_url,
            timeout: Duration::from_secs(5),
            rate_limit_ms: 0,
            data_source: DataSource {
                survey: "American Community Survey 5-Year Estimates".to_string(),
                year: "2022".to_string(),
                confidence: "High".to_string(),
                last_updated: "2023-12-14".to_string(),
            },
        }
    }

    #[test]
    fn parses_null_and_numeric_cells() {
        let rows = parse_table(
            r#"[["B19013_001E","B01003_001E","state"],[null,4012,"36"]]"#,
        )
        .unwrap();
        assert_eq!(rows[1], vec!["", "4012", "36"]);
    }

    #[test]
    fn empty_body_is_empty_table() {
        assert!(parse_table("").unwrap().is_empty());
        assert!(parse_table("  \n").unwrap().is_empty());
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(
            parse_table("error: unknown variable"),
            Err(DemographicsError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn fetches_tract_with_repeated_in_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("get", VARIABLES.join(",")))
            .and(query_param("for", "tract:006900"))
            .and(query_param("in", "state:36"))
            .and(query_param("in", "county:119"))
            .and(query_param("key", "census-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                ["B19013_001E", "B01003_001E", "B25003_001E", "B25003_002E", "B08301_010E",
                 "state", "county", "tract"],
                ["87500", "4012", "1500", "900", "210", "36", "119", "006900"]
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = AcsClient::new(config(server.uri()), Some("census-key".to_string())).unwrap();
        let source = client.data_source().clone();
        let fetcher = DemographicsFetcher::new(
            Arc::new(client),
            Arc::new(ResolutionCache::new()),
            source,
        );

        let record = fetcher.fetch("36", "119", "006900").await.unwrap();
        assert_eq!(record.median_household_income, Some(87_500));
        assert_eq!(record.income_level, IncomeLevel::Middle);
        assert_eq!(record.owner_occupied_rate, Some(0.6));
        assert_eq!(record.data_source.survey, "American Community Survey 5-Year Estimates");
    }

    #[tokio::test]
    async fn no_content_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = AcsClient::new(config(server.uri()), None).unwrap();
        let source = client.data_source().clone();
        let fetcher = DemographicsFetcher::new(
            Arc::new(client),
            Arc::new(ResolutionCache::new()),
            source,
        );

        let err = fetcher.fetch("36", "119", "999999").await.unwrap_err();
        assert!(matches!(err, DemographicsError::NoData { .. }));
    }

    #[tokio::test]
    async fn server_error_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = AcsClient::new(config(server.uri()), None).unwrap();
        let err = client
            .query_tract("36", "119", "006900", VARIABLES)
            .await
            .unwrap_err();
        assert!(matches!(err, DemographicsError::Status(500)));
        assert_eq!(err.to_lookup_error().error, "Census API error");
    }
}

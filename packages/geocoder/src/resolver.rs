//! Address → tract resolution with provider fallback.
//!
//! A lookup walks an explicit chain of stages, each returning the next:
//!
//! ```text
//! TryPrimaryVariants ──► TrySecondaryProvider ──► RetryPrimaryWithStandardized
//!        │ match                 │ no key / miss            │ match      │ no tract
//!        ▼                       ▼                          ▼            ▼
//!     Matched                Exhausted                   Matched   ReverseGeocodeBridge
//!                                                                    │ tract   │ none
//!                                                                    ▼         ▼
//!                                                                 Matched   Partial
//! ```
//!
//! Every [`GeocodeOutcome::Matched`] result is stored in the resolution
//! cache, and a cached key short-circuits the whole chain.

use std::sync::Arc;

use tract_income_address::{generate_variations, literal_variation};
use tract_income_cache::ResolutionCache;
use tract_income_lookup_models::{
    AddressInput, CensusGeography, ErrorKind, GeoMatch, LookupError, LookupFailure,
    ResolvedAddress, SecondaryMatch,
};

use crate::{PrimaryGeocoder, SecondaryGeocoder};

/// Result of resolving one address.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    /// Located with a tract.
    Matched(GeoMatch),
    /// Located by the secondary provider, but no tract could be found.
    Partial {
        /// The secondary provider's match.
        secondary: SecondaryMatch,
        /// Why there is no tract.
        error: LookupError,
    },
    /// No provider produced a usable match.
    NotFound(LookupFailure),
}

/// One stage of the fallback chain.
#[derive(Debug)]
enum Stage {
    TryPrimaryVariants,
    TrySecondaryProvider,
    RetryPrimaryWithStandardized(SecondaryMatch),
    ReverseGeocodeBridge(SecondaryMatch),
    Exhausted,
}

/// Drives the fallback chain for one address at a time.
#[derive(Clone)]
pub struct Resolver {
    primary: Arc<dyn PrimaryGeocoder>,
    secondary: Option<Arc<dyn SecondaryGeocoder>>,
    cache: Arc<ResolutionCache>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("secondary", &self.secondary.is_some())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Creates a resolver. Without a secondary provider the chain ends
    /// after the primary variations.
    #[must_use]
    pub fn new(
        primary: Arc<dyn PrimaryGeocoder>,
        secondary: Option<Arc<dyn SecondaryGeocoder>>,
        cache: Arc<ResolutionCache>,
    ) -> Self {
        Self {
            primary,
            secondary,
            cache,
        }
    }

    /// Whether a secondary provider is configured.
    #[must_use]
    pub const fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// Resolves an address to coordinates and a tract.
    ///
    /// With `use_fuzzy` off only the literal input is sent to the primary
    /// provider.
    pub async fn resolve(&self, input: &AddressInput, use_fuzzy: bool) -> GeocodeOutcome {
        let key = input.cache_key();
        if let Some(cached) = self.cache.geocode(&key) {
            return GeocodeOutcome::Matched(cached);
        }

        let zip = input.zip.as_deref();
        let literal = literal_variation(&input.street, &input.city, &input.state, zip);
        let variations = if use_fuzzy {
            generate_variations(&input.street, &input.city, &input.state, zip)
        } else {
            vec![literal.clone()]
        };

        let mut stage = Stage::TryPrimaryVariants;
        loop {
            stage = match stage {
                Stage::TryPrimaryVariants => {
                    for (i, variation) in variations.iter().enumerate() {
                        log::debug!(
                            "Geocoding variation {}/{}: {variation}",
                            i + 1,
                            variations.len()
                        );
                        if let Some((address, geography)) = self.try_primary(variation).await {
                            return self.matched(&key, address, geography, false);
                        }
                    }
                    Stage::TrySecondaryProvider
                }
                Stage::TrySecondaryProvider => self.try_secondary(&literal).await,
                Stage::RetryPrimaryWithStandardized(secondary) => {
                    log::info!(
                        "Retrying with Google-standardized address: {}",
                        secondary.standardized
                    );
                    match self.try_primary(&secondary.standardized).await {
                        Some((primary, geography)) => {
                            let address = ResolvedAddress {
                                input: literal,
                                standardized: primary.standardized,
                                coordinates: secondary.coordinates,
                            };
                            return self.matched(&key, address, geography, true);
                        }
                        None => Stage::ReverseGeocodeBridge(secondary),
                    }
                }
                Stage::ReverseGeocodeBridge(secondary) => {
                    let coordinates = secondary.coordinates;
                    log::info!(
                        "Reverse geocoding coordinates: {}, {}",
                        coordinates.latitude,
                        coordinates.longitude
                    );
                    let geography = match self
                        .primary
                        .reverse_geocode(coordinates.latitude, coordinates.longitude)
                        .await
                    {
                        Ok(geography) => geography,
                        Err(e) => {
                            log::warn!("Reverse geocoding failed: {e}");
                            None
                        }
                    };

                    let Some(geography) = geography else {
                        return GeocodeOutcome::Partial {
                            secondary,
                            error: LookupError::new(
                                ErrorKind::TractDataUnavailable,
                                "Census tract data not available",
                                "Address found via Google Maps but Census tract data unavailable",
                            ),
                        };
                    };

                    let mut address = secondary.to_resolved();
                    address.input = literal;
                    return self.matched(&key, address, geography, true);
                }
                Stage::Exhausted => {
                    log::info!(
                        "Address not found after {} variations: {literal}",
                        variations.len()
                    );
                    return GeocodeOutcome::NotFound(LookupFailure::address_not_found(variations));
                }
            };
        }
    }

    fn matched(
        &self,
        key: &str,
        address: ResolvedAddress,
        geography: CensusGeography,
        secondary_enhanced: bool,
    ) -> GeocodeOutcome {
        let geo = GeoMatch {
            address,
            geography,
            secondary_enhanced,
        };
        self.cache.insert_geocode(key, geo.clone());
        GeocodeOutcome::Matched(geo)
    }

    /// One primary call. A match without a tract counts as a miss, and
    /// provider errors are logged and swallowed.
    async fn try_primary(&self, address: &str) -> Option<(ResolvedAddress, CensusGeography)> {
        match self.primary.geocode(address).await {
            Ok(Some(found)) => {
                let Some(geography) = found.geography else {
                    log::debug!("Match without tract for {address}, skipping");
                    return None;
                };
                Some((found.address, geography))
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Primary geocoder error for {address}: {e}");
                None
            }
        }
    }

    async fn try_secondary(&self, literal: &str) -> Stage {
        let Some(secondary) = &self.secondary else {
            log::debug!("No secondary geocoder configured");
            return Stage::Exhausted;
        };

        log::info!("Trying Google Maps as fallback for {literal}");
        match secondary.geocode(literal).await {
            Ok(Some(found)) => Stage::RetryPrimaryWithStandardized(found),
            Ok(None) => Stage::Exhausted,
            Err(e) => {
                log::warn!("Secondary geocoder error for {literal}: {e}");
                Stage::Exhausted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tract_income_lookup_models::Coordinates;

    use super::*;
    use crate::{GeocodeError, PrimaryMatch};

    fn tract() -> CensusGeography {
        CensusGeography::new("36", "119", "006900", None).unwrap()
    }

    fn primary_match(address: &str, geography: Option<CensusGeography>) -> PrimaryMatch {
        PrimaryMatch {
            address: ResolvedAddress {
                input: address.to_string(),
                standardized: address.to_uppercase(),
                coordinates: Coordinates {
                    latitude: 40.9,
                    longitude: -73.8,
                },
            },
            geography,
        }
    }

    /// Scripted primary provider: answers are consumed in call order and
    /// every query is recorded.
    #[derive(Default)]
    struct StubPrimary {
        answers: Mutex<VecDeque<Result<Option<PrimaryMatch>, GeocodeError>>>,
        reverse: Mutex<Option<CensusGeography>>,
        queries: Mutex<Vec<String>>,
        calls: AtomicUsize,
        reverse_calls: AtomicUsize,
    }

    impl StubPrimary {
        fn answering(answers: Vec<Result<Option<PrimaryMatch>, GeocodeError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                ..Self::default()
            }
        }

        fn with_reverse(self, geography: CensusGeography) -> Self {
            *self.reverse.lock().unwrap() = Some(geography);
            self
        }
    }

    #[async_trait]
    impl PrimaryGeocoder for StubPrimary {
        async fn geocode(&self, address: &str) -> Result<Option<PrimaryMatch>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(address.to_string());
            self.answers.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        async fn reverse_geocode(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> Result<Option<CensusGeography>, GeocodeError> {
            self.reverse_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reverse.lock().unwrap().clone())
        }
    }

    struct StubSecondary {
        answer: Option<SecondaryMatch>,
        calls: AtomicUsize,
    }

    impl StubSecondary {
        fn new(answer: Option<SecondaryMatch>) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SecondaryGeocoder for StubSecondary {
        async fn geocode(&self, _address: &str) -> Result<Option<SecondaryMatch>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    fn google_match() -> SecondaryMatch {
        SecondaryMatch {
            input: "25 Drake Av, New Rochele, NY".to_string(),
            standardized: "25 Drake Ave, New Rochelle, NY 10805, USA".to_string(),
            coordinates: Coordinates {
                latitude: 40.911,
                longitude: -73.782,
            },
            place_id: Some("place".to_string()),
            components: BTreeMap::new(),
        }
    }

    fn input() -> AddressInput {
        AddressInput::new("25 Drake Av.", "New Rochele", "NY", None)
    }

    fn resolver(
        primary: &Arc<StubPrimary>,
        secondary: Option<&Arc<StubSecondary>>,
    ) -> Resolver {
        Resolver::new(
            Arc::clone(primary) as Arc<dyn PrimaryGeocoder>,
            secondary.map(|s| Arc::clone(s) as Arc<dyn SecondaryGeocoder>),
            Arc::new(ResolutionCache::new()),
        )
    }

    #[tokio::test]
    async fn first_usable_variation_wins() {
        let primary = Arc::new(StubPrimary::answering(vec![
            Err(GeocodeError::RateLimited),
            Ok(Some(primary_match("no tract", None))),
            Ok(Some(primary_match("found", Some(tract())))),
        ]));
        let input = AddressInput::new("25 Main St., Apt 4", "Springfield", "IL", Some("62701"));
        let expected = generate_variations("25 Main St., Apt 4", "Springfield", "IL", Some("62701"));
        assert_eq!(expected.len(), 4);

        let outcome = resolver(&primary, None).resolve(&input, true).await;

        let GeocodeOutcome::Matched(geo) = outcome else {
            panic!("expected match, got {outcome:?}");
        };
        assert_eq!(geo.address.input, "found");
        assert!(!geo.secondary_enhanced);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*primary.queries.lock().unwrap(), expected[..3].to_vec());
    }

    #[tokio::test]
    async fn exhausted_without_secondary_lists_every_variation() {
        let primary = Arc::new(StubPrimary::default());
        let input = input();
        let expected = generate_variations(&input.street, &input.city, &input.state, None);

        let outcome = resolver(&primary, None).resolve(&input, true).await;

        let GeocodeOutcome::NotFound(failure) = outcome else {
            panic!("expected not found, got {outcome:?}");
        };
        assert_eq!(failure.kind, ErrorKind::AddressNotFound);
        assert_eq!(failure.tried_variations, expected);
        assert_eq!(failure.suggestions.len(), 4);
        assert_eq!(primary.calls.load(Ordering::SeqCst), expected.len());
        assert_eq!(primary.reverse_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fuzzy_off_tries_only_literal() {
        let primary = Arc::new(StubPrimary::default());
        let outcome = resolver(&primary, None).resolve(&input(), false).await;

        let GeocodeOutcome::NotFound(failure) = outcome else {
            panic!("expected not found");
        };
        assert_eq!(failure.tried_variations, vec!["25 Drake Av., New Rochele, NY"]);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_lookup_hits_cache() {
        let primary = Arc::new(StubPrimary::answering(vec![Ok(Some(primary_match(
            "25 Drake Av., New Rochele, NY",
            Some(tract()),
        )))]));
        let resolver = resolver(&primary, None);

        let first = resolver.resolve(&input(), true).await;
        let upper = AddressInput::new("25 DRAKE AV.", "NEW ROCHELE", "ny", None);
        let second = resolver.resolve(&upper, true).await;

        assert_eq!(first, second);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn standardized_retry_uses_secondary_coordinates() {
        let variations = generate_variations("25 Drake Av.", "New Rochele", "NY", None).len();
        let mut answers: Vec<_> = (0..variations).map(|_| Ok(None)).collect();
        answers.push(Ok(Some(primary_match("retry", Some(tract())))));
        let primary = Arc::new(StubPrimary::answering(answers));
        let secondary = Arc::new(StubSecondary::new(Some(google_match())));

        let outcome = resolver(&primary, Some(&secondary))
            .resolve(&input(), true)
            .await;

        let GeocodeOutcome::Matched(geo) = outcome else {
            panic!("expected match, got {outcome:?}");
        };
        assert!(geo.secondary_enhanced);
        assert_eq!(geo.address.input, "25 Drake Av., New Rochele, NY");
        assert_eq!(geo.address.standardized, "RETRY");
        assert!((geo.address.coordinates.latitude - 40.911).abs() < 1e-9);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            primary.queries.lock().unwrap().last().map(String::as_str),
            Some("25 Drake Ave, New Rochelle, NY 10805, USA")
        );
    }

    #[tokio::test]
    async fn reverse_geocode_bridges_missing_tract() {
        let primary = Arc::new(StubPrimary::default().with_reverse(tract()));
        let secondary = Arc::new(StubSecondary::new(Some(google_match())));

        let outcome = resolver(&primary, Some(&secondary))
            .resolve(&input(), true)
            .await;

        let GeocodeOutcome::Matched(geo) = outcome else {
            panic!("expected match, got {outcome:?}");
        };
        assert!(geo.secondary_enhanced);
        assert_eq!(geo.geography.tract_id, "36119006900");
        assert_eq!(
            geo.address.standardized,
            "25 Drake Ave, New Rochelle, NY 10805, USA"
        );
        assert_eq!(primary.reverse_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn secondary_without_tract_is_partial() {
        let primary = Arc::new(StubPrimary::default());
        let secondary = Arc::new(StubSecondary::new(Some(google_match())));
        let resolver = resolver(&primary, Some(&secondary));

        let outcome = resolver.resolve(&input(), true).await;

        let GeocodeOutcome::Partial { secondary: found, error } = outcome else {
            panic!("expected partial, got {outcome:?}");
        };
        assert_eq!(error.kind, ErrorKind::TractDataUnavailable);
        assert_eq!(error.error, "Census tract data not available");
        assert_eq!(found.place_id.as_deref(), Some("place"));

        // Partial results are not cached.
        resolver.resolve(&input(), true).await;
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn secondary_miss_is_not_found() {
        let primary = Arc::new(StubPrimary::default());
        let secondary = Arc::new(StubSecondary::new(None));

        let outcome = resolver(&primary, Some(&secondary))
            .resolve(&input(), true)
            .await;

        assert!(matches!(outcome, GeocodeOutcome::NotFound(_)));
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(primary.reverse_calls.load(Ordering::SeqCst), 0);
    }
}

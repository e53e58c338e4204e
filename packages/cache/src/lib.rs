#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resolution cache shared by every stage of a lookup.
//!
//! Three typed namespaces live side by side so keys from different
//! stages can never collide:
//!
//! - geocodes, keyed by [`AddressInput::cache_key`](tract_income_lookup_models::AddressInput::cache_key)
//! - tract statistics, keyed by the concatenated FIPS codes
//! - FFIEC classifications, keyed by `ffiec::{tract_id}`
//!
//! Entries are append-only for the life of the cache. Negative FFIEC
//! lookups are cached too so a missing tract is not searched twice.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tract_income_lookup_models::{DemographicsRecord, FfiecClassification, GeoMatch};

/// Hit/miss counters for one cache instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
}

/// Thread-safe, append-only memo of lookup stages.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    geocodes: RwLock<BTreeMap<String, GeoMatch>>,
    demographics: RwLock<BTreeMap<String, DemographicsRecord>>,
    ffiec: RwLock<BTreeMap<String, FfiecClassification>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache key for a tract's survey statistics.
#[must_use]
pub fn demographics_key(state_fips: &str, county_fips: &str, tract_fips: &str) -> String {
    format!("{state_fips}{county_fips}{tract_fips}")
}

/// Cache key for a tract's FFIEC classification.
#[must_use]
pub fn ffiec_key(tract_id: &str) -> String {
    format!("ffiec::{tract_id}")
}

fn read_entry<V: Clone>(map: &RwLock<BTreeMap<String, V>>, key: &str) -> Option<V> {
    map.read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned()
}

/// Inserts unless the key is already present; the first value wins.
fn insert_entry<V>(map: &RwLock<BTreeMap<String, V>>, key: String, value: V) -> bool {
    let mut guard = map.write().unwrap_or_else(PoisonError::into_inner);
    if guard.contains_key(&key) {
        return false;
    }
    guard.insert(key, value);
    true
}

impl ResolutionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record<V>(&self, namespace: &str, key: &str, entry: Option<V>) -> Option<V> {
        if entry.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("Cache hit ({namespace}): {key}");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        entry
    }

    /// Cached geocode for an address key.
    pub fn geocode(&self, key: &str) -> Option<GeoMatch> {
        self.record("geocode", key, read_entry(&self.geocodes, key))
    }

    /// Stores a geocode. Returns `false` if the key was already cached.
    pub fn insert_geocode(&self, key: impl Into<String>, geo: GeoMatch) -> bool {
        insert_entry(&self.geocodes, key.into(), geo)
    }

    /// Cached tract statistics.
    pub fn demographics(&self, key: &str) -> Option<DemographicsRecord> {
        self.record("demographics", key, read_entry(&self.demographics, key))
    }

    /// Stores tract statistics. Returns `false` if the key was already cached.
    pub fn insert_demographics(&self, key: impl Into<String>, record: DemographicsRecord) -> bool {
        insert_entry(&self.demographics, key.into(), record)
    }

    /// Cached FFIEC classification, found or not.
    pub fn ffiec(&self, key: &str) -> Option<FfiecClassification> {
        self.record("ffiec", key, read_entry(&self.ffiec, key))
    }

    /// Stores an FFIEC classification. Returns `false` if the key was
    /// already cached.
    pub fn insert_ffiec(&self, key: impl Into<String>, classification: FfiecClassification) -> bool {
        insert_entry(&self.ffiec, key.into(), classification)
    }

    /// Number of entries across all namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.geocodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
            + self
                .demographics
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
            + self.ffiec.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

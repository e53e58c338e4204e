#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Official FFIEC tract income levels.
//!
//! The FFIEC census tract list assigns every tract an income level
//! ("Low", "Moderate", "Middle", "Upper", ...). [`TractIncomeTable`]
//! loads that list from a local file the first time it is asked for a
//! tract and keeps it for the life of the table. A missing or broken
//! file leaves the table empty; lookups then report the reference data
//! as unavailable instead of failing.

pub mod loader;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tract_income_cache::{ResolutionCache, ffiec_key};
use tract_income_lookup_models::FfiecClassification;

use crate::loader::LoadedTable;

/// Reference files tried in order when no override is configured.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "data/CensusTractList2025_0.xlsx",
    "data/FFIEC_Census_Tract_List.xlsx",
    "data/FFIEC_Census_Tract_List.csv",
];

/// Reported when the table could not be loaded or holds no tracts.
pub const REFERENCE_UNAVAILABLE: &str = "FFIEC reference data unavailable";

/// Reported when the table is loaded but lacks the tract.
pub const TRACT_NOT_PRESENT: &str = "Tract not present in FFIEC reference file";

/// Source label used when the reference file name is unknown.
const FALLBACK_SOURCE: &str = "local_file";

/// Errors from loading or querying the reference table.
#[derive(Debug, thiserror::Error)]
pub enum FfiecError {
    /// CSV parsing error.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the reference file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Workbook could not be opened.
    #[error("Spreadsheet error in {path}: {source}")]
    Spreadsheet {
        /// Path to the reference file.
        path: String,
        /// Underlying workbook error.
        source: calamine::Error,
    },

    /// None of the candidate sheets exist in the workbook.
    #[error("Could not find expected sheet in FFIEC tract list file {path}")]
    NoSheet {
        /// Path to the reference file.
        path: String,
    },

    /// A required column is missing from the header row.
    #[error("Column '{column}' not found in {path}")]
    MissingColumn {
        /// Path to the reference file.
        path: String,
        /// The missing column header.
        column: &'static str,
    },

    /// The file extension is not a known tabular format.
    #[error("Unsupported reference file format: {path}")]
    UnsupportedFormat {
        /// Path to the reference file.
        path: String,
    },

    /// The tract identifier is not an 11-digit GEOID.
    #[error("Unable to determine tract identifier from '{0}'")]
    InvalidTractId(String),
}

/// Which sheet of a workbook to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    /// A sheet by name.
    Name(String),
    /// A sheet by zero-based position.
    Index(usize),
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "'{name}'"),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// Sheets tried in order when reading a workbook.
#[must_use]
pub fn default_sheets() -> Vec<SheetSelector> {
    vec![
        SheetSelector::Name("2024-2025 tracts".to_string()),
        SheetSelector::Name("2025-2024".to_string()),
        SheetSelector::Index(0),
    ]
}

/// Lazily loaded tract GEOID → income level table.
#[derive(Debug)]
pub struct TractIncomeTable {
    candidates: Vec<PathBuf>,
    sheets: Vec<SheetSelector>,
    loaded: OnceLock<LoadedTable>,
}

impl Default for TractIncomeTable {
    fn default() -> Self {
        Self::new(DEFAULT_CANDIDATES.iter().map(PathBuf::from).collect())
    }
}

impl TractIncomeTable {
    /// Creates a table that will load the first existing file among
    /// `candidates`. Nothing is read until the first lookup.
    #[must_use]
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            sheets: default_sheets(),
            loaded: OnceLock::new(),
        }
    }

    /// Overrides the workbook sheets to try.
    #[must_use]
    pub fn with_sheets(mut self, sheets: Vec<SheetSelector>) -> Self {
        self.sheets = sheets;
        self
    }

    /// Candidate reference files, in priority order.
    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    fn table(&self) -> &LoadedTable {
        self.loaded.get_or_init(|| self.load())
    }

    fn load(&self) -> LoadedTable {
        let Some(path) = self.candidates.iter().find(|p| p.is_file()) else {
            log::warn!(
                "FFIEC tract list not found (tried {}); official income levels disabled",
                self.candidates.len()
            );
            return LoadedTable::empty();
        };

        match loader::load(path, &self.sheets) {
            Ok(table) => {
                log::info!(
                    "FFIEC tract income levels loaded from {} ({} tracts)",
                    path.display(),
                    table.entries.len()
                );
                table
            }
            Err(e) => {
                log::warn!("Could not load FFIEC tract list: {e}");
                LoadedTable::empty()
            }
        }
    }

    /// Whether the reference table holds any tracts. Triggers the load.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.table().entries.is_empty()
    }

    /// Number of tracts in the table. Triggers the load.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table().entries.len()
    }

    /// Whether the table is empty. Triggers the load.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// File name the table was loaded from.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.table().source.as_deref()
    }

    /// Classifies one tract. Triggers the load.
    #[must_use]
    pub fn lookup(&self, tract_id: &str) -> FfiecClassification {
        let table = self.table();
        if table.entries.is_empty() {
            return FfiecClassification::unavailable(REFERENCE_UNAVAILABLE);
        }

        table.entries.get(tract_id).map_or_else(
            || FfiecClassification::unavailable(TRACT_NOT_PRESENT),
            |level| {
                FfiecClassification::found(
                    level,
                    table.source.as_deref().unwrap_or(FALLBACK_SOURCE),
                )
            },
        )
    }
}

/// Reference table lookups memoized in the resolution cache.
#[derive(Debug, Clone)]
pub struct FfiecClassifier {
    table: Arc<TractIncomeTable>,
    cache: Arc<ResolutionCache>,
}

impl FfiecClassifier {
    /// Creates a classifier over a shared table and cache.
    #[must_use]
    pub const fn new(table: Arc<TractIncomeTable>, cache: Arc<ResolutionCache>) -> Self {
        Self { table, cache }
    }

    /// The official income level for a tract, found or not.
    ///
    /// Both positive and negative answers are cached under
    /// `ffiec::{tract_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`FfiecError::InvalidTractId`] if `tract_id` is not an
    /// 11-digit GEOID.
    pub fn classify(&self, tract_id: &str) -> Result<FfiecClassification, FfiecError> {
        if !loader::is_tract_id(tract_id) {
            return Err(FfiecError::InvalidTractId(tract_id.to_string()));
        }

        let key = ffiec_key(tract_id);
        if let Some(cached) = self.cache.ffiec(&key) {
            return Ok(cached);
        }

        let classification = self.table.lookup(tract_id);
        log::debug!(
            "FFIEC {tract_id}: {}",
            classification
                .income_level
                .as_deref()
                .or(classification.error.as_deref())
                .unwrap_or_default()
        );
        self.cache.insert_ffiec(key, classification.clone());
        Ok(classification)
    }
}

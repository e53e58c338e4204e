//! Many-address lookups: concurrent batches, summaries and CSV files.
//!
//! Input files are header-less CSV where every non-blank cell is one
//! full address. Output files carry one line per address with the
//! derived and official income levels.

use std::collections::BTreeMap;
use std::path::Path;

use futures::{StreamExt as _, stream};
use serde::Serialize;
use thiserror::Error;
use tract_income_lookup_models::{AddressInput, IncomeLevel, LookupResult};

use crate::TractLookup;

/// Histogram label for results without an FFIEC level.
pub const FFIEC_NOT_AVAILABLE: &str = "FFIEC Not Available";

const COUNTRY_SUFFIX: &str = "United States";

/// Errors from reading or writing batch files.
#[derive(Debug, Error)]
pub enum BatchError {
    /// CSV read or write failed.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// The file being processed.
        path: String,
        /// The underlying CSV error.
        source: csv::Error,
    },

    /// Flushing the output file failed.
    #[error("I/O error writing {path}: {source}")]
    Io {
        /// The file being written.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Looks up many structured addresses, at most `concurrency` at a time.
/// Results are in input order.
pub async fn lookup_batch(
    lookup: &TractLookup,
    inputs: &[AddressInput],
    use_fuzzy: bool,
    concurrency: usize,
) -> Vec<LookupResult> {
    stream::iter(inputs)
        .map(|input| lookup.lookup(input, use_fuzzy))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Looks up many one-line addresses, at most `concurrency` at a time.
/// Results are in input order.
pub async fn lookup_full_addresses(
    lookup: &TractLookup,
    addresses: &[String],
    use_fuzzy: bool,
    concurrency: usize,
) -> Vec<LookupResult> {
    stream::iter(addresses)
        .map(|address| lookup.lookup_full_address(address, use_fuzzy))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Addresses processed.
    pub total: usize,
    /// Lookups that completed without any error annotation.
    pub successful: usize,
    /// Everything else.
    pub failed: usize,
    /// Successful lookups per derived income level.
    pub income_levels: BTreeMap<String, usize>,
    /// Successful lookups per FFIEC income level.
    pub ffiec_levels: BTreeMap<String, usize>,
}

impl BatchSummary {
    /// Summarizes a batch.
    #[must_use]
    pub fn from_results(results: &[LookupResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            let Some(record) = result.record().filter(|_| result.is_complete()) else {
                summary.failed += 1;
                continue;
            };
            summary.successful += 1;

            let income = record
                .demographics
                .as_ref()
                .map_or("Unknown", |d| d.income_level.as_ref());
            *summary.income_levels.entry(income.to_string()).or_default() += 1;

            let ffiec = record.ffiec_income_level().unwrap_or(FFIEC_NOT_AVAILABLE);
            *summary.ffiec_levels.entry(ffiec.to_string()).or_default() += 1;
        }

        summary
    }
}

/// One address read from an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRow {
    /// 1-based row in the file.
    pub row: usize,
    /// 1-based column in the file.
    pub column: usize,
    /// The cleaned address text.
    pub address: String,
}

/// Strips quotes, whitespace and a trailing country name. Returns `None`
/// for a blank cell.
fn clean_address(cell: &str) -> Option<String> {
    let cleaned = cell.trim().trim_matches('"').trim();
    let cleaned = cleaned
        .strip_suffix(COUNTRY_SUFFIX)
        .map_or(cleaned, |rest| rest.trim_end().trim_end_matches(',').trim_end());
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Reads every address from a header-less CSV file.
///
/// # Errors
///
/// Returns [`BatchError::Csv`] if the file cannot be opened or a row is
/// not valid CSV.
pub fn read_address_file(path: &Path) -> Result<Vec<AddressRow>, BatchError> {
    let csv_error = |source: csv::Error| BatchError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let mut rows = Vec::new();
    for (row_index, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        for (column_index, cell) in record.iter().enumerate() {
            if let Some(address) = clean_address(cell) {
                rows.push(AddressRow {
                    row: row_index + 1,
                    column: column_index + 1,
                    address,
                });
            }
        }
    }

    log::info!("Read {} addresses from {}", rows.len(), path.display());
    Ok(rows)
}

/// One line of a results file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    /// The address as read from the input.
    pub original_address: String,
    /// Derived income level, or `Failed - <message>`.
    pub income_level: String,
    /// FFIEC income level, `Error - <reason>`, or blank.
    pub ffiec_income_level: String,
}

impl ResultRow {
    /// Flattens a lookup result for the results file.
    #[must_use]
    pub fn new(original_address: &str, result: &LookupResult) -> Self {
        let original_address = original_address.to_string();

        let record = match result {
            LookupResult::Failed(failure) => {
                return Self {
                    original_address,
                    income_level: format!("Failed - {}", failure.message),
                    ffiec_income_level: String::new(),
                };
            }
            LookupResult::Found(record) => record,
        };

        let ffiec_income_level = record.ffiec.as_ref().map_or_else(String::new, |ffiec| {
            match (&ffiec.income_level, &ffiec.error) {
                (Some(level), _) => level.clone(),
                (None, Some(error)) => format!("Error - {error}"),
                (None, None) => String::new(),
            }
        });

        if let Some(error) = &record.error {
            return Self {
                original_address,
                income_level: format!("Failed - {}", error.message),
                ffiec_income_level,
            };
        }

        let income_level = record
            .demographics
            .as_ref()
            .map_or(IncomeLevel::DataNotAvailable, |d| d.income_level)
            .to_string();

        Self {
            original_address,
            income_level,
            ffiec_income_level,
        }
    }
}

/// Writes a results file.
///
/// # Errors
///
/// Returns [`BatchError`] if the file cannot be created or written.
pub fn write_results_csv(path: &Path, rows: &[ResultRow]) -> Result<(), BatchError> {
    let csv_error = |source: csv::Error| BatchError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| BatchError::Io {
        path: path.display().to_string(),
        source,
    })?;

    log::info!("Results saved to {}", path.display());
    Ok(())
}

/// Reads an address file, looks every address up and pairs each result
/// with its row.
///
/// # Errors
///
/// Returns [`BatchError`] if the input file cannot be read.
pub async fn process_address_file(
    lookup: &TractLookup,
    path: &Path,
    use_fuzzy: bool,
    concurrency: usize,
) -> Result<Vec<(AddressRow, LookupResult)>, BatchError> {
    let rows = read_address_file(path)?;
    let addresses: Vec<String> = rows.iter().map(|r| r.address.clone()).collect();
    let results = lookup_full_addresses(lookup, &addresses, use_fuzzy, concurrency).await;
    Ok(rows.into_iter().zip(results).collect())
}

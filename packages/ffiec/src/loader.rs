//! Reference file parsing.
//!
//! The FFIEC publishes the tract list as an Excel workbook; a CSV export
//! of the same sheet is accepted too. Either way the header row must
//! carry a "FIPS code" and a "Tract income level" column.

use std::collections::HashMap;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use crate::{FfiecError, SheetSelector};

/// Header of the tract GEOID column.
pub const FIPS_COLUMN: &str = "FIPS code";
/// Header of the income level column.
pub const LEVEL_COLUMN: &str = "Tract income level";

const TRACT_ID_LEN: usize = 11;

/// A parsed reference file: tract GEOID → income level label.
#[derive(Debug, Default)]
pub struct LoadedTable {
    /// Income level keyed by 11-character tract GEOID.
    pub entries: HashMap<String, String>,
    /// File name the entries came from.
    pub source: Option<String>,
}

impl LoadedTable {
    /// The table used when no reference file could be loaded.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Normalizes a raw FIPS cell to an 11-character zero-padded GEOID.
///
/// Numeric cells read from spreadsheets can carry a trailing `.0`; it is
/// removed before padding. Returns `None` for blank, non-numeric or
/// over-long values.
#[must_use]
pub fn normalize_fips(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);

    if digits.is_empty() || digits.len() > TRACT_ID_LEN {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(format!("{digits:0>TRACT_ID_LEN$}"))
}

/// Parses a reference file, choosing the reader from its extension.
///
/// # Errors
///
/// Returns [`FfiecError`] if the file cannot be read, no candidate sheet
/// exists, or a required column is missing.
pub fn load(path: &Path, sheets: &[SheetSelector]) -> Result<LoadedTable, FfiecError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let entries = match extension.as_str() {
        "csv" => load_csv(path)?,
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => load_spreadsheet(path, sheets)?,
        _ => {
            return Err(FfiecError::UnsupportedFormat {
                path: path.display().to_string(),
            });
        }
    };

    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    Ok(LoadedTable { entries, source })
}

fn load_csv(path: &Path) -> Result<HashMap<String, String>, FfiecError> {
    let csv_error = |source: csv::Error| FfiecError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let header: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(String::from)
        .collect();

    let rows = reader.records().filter_map(|result| match result {
        Ok(record) => Some(
            record
                .iter()
                .map(|field| Some(field.to_string()).filter(|f| !f.trim().is_empty()))
                .collect::<Vec<_>>(),
        ),
        Err(e) => {
            log::trace!("skipping malformed row: {e}");
            None
        }
    });

    build_entries(path, &header, rows)
}

fn load_spreadsheet(
    path: &Path,
    sheets: &[SheetSelector],
) -> Result<HashMap<String, String>, FfiecError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| FfiecError::Spreadsheet {
        path: path.display().to_string(),
        source,
    })?;

    for selector in sheets {
        let range = match selector {
            SheetSelector::Name(name) => workbook.worksheet_range(name).ok(),
            SheetSelector::Index(index) => workbook.worksheet_range_at(*index).and_then(Result::ok),
        };
        let Some(range) = range else {
            log::debug!("sheet {selector} not found in {}", path.display());
            continue;
        };

        let mut rows = range.rows();
        let header: Vec<String> = rows
            .next()
            .map(|cells| {
                cells
                    .iter()
                    .map(|cell| cell_text(cell).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        log::debug!("reading sheet {selector} from {}", path.display());
        return build_entries(
            path,
            &header,
            rows.map(|cells| cells.iter().map(cell_text).collect::<Vec<_>>()),
        );
    }

    Err(FfiecError::NoSheet {
        path: path.display().to_string(),
    })
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        other => Some(other.to_string()),
    }
}

fn column_index(header: &[String], column: &str) -> Option<usize> {
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(column))
}

/// Maps rows to GEOID → label, dropping rows missing either value.
fn build_entries(
    path: &Path,
    header: &[String],
    rows: impl Iterator<Item = Vec<Option<String>>>,
) -> Result<HashMap<String, String>, FfiecError> {
    let missing = |column: &'static str| FfiecError::MissingColumn {
        path: path.display().to_string(),
        column,
    };
    let fips_idx = column_index(header, FIPS_COLUMN).ok_or_else(|| missing(FIPS_COLUMN))?;
    let level_idx = column_index(header, LEVEL_COLUMN).ok_or_else(|| missing(LEVEL_COLUMN))?;

    let mut entries = HashMap::new();
    let mut dropped = 0u64;

    for row in rows {
        let fips = row
            .get(fips_idx)
            .and_then(Option::as_deref)
            .and_then(normalize_fips);
        let level = row
            .get(level_idx)
            .and_then(Option::as_deref)
            .map(str::trim)
            .filter(|l| !l.is_empty());

        if let (Some(fips), Some(level)) = (fips, level) {
            entries.insert(fips, level.to_string());
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        log::debug!("dropped {dropped} incomplete rows from {}", path.display());
    }

    Ok(entries)
}

/// Whether `tract_id` has the shape of a tract GEOID.
#[must_use]
pub fn is_tract_id(tract_id: &str) -> bool {
    tract_id.len() == TRACT_ID_LEN && tract_id.bytes().all(|b| b.is_ascii_digit())
}

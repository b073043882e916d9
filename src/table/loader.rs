//! CSV loading into a [`Table`].

use super::{Cell, Table};
use crate::error::EtlError;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What to do with rows that have the wrong number of fields or invalid UTF-8.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadRowPolicy {
    /// Abort loading with a parse error.
    #[default]
    Fail,
    /// Drop the row and keep going.
    Skip,
}

impl BadRowPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Some(BadRowPolicy::Fail),
            "skip" => Some(BadRowPolicy::Skip),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub files: usize,
    pub rows: usize,
    pub skipped_rows: usize,
}

/// Normalize a header name: trim, strip surrounding quotes, lower-case.
///
/// The Kaggle export ships headers like `" ""artistname"""`, which the csv
/// reader hands over as ` "artistname"`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_lowercase()
}

/// Load one or more CSV files sharing the same header into a single table.
pub fn load_tables(paths: &[PathBuf], policy: BadRowPolicy) -> Result<(Table, LoadStats), EtlError> {
    if paths.is_empty() {
        return Err(EtlError::parse("no CSV files to load"));
    }

    let mut table: Option<Table> = None;
    let mut stats = LoadStats::default();

    for path in paths {
        let file_table = load_file(path, policy, &mut stats)?;
        match table.as_mut() {
            None => table = Some(file_table),
            Some(existing) => {
                if existing.headers != file_table.headers {
                    return Err(EtlError::parse(format!(
                        "{} has header {:?}, expected {:?}",
                        path.display(),
                        file_table.headers,
                        existing.headers
                    )));
                }
                existing.rows.extend(file_table.rows);
            }
        }
        stats.files += 1;
    }

    let table = table.unwrap_or_default();
    stats.rows = table.len();
    if stats.skipped_rows > 0 {
        warn!(
            "Skipped {} malformed rows while loading {} file(s)",
            stats.skipped_rows, stats.files
        );
    }
    info!(
        "Loaded {} rows with {} columns from {} file(s)",
        stats.rows,
        table.headers.len(),
        stats.files
    );
    Ok((table, stats))
}

/// Open `path` with the loader's reader settings.
pub(super) fn open_reader(path: &Path) -> Result<csv::Reader<File>, EtlError> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| EtlError::parse(format!("cannot open {}: {}", path.display(), e)))
}

/// Read and normalize the header row, failing when it is blank.
pub(super) fn read_headers(reader: &mut csv::Reader<File>, path: &Path) -> Result<Vec<String>, EtlError> {
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EtlError::parse(format!("bad header in {}: {}", path.display(), e)))?
        .iter()
        .map(normalize_header)
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(EtlError::parse(format!("{} has no header row", path.display())));
    }
    Ok(headers)
}

fn load_file(path: &Path, policy: BadRowPolicy, stats: &mut LoadStats) -> Result<Table, EtlError> {
    info!("Reading {}", path.display());
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    debug!("Detected columns in {}: {:?}", path.display(), headers);

    let mut table = Table::new(headers);
    for record in reader.records() {
        match record {
            Ok(record) => {
                table.rows.push(record.iter().map(Cell::from_field).collect());
            }
            Err(err) if is_bad_row(&err) => {
                let line = err
                    .position()
                    .map(|p| p.line().to_string())
                    .unwrap_or_else(|| "?".to_string());
                match policy {
                    BadRowPolicy::Fail => {
                        return Err(EtlError::parse(format!(
                            "{} line {}: {}",
                            path.display(),
                            line,
                            err
                        )));
                    }
                    BadRowPolicy::Skip => {
                        debug!("Skipping malformed row at {} line {}", path.display(), line);
                        stats.skipped_rows += 1;
                    }
                }
            }
            Err(err) => {
                return Err(EtlError::parse(format!(
                    "error reading {}: {}",
                    path.display(),
                    err
                )));
            }
        }
    }

    Ok(table)
}

pub(super) fn is_bad_row(err: &csv::Error) -> bool {
    matches!(
        err.kind(),
        csv::ErrorKind::UnequalLengths { .. } | csv::ErrorKind::Utf8 { .. }
    )
}

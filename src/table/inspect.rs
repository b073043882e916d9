//! Diagnostics for a raw CSV file, used by `spotify-etl inspect`.
//!
//! Reads the file with the same reader settings as the loader, but never
//! stops at a malformed row: it counts and lists them instead.

use super::loader::{is_bad_row, open_reader, read_headers};
use crate::error::EtlError;
use crate::fetcher::is_csv;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Lines scanned for double quotes.
const QUOTE_SCAN_LINES: usize = 10;

#[derive(Clone, Debug)]
pub struct InspectOptions {
    /// Well-formed rows kept as a sample.
    pub sample_rows: usize,
    /// Malformed rows listed individually, the rest are only counted.
    pub max_bad_lines: usize,
    /// Also show the raw text of this line and its neighbours.
    pub context_line: Option<u64>,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            sample_rows: 5,
            max_bad_lines: 20,
            context_line: None,
        }
    }
}

/// Occurrences of the usual separators in the header line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DelimiterCounts {
    pub comma: usize,
    pub semicolon: usize,
    pub tab: usize,
    pub pipe: usize,
}

impl DelimiterCounts {
    fn of(line: &str) -> Self {
        let count = |c: char| line.chars().filter(|&x| x == c).count();
        Self {
            comma: count(','),
            semicolon: count(';'),
            tab: count('\t'),
            pipe: count('|'),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BadLine {
    pub line: u64,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct CsvReport {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Normalized the way the loader normalizes them.
    pub headers: Vec<String>,
    pub delimiters: DelimiterCounts,
    pub has_quotes: bool,
    /// Well-formed data rows.
    pub rows: usize,
    pub bad_rows: usize,
    /// The first `max_bad_lines` malformed rows.
    pub bad_lines: Vec<BadLine>,
    pub sample: Vec<Vec<String>>,
    /// `(line number, raw text)` around the requested line.
    pub context: Vec<(u64, String)>,
}

/// Scan a CSV file and report its shape and the malformed rows in it.
pub fn inspect_csv(path: &Path, options: &InspectOptions) -> Result<CsvReport, EtlError> {
    let size_bytes = std::fs::metadata(path)
        .map_err(|e| EtlError::parse(format!("cannot stat {}: {}", path.display(), e)))?
        .len();

    let raw_head = raw_lines(path, |number| number <= QUOTE_SCAN_LINES as u64)?;
    let delimiters = raw_head
        .first()
        .map(|(_, line)| DelimiterCounts::of(line))
        .unwrap_or_default();
    let has_quotes = raw_head.iter().any(|(_, line)| line.contains('"'));

    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;

    let mut rows = 0;
    let mut bad_rows = 0;
    let mut bad_lines = Vec::new();
    let mut sample = Vec::new();

    for record in reader.records() {
        match record {
            Ok(record) => {
                rows += 1;
                if sample.len() < options.sample_rows {
                    sample.push(record.iter().map(str::to_string).collect());
                }
            }
            Err(err) if is_bad_row(&err) => {
                bad_rows += 1;
                if bad_lines.len() < options.max_bad_lines {
                    bad_lines.push(BadLine {
                        line: err.position().map(|p| p.line()).unwrap_or(0),
                        reason: err.to_string(),
                    });
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

    let context = match options.context_line {
        Some(line) => {
            let first = line.saturating_sub(1).max(1);
            raw_lines(path, |number| number >= first && number <= line + 1)?
        }
        None => Vec::new(),
    };

    Ok(CsvReport {
        path: path.to_path_buf(),
        size_bytes,
        headers,
        delimiters,
        has_quotes,
        rows,
        bad_rows,
        bad_lines,
        sample,
        context,
    })
}

/// The CSV files directly inside `dir`, sorted by name.
pub fn csv_files_in(dir: &Path) -> Result<Vec<PathBuf>, EtlError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| EtlError::parse(format!("cannot list {}: {}", dir.display(), e)))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| EtlError::parse(format!("cannot list {}: {}", dir.display(), e)))?
            .path();
        if path.is_file() && is_csv(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Raw text of the 1-based lines selected by `wanted`, invalid UTF-8 replaced.
fn raw_lines(path: &Path, wanted: impl Fn(u64) -> bool) -> Result<Vec<(u64, String)>, EtlError> {
    let file = File::open(path)
        .map_err(|e| EtlError::parse(format!("cannot open {}: {}", path.display(), e)))?;
    let mut selected = Vec::new();
    let mut seen_wanted = false;

    for (i, line) in BufReader::new(file).split(b'\n').enumerate() {
        let number = i as u64 + 1;
        if !wanted(number) {
            if seen_wanted {
                break;
            }
            continue;
        }
        seen_wanted = true;
        let bytes = line
            .map_err(|e| EtlError::parse(format!("error reading {}: {}", path.display(), e)))?;
        let text = String::from_utf8_lossy(&bytes);
        selected.push((number, text.trim_end_matches('\r').to_string()));
    }
    Ok(selected)
}

impl fmt::Display for CsvReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "File: {} ({:.2} MB)",
            self.path.display(),
            self.size_bytes as f64 / (1024.0 * 1024.0)
        )?;

        writeln!(f, "Columns ({}):", self.headers.len())?;
        for (i, header) in self.headers.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, header)?;
        }

        let d = &self.delimiters;
        writeln!(
            f,
            "Separators in first line: ',' {}  ';' {}  tab {}  '|' {}",
            d.comma, d.semicolon, d.tab, d.pipe
        )?;
        writeln!(
            f,
            "Double quotes in first {} lines: {}",
            QUOTE_SCAN_LINES,
            if self.has_quotes { "yes" } else { "no" }
        )?;
        writeln!(f, "Rows: {} well-formed, {} malformed", self.rows, self.bad_rows)?;

        if !self.bad_lines.is_empty() {
            writeln!(f, "Malformed rows:")?;
            for bad in &self.bad_lines {
                writeln!(f, "  line {}: {}", bad.line, bad.reason)?;
            }
            let unlisted = self.bad_rows - self.bad_lines.len();
            if unlisted > 0 {
                writeln!(f, "  ... and {} more", unlisted)?;
            }
        }

        if !self.context.is_empty() {
            writeln!(f, "Raw lines:")?;
            for (number, text) in &self.context {
                writeln!(f, "  {}: {}", number, text)?;
            }
        }

        if !self.sample.is_empty() {
            writeln!(f, "Sample:")?;
            for row in &self.sample {
                writeln!(f, "  {}", row.join(" | "))?;
            }
        }
        Ok(())
    }
}

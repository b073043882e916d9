//! In-memory tabular representation of the dataset.

mod inspect;
mod loader;

pub use inspect::{csv_files_in, inspect_csv, BadLine, CsvReport, DelimiterCounts, InspectOptions};
pub use loader::{load_tables, normalize_header, BadRowPolicy, LoadStats};

use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// A single field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Number(f64),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    /// Build a cell from a raw CSV field, empty fields are null.
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Cell::Null
        } else {
            Cell::Text(field.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Cell::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Stable string form used for equality keys (dedup, grouping).
    pub fn key_repr(&self) -> Cow<'_, str> {
        match self {
            Cell::Null => Cow::Borrowed("\u{0}"),
            Cell::Text(s) => Cow::Borrowed(s),
            Cell::Number(n) => Cow::Owned(format!("n:{}", n.to_bits())),
            Cell::Timestamp(t) => Cow::Owned(format!("t:{}", t.timestamp_micros())),
        }
    }
}

pub type Row = Vec<Cell>;

/// Headers plus rows, every row has exactly one cell per header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Indexes of the given columns that exist in this table.
    pub fn column_indexes<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Vec<usize> {
        names
            .into_iter()
            .filter_map(|name| self.column_index(name))
            .collect()
    }

    /// Keep only rows matching `keep`, returns how many were removed.
    pub fn retain_rows<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&Row) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(keep);
        before - self.rows.len()
    }
}

use super::rules::{CleaningRules, DedupKey};
use crate::table::{Cell, Row, Table};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashSet;
use tracing::warn;

/// Impute configured defaults, then drop rows with a null required field.
pub fn handle_missing(mut table: Table, rules: &CleaningRules) -> Table {
    let imputations: Vec<(usize, &String)> = rules
        .imputations
        .iter()
        .filter_map(|(column, value)| table.column_index(column).map(|i| (i, value)))
        .collect();

    if !imputations.is_empty() {
        for row in table.rows.iter_mut() {
            for (index, value) in &imputations {
                if row[*index].is_null() {
                    row[*index] = Cell::Text((*value).clone());
                }
            }
        }
    }

    let required = present_columns(&table, &rules.required, "required");
    table.retain_rows(|row| required.iter().all(|&i| !row[i].is_null()));
    table
}

/// Keep the first row of each dedup key.
pub fn remove_duplicates(mut table: Table, rules: &CleaningRules) -> Table {
    let key_columns: Vec<usize> = match &rules.dedup {
        DedupKey::FullRow => (0..table.headers.len()).collect(),
        DedupKey::Columns(columns) => present_columns(&table, columns, "dedup key"),
    };

    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(table.len());
    table.retain_rows(|row| seen.insert(row_key(row, &key_columns)));
    table
}

/// Drop rows whose ranged columns parse to a number outside the range.
///
/// Values that don't parse are kept, `coerce_types` decides about them.
pub fn filter_out_of_range(mut table: Table, rules: &CleaningRules) -> Table {
    let ranged: Vec<(usize, super::ValueRange)> = rules
        .ranges
        .iter()
        .filter_map(|(column, range)| table.column_index(column).map(|i| (i, *range)))
        .collect();

    if ranged.is_empty() {
        return table;
    }

    table.retain_rows(|row| {
        ranged.iter().all(|(index, range)| match numeric_value(&row[*index]) {
            Some(value) => range.contains(value),
            None => true,
        })
    });
    table
}

/// Convert numeric and timestamp columns, dropping rows that fail conversion.
pub fn coerce_types(mut table: Table, rules: &CleaningRules) -> Table {
    let numeric = table.column_indexes(rules.numeric_columns.iter());
    let timestamps = table.column_indexes(rules.timestamp_columns.iter());

    if numeric.is_empty() && timestamps.is_empty() {
        return table;
    }

    let rows = std::mem::take(&mut table.rows);
    table.rows = rows
        .into_iter()
        .filter_map(|mut row| {
            for &index in &numeric {
                row[index] = coerce_number(&row[index])?;
            }
            for &index in &timestamps {
                row[index] = coerce_timestamp(&row[index])?;
            }
            Some(row)
        })
        .collect();
    table
}

fn coerce_number(cell: &Cell) -> Option<Cell> {
    match cell {
        Cell::Text(text) => parse_number(text).map(Cell::Number),
        Cell::Null | Cell::Number(_) => Some(cell.clone()),
        Cell::Timestamp(_) => None,
    }
}

fn coerce_timestamp(cell: &Cell) -> Option<Cell> {
    match cell {
        Cell::Text(text) => parse_timestamp(text).map(Cell::Timestamp),
        Cell::Null | Cell::Timestamp(_) => Some(cell.clone()),
        Cell::Number(_) => None,
    }
}

/// Parse a timestamp as RFC 3339, `%Y-%m-%d %H:%M:%S` or `%Y-%m-%d` (both UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn numeric_value(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Text(text) => parse_number(text),
        Cell::Number(n) => Some(*n),
        _ => None,
    }
}

fn row_key(row: &Row, columns: &[usize]) -> Vec<String> {
    columns
        .iter()
        .map(|&i| row[i].key_repr().into_owned())
        .collect()
}

fn present_columns(table: &Table, columns: &[String], what: &str) -> Vec<usize> {
    columns
        .iter()
        .filter_map(|column| {
            let index = table.column_index(column);
            if index.is_none() {
                warn!("Ignoring {} column '{}': not in table", what, column);
            }
            index
        })
        .collect()
}

use std::collections::BTreeMap;

/// Inclusive numeric range a value must fall into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// How duplicate rows are identified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DedupKey {
    /// Two rows are duplicates when every cell is equal.
    #[default]
    FullRow,
    /// Two rows are duplicates when the listed columns are equal.
    Columns(Vec<String>),
}

/// Everything the cleaning steps need to know about the table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CleaningRules {
    /// Rows with a null in any of these columns are dropped.
    pub required: Vec<String>,
    /// Null cells in these columns get the given text before the required check.
    pub imputations: BTreeMap<String, String>,
    pub dedup: DedupKey,
    pub ranges: BTreeMap<String, ValueRange>,
    /// Columns coerced to numbers.
    pub numeric_columns: Vec<String>,
    /// Columns coerced to UTC timestamps.
    pub timestamp_columns: Vec<String>,
}

/// Accepted ranges for the audio-feature columns.
pub fn default_ranges() -> BTreeMap<String, ValueRange> {
    let unit = ValueRange::new(0.0, 1.0);
    [
        ("duration_ms", ValueRange::new(1.0, 3_600_000.0)),
        ("popularity", ValueRange::new(0.0, 100.0)),
        ("danceability", unit),
        ("energy", unit),
        ("speechiness", unit),
        ("acousticness", unit),
        ("instrumentalness", unit),
        ("liveness", unit),
        ("valence", unit),
        ("loudness", ValueRange::new(-60.0, 5.0)),
        ("tempo", ValueRange::new(0.0, 300.0)),
    ]
    .into_iter()
    .map(|(name, range)| (name.to_string(), range))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_inclusive() {
        let range = ValueRange::new(0.0, 1.0);
        assert!(range.contains(0.0));
        assert!(range.contains(1.0));
        assert!(!range.contains(-0.01));
        assert!(!range.contains(1.01));
        assert!(!range.contains(f64::NAN));
    }

    #[test]
    fn test_default_ranges_reject_negative_duration() {
        let ranges = default_ranges();
        assert!(!ranges["duration_ms"].contains(-5.0));
        assert!(ranges["duration_ms"].contains(210_000.0));
        assert_eq!(ranges.len(), 11);
    }
}

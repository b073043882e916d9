//! Data-quality rules applied between loading and mapping.
//!
//! Cleaning is a fixed sequence of pure steps over a [`Table`]:
//! 1. handle_missing: impute configured defaults, drop rows missing required fields
//! 2. remove_duplicates: keep the first row for each dedup key
//! 3. filter_out_of_range: drop rows with numeric values outside accepted ranges
//! 4. coerce_types: convert numeric and timestamp columns, drop rows that fail
//!
//! Later steps only see rows that survived the earlier ones.

mod rules;
mod steps;

pub use rules::{default_ranges, CleaningRules, DedupKey, ValueRange};
pub use steps::{coerce_types, filter_out_of_range, handle_missing, parse_timestamp, remove_duplicates};

use crate::table::Table;
use tracing::info;

/// A named cleaning step.
#[derive(Clone, Copy)]
pub struct CleaningStep {
    pub name: &'static str,
    pub apply: fn(Table, &CleaningRules) -> Table,
}

/// The cleaning steps, in the order they run.
pub const CLEANING_STEPS: [CleaningStep; 4] = [
    CleaningStep {
        name: "handle_missing",
        apply: handle_missing,
    },
    CleaningStep {
        name: "remove_duplicates",
        apply: remove_duplicates,
    },
    CleaningStep {
        name: "filter_out_of_range",
        apply: filter_out_of_range,
    },
    CleaningStep {
        name: "coerce_types",
        apply: coerce_types,
    },
];

/// Rows removed by one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: &'static str,
    pub removed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub steps: Vec<StepOutcome>,
}

impl CleaningReport {
    pub fn removed(&self) -> usize {
        self.input_rows - self.output_rows
    }
}

/// Run every step of [`CLEANING_STEPS`] in order.
pub fn clean(table: Table, rules: &CleaningRules) -> (Table, CleaningReport) {
    let mut report = CleaningReport {
        input_rows: table.len(),
        ..Default::default()
    };

    let mut table = table;
    for step in CLEANING_STEPS.iter() {
        let before = table.len();
        table = (step.apply)(table, rules);
        let removed = before - table.len();
        info!("Cleaning step {}: removed {} rows", step.name, removed);
        report.steps.push(StepOutcome {
            step: step.name,
            removed,
        });
    }

    report.output_rows = table.len();
    info!(
        "Cleaning completed: {} of {} rows kept",
        report.output_rows, report.input_rows
    );
    (table, report)
}

//! Aggregation Spec Module
//! Declarative description of how a record sequence becomes chart-ready points.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a spec cannot run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("at least one value column is required")]
    NoValueColumns,
    #[error("value column `{0}` is listed more than once")]
    DuplicateValueColumn(String),
    #[error("grouping by year requires a date column")]
    MissingDateColumn,
    #[error("{0} require a label column")]
    MissingLabelColumn(&'static str),
    #[error("five-number summaries take exactly one range column, got {0}")]
    RangeColumnCount(usize),
    #[error("five-number summaries cannot be grouped by year")]
    FiveNumberByYear,
}

/// How records are bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKey {
    /// Bucket by the year extracted from `date_column`.
    #[default]
    Year,
    /// One point per record, in input order.
    None,
}

/// Output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationMode {
    /// Per-column averages, either per year or per row.
    #[default]
    MeanSeries,
    /// Box-plot summary derived from a single range column.
    FiveNumberSummary,
}

pub const PRESET_NAMES: [&str; 5] = [
    "reservoir-levels",
    "reservoir-rainfall",
    "population",
    "population-growth",
    "ground-water-level",
];

const RESERVOIRS: [&str; 4] = ["POONDI", "CHOLAVARAM", "REDHILLS", "CHEMBARAMBAKKAM"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    #[serde(default)]
    pub mode: AggregationMode,
    #[serde(default)]
    pub group_key: GroupKey,
    #[serde(default)]
    pub date_column: Option<String>,
    pub value_columns: Vec<String>,
    #[serde(default)]
    pub label_column: Option<String>,
}

impl AggregationSpec {
    /// Yearly means of `value_columns`, dated by `date_column`.
    pub fn yearly_means<I, S>(date_column: &str, value_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: AggregationMode::MeanSeries,
            group_key: GroupKey::Year,
            date_column: Some(date_column.to_string()),
            value_columns: value_columns.into_iter().map(Into::into).collect(),
            label_column: None,
        }
    }

    /// One point per row, keyed by `label_column`.
    pub fn per_row<I, S>(label_column: &str, value_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: AggregationMode::MeanSeries,
            group_key: GroupKey::None,
            date_column: None,
            value_columns: value_columns.into_iter().map(Into::into).collect(),
            label_column: Some(label_column.to_string()),
        }
    }

    /// Box-plot entries from a `"<min> - <max>"` column.
    pub fn five_number(label_column: &str, range_column: &str) -> Self {
        Self {
            mode: AggregationMode::FiveNumberSummary,
            group_key: GroupKey::None,
            date_column: None,
            value_columns: vec![range_column.to_string()],
            label_column: Some(label_column.to_string()),
        }
    }

    /// Built-in spec for one of the dashboard datasets, see [`PRESET_NAMES`].
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "reservoir-levels" | "reservoir-rainfall" => {
                Some(Self::yearly_means("Date", RESERVOIRS))
            }
            "population" => Some(Self::per_row("year", ["population"])),
            "population-growth" => Some(Self::per_row("year", ["growth", "growthRate"])),
            "ground-water-level" => Some(Self::five_number("Station", "Range")),
            _ => None,
        }
    }

    /// Check that the mode, grouping and named columns fit together.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.value_columns.is_empty() {
            return Err(SpecError::NoValueColumns);
        }
        for (i, column) in self.value_columns.iter().enumerate() {
            if self.value_columns[..i].contains(column) {
                return Err(SpecError::DuplicateValueColumn(column.clone()));
            }
        }
        match (self.mode, self.group_key) {
            (AggregationMode::MeanSeries, GroupKey::Year) => {
                if self.date_column.is_none() {
                    return Err(SpecError::MissingDateColumn);
                }
            }
            (AggregationMode::MeanSeries, GroupKey::None) => {
                if self.label_column.is_none() {
                    return Err(SpecError::MissingLabelColumn("ungrouped series"));
                }
            }
            (AggregationMode::FiveNumberSummary, GroupKey::None) => {
                if self.label_column.is_none() {
                    return Err(SpecError::MissingLabelColumn("five-number summaries"));
                }
                if self.value_columns.len() != 1 {
                    return Err(SpecError::RangeColumnCount(self.value_columns.len()));
                }
            }
            (AggregationMode::FiveNumberSummary, GroupKey::Year) => {
                return Err(SpecError::FiveNumberByYear);
            }
        }
        Ok(())
    }

    /// Every column the spec names, deduplicated, in date/value/label order.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        let named = self
            .date_column
            .iter()
            .chain(self.value_columns.iter())
            .chain(self.label_column.iter());
        for column in named {
            if !columns.contains(&column.as_str()) {
                columns.push(column.as_str());
            }
        }
        columns
    }

    /// The single range column in five-number mode, `None` for mean series.
    pub fn range_column(&self) -> Option<&str> {
        match self.mode {
            AggregationMode::FiveNumberSummary => self.value_columns.first().map(String::as_str),
            AggregationMode::MeanSeries => None,
        }
    }
}

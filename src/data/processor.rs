//! Data Processor Module
//! Folds validated records into chart-ready aggregate points.

use super::diagnostics::{Diagnostic, DiagnosticCode};
use super::record::{RawRecord, Schema};
use super::spec::{AggregationMode, AggregationSpec, GroupKey, SpecError};
use crate::stats::{FiveNumberSummary, RunningMean, StatsCalculator};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Dataset-level failures. These abort aggregation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no records to aggregate")]
    EmptyInput,
    #[error("missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("invalid aggregation spec: {0}")]
    InvalidSpec(#[from] SpecError),
}

impl AggregationError {
    /// Error code reported to the dashboard.
    pub fn code(&self) -> &'static str {
        match self {
            AggregationError::EmptyInput => "empty-input",
            AggregationError::MissingColumns(_) => "missing-columns",
            AggregationError::InvalidSpec(_) => "invalid-spec",
        }
    }
}

/// Key of a mean-series point.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum PointKey {
    Year(i32),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanPoint {
    pub key: PointKey,
    /// Column -> average. Columns with no contributing value are absent, never zero.
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiveNumberPoint {
    pub entity: String,
    #[serde(flatten)]
    pub summary: FiveNumberSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregatePoint {
    Mean(MeanPoint),
    FiveNumber(FiveNumberPoint),
}

impl AggregatePoint {
    /// The point as a mean-series entry, if it is one.
    pub fn as_mean(&self) -> Option<&MeanPoint> {
        match self {
            AggregatePoint::Mean(p) => Some(p),
            AggregatePoint::FiveNumber(_) => None,
        }
    }

    /// The point as a box-plot entry, if it is one.
    pub fn as_five_number(&self) -> Option<&FiveNumberPoint> {
        match self {
            AggregatePoint::FiveNumber(p) => Some(p),
            AggregatePoint::Mean(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub points: Vec<AggregatePoint>,
    pub diagnostics: Vec<Diagnostic>,
    /// Records handed to the engine.
    pub rows_in: usize,
    /// Records that contributed to `points`.
    pub rows_folded: usize,
}

impl AggregateResult {
    /// Whether no point survived aggregation.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of rows left out of the aggregate.
    pub fn skipped_rows(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.code.excludes_row())
            .count()
    }

    /// Mean-series points in output order.
    pub fn mean_points(&self) -> impl Iterator<Item = &MeanPoint> {
        self.points.iter().filter_map(AggregatePoint::as_mean)
    }

    /// Box-plot points in input order.
    pub fn five_number_points(&self) -> impl Iterator<Item = &FiveNumberPoint> {
        self.points.iter().filter_map(AggregatePoint::as_five_number)
    }
}

/// Per-year accumulator: one running mean per column, created on the
/// column's first contribution.
#[derive(Debug, Clone, Default)]
pub struct YearBucket {
    columns: HashMap<String, RunningMean>,
}

impl YearBucket {
    /// Add one value of `column` to the bucket.
    pub fn fold(&mut self, column: &str, value: f64) {
        match self.columns.get_mut(column) {
            Some(mean) => mean.push(value),
            None => {
                self.columns.insert(column.to_string(), RunningMean::new(value));
            }
        }
    }

    /// Values folded for `column`, zero if it never contributed.
    pub fn count(&self, column: &str) -> usize {
        self.columns.get(column).map_or(0, RunningMean::count)
    }

    /// Consume the bucket into column averages.
    ///
    /// A column whose average is not finite is left out, like a column with
    /// no contributions, rather than reported as infinity.
    pub fn finish(self) -> BTreeMap<String, f64> {
        self.columns
            .into_iter()
            .filter_map(|(column, mean)| {
                let value = mean.mean();
                if value.is_finite() {
                    Some((column, value))
                } else {
                    warn!(%column, count = mean.count(), "mean out of f64 range, dropped");
                    None
                }
            })
            .collect()
    }
}

/// Year-keyed buckets, ordered ascending by year.
pub type YearBuckets = BTreeMap<i32, YearBucket>;

/// Fold one decoded row into `buckets`.
pub fn fold_year(buckets: &mut YearBuckets, year: i32, values: &[(&str, f64)]) {
    let bucket = buckets.entry(year).or_default();
    for &(column, value) in values {
        bucket.fold(column, value);
    }
}

/// Runs an [`AggregationSpec`] over a record sequence.
pub struct DataProcessor;

impl DataProcessor {
    /// Aggregate `records` according to `spec`.
    ///
    /// Row-level defects are returned as diagnostics, one per skipped row;
    /// only an invalid spec, an empty record sequence or columns missing
    /// from the first record's schema fail the call.
    pub fn aggregate(
        records: &[RawRecord],
        spec: &AggregationSpec,
    ) -> Result<AggregateResult, AggregationError> {
        spec.validate()?;
        let first = records.first().ok_or(AggregationError::EmptyInput)?;
        Self::check_columns(first.schema(), spec)?;

        let mut diagnostics = Vec::new();
        let points = match (spec.mode, spec.group_key) {
            (AggregationMode::MeanSeries, GroupKey::Year) => {
                let date_column = required(&spec.date_column, SpecError::MissingDateColumn)?;
                Self::yearly_means(records, date_column, &spec.value_columns, &mut diagnostics)
            }
            (AggregationMode::MeanSeries, GroupKey::None) => {
                let label_column = required(
                    &spec.label_column,
                    SpecError::MissingLabelColumn("ungrouped series"),
                )?;
                Self::row_means(records, label_column, &spec.value_columns, &mut diagnostics)
            }
            (AggregationMode::FiveNumberSummary, _) => {
                let label_column = required(
                    &spec.label_column,
                    SpecError::MissingLabelColumn("five-number summaries"),
                )?;
                let range_column = spec
                    .range_column()
                    .ok_or(SpecError::RangeColumnCount(0))?;
                Self::five_number_summaries(records, label_column, range_column, &mut diagnostics)
            }
        };

        // Exactly one diagnostic per skipped row
        let rows_folded = records.len() - diagnostics.len();

        info!(
            mode = ?spec.mode,
            group_key = ?spec.group_key,
            rows_in = records.len(),
            rows_folded,
            points = points.len(),
            skipped = diagnostics.len(),
            "aggregated dataset"
        );

        Ok(AggregateResult {
            points,
            diagnostics,
            rows_in: records.len(),
            rows_folded,
        })
    }

    /// Every column the spec names must be in the schema.
    pub fn check_columns(schema: &Schema, spec: &AggregationSpec) -> Result<(), AggregationError> {
        let missing: Vec<String> = spec
            .referenced_columns()
            .into_iter()
            .filter(|column| !schema.contains(column))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AggregationError::MissingColumns(missing))
        }
    }

    fn yearly_means(
        records: &[RawRecord],
        date_column: &str,
        value_columns: &[String],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<AggregatePoint> {
        let mut buckets = YearBuckets::new();

        for (row, record) in records.iter().enumerate() {
            match decode_dated_row(record, row, date_column, value_columns) {
                Ok((year, values)) => fold_year(&mut buckets, year, &values),
                Err(diagnostic) => skip(diagnostics, record, diagnostic),
            }
        }

        buckets
            .into_iter()
            .map(|(year, bucket)| {
                AggregatePoint::Mean(MeanPoint {
                    key: PointKey::Year(year),
                    values: bucket.finish(),
                })
            })
            .collect()
    }

    fn row_means(
        records: &[RawRecord],
        label_column: &str,
        value_columns: &[String],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<AggregatePoint> {
        let mut points = Vec::with_capacity(records.len());

        for (row, record) in records.iter().enumerate() {
            match decode_labeled_row(record, row, label_column, value_columns) {
                Ok((label, values)) => points.push(AggregatePoint::Mean(MeanPoint {
                    key: PointKey::Label(label.to_string()),
                    values,
                })),
                Err(diagnostic) => skip(diagnostics, record, diagnostic),
            }
        }

        points
    }

    fn five_number_summaries(
        records: &[RawRecord],
        label_column: &str,
        range_column: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<AggregatePoint> {
        let mut points = Vec::with_capacity(records.len());

        for (row, record) in records.iter().enumerate() {
            let decoded = present(record, row, label_column).and_then(|entity| {
                let raw = present(record, row, range_column)?;
                let summary = StatsCalculator::range_summary(raw).map_err(|e| {
                    Diagnostic::new(row, DiagnosticCode::BadRangeFormat, e.to_string())
                        .with_column(range_column)
                })?;
                Ok((entity, summary))
            });

            match decoded {
                Ok((entity, summary)) => points.push(AggregatePoint::FiveNumber(FiveNumberPoint {
                    entity: entity.to_string(),
                    summary,
                })),
                Err(diagnostic) => skip(diagnostics, record, diagnostic),
            }
        }

        points
    }
}

fn required<'a>(column: &'a Option<String>, missing: SpecError) -> Result<&'a str, SpecError> {
    column.as_deref().ok_or(missing)
}

fn skip(diagnostics: &mut Vec<Diagnostic>, record: &RawRecord, diagnostic: Diagnostic) {
    let diagnostic = diagnostic.at_line(record.line());
    debug!(
        row = diagnostic.row,
        line = ?diagnostic.line,
        code = %diagnostic.code,
        column = diagnostic.column.as_deref().unwrap_or("-"),
        detail = %diagnostic.detail,
        "skipping row"
    );
    diagnostics.push(diagnostic);
}

/// The field's value if the column exists on this record.
fn present<'r>(record: &'r RawRecord, row: usize, column: &str) -> Result<&'r str, Diagnostic> {
    record.get(column).ok_or_else(|| {
        Diagnostic::new(row, DiagnosticCode::MissingField, "column absent from record")
            .with_column(column)
    })
}

/// The field's value if it exists and is non-empty.
fn non_empty<'r>(record: &'r RawRecord, row: usize, column: &str) -> Result<&'r str, Diagnostic> {
    let value = present(record, row, column)?;
    if value.is_empty() {
        return Err(
            Diagnostic::new(row, DiagnosticCode::MissingField, "field is empty").with_column(column),
        );
    }
    Ok(value)
}

fn numeric(raw: &str, row: usize, column: &str) -> Result<f64, Diagnostic> {
    StatsCalculator::parse_number(raw).map_err(|e| {
        Diagnostic::new(row, DiagnosticCode::BadNumericValue, e.to_string()).with_column(column)
    })
}

/// Presence first, then the date, then every value.
fn decode_dated_row<'s>(
    record: &RawRecord,
    row: usize,
    date_column: &str,
    value_columns: &'s [String],
) -> Result<(i32, Vec<(&'s str, f64)>), Diagnostic> {
    let date = non_empty(record, row, date_column)?;
    let raw_values = value_columns
        .iter()
        .map(|column| non_empty(record, row, column).map(|raw| (column.as_str(), raw)))
        .collect::<Result<Vec<_>, _>>()?;

    let year = StatsCalculator::parse_year(date).map_err(|e| {
        Diagnostic::new(row, DiagnosticCode::BadDateFormat, e.to_string()).with_column(date_column)
    })?;

    let values = raw_values
        .into_iter()
        .map(|(column, raw)| numeric(raw, row, column).map(|v| (column, v)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((year, values))
}

fn decode_labeled_row<'r>(
    record: &'r RawRecord,
    row: usize,
    label_column: &str,
    value_columns: &[String],
) -> Result<(&'r str, BTreeMap<String, f64>), Diagnostic> {
    let label = present(record, row, label_column)?;
    let mut values = BTreeMap::new();
    for column in value_columns {
        let raw = present(record, row, column)?;
        values.insert(column.clone(), numeric(raw, row, column)?);
    }
    Ok((label, values))
}

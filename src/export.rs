//! Export Module
//! Tabular view of aggregate points for DataFrame-based renderers and CSV output.

use crate::data::{AggregatePoint, AggregateResult, MeanPoint, PointKey};
use polars::prelude::*;
use std::io::Write;

pub struct DataExporter;

impl DataExporter {
    /// Build a DataFrame from `result`.
    ///
    /// Mean series: a `year` (Int32) or `label` (String) column followed by one
    /// Float64 column per entry of `value_columns`; missing averages are null.
    /// If a value column already uses the key's name, the key is prefixed
    /// with `_` until it is unique. Repeated value columns are written once.
    /// Five-number summaries: `entity`, `min`, `q1`, `median`, `q3`, `max`.
    pub fn to_dataframe(
        result: &AggregateResult,
        value_columns: &[String],
    ) -> PolarsResult<DataFrame> {
        match result.points.first() {
            None => Ok(DataFrame::default()),
            Some(AggregatePoint::Mean(_)) => {
                let points: Vec<&MeanPoint> = result.mean_points().collect();
                Self::mean_frame(&points, value_columns)
            }
            Some(AggregatePoint::FiveNumber(_)) => Self::five_number_frame(result),
        }
    }

    /// Write `df` as CSV with a header row.
    pub fn write_csv<W: Write>(df: &mut DataFrame, writer: W) -> PolarsResult<()> {
        CsvWriter::new(writer).include_header(true).finish(df)
    }

    fn mean_frame(points: &[&MeanPoint], value_columns: &[String]) -> PolarsResult<DataFrame> {
        let key_column = if points.iter().all(|p| matches!(p.key, PointKey::Year(_))) {
            let years: Vec<i32> = points
                .iter()
                .filter_map(|p| match p.key {
                    PointKey::Year(y) => Some(y),
                    PointKey::Label(_) => None,
                })
                .collect();
            Column::new(key_name("year", value_columns).into(), years)
        } else {
            let labels: Vec<String> = points
                .iter()
                .map(|p| match &p.key {
                    PointKey::Year(y) => y.to_string(),
                    PointKey::Label(l) => l.clone(),
                })
                .collect();
            Column::new(key_name("label", value_columns).into(), labels)
        };

        let mut columns = vec![key_column];
        for (i, name) in value_columns.iter().enumerate() {
            if value_columns[..i].contains(name) {
                continue;
            }
            let values: Vec<Option<f64>> = points.iter().map(|p| p.values.get(name).copied()).collect();
            columns.push(Column::new(name.as_str().into(), values));
        }

        DataFrame::new(columns)
    }

    fn five_number_frame(result: &AggregateResult) -> PolarsResult<DataFrame> {
        let mut entities: Vec<String> = Vec::new();
        let mut mins: Vec<f64> = Vec::new();
        let mut q1s: Vec<f64> = Vec::new();
        let mut medians: Vec<f64> = Vec::new();
        let mut q3s: Vec<f64> = Vec::new();
        let mut maxs: Vec<f64> = Vec::new();

        for point in result.five_number_points() {
            entities.push(point.entity.clone());
            mins.push(point.summary.min);
            q1s.push(point.summary.q1);
            medians.push(point.summary.median);
            q3s.push(point.summary.q3);
            maxs.push(point.summary.max);
        }

        DataFrame::new(vec![
            Column::new("entity".into(), entities),
            Column::new("min".into(), mins),
            Column::new("q1".into(), q1s),
            Column::new("median".into(), medians),
            Column::new("q3".into(), q3s),
            Column::new("max".into(), maxs),
        ])
    }
}

fn key_name(base: &str, value_columns: &[String]) -> String {
    let mut name = base.to_string();
    while value_columns.iter().any(|c| *c == name) {
        name.insert(0, '_');
    }
    name
}

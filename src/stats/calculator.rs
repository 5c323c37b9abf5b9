//! Statistics Calculator Module
//! Strict numeric coercion, date/range field decoding, running means and
//! the range-based five-number summary.

use serde::Serialize;
use thiserror::Error;

/// Why a field could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("`{0}` is not a finite number")]
    NotNumeric(String),
    #[error("expected 3 `-`-separated date parts, found {0}")]
    DatePartCount(usize),
    #[error("year `{0}` is not an integer")]
    BadYear(String),
    #[error("expected `<number> - <number>`, found {0} part(s)")]
    RangePartCount(usize),
    #[error("range endpoint `{0}` is not a number")]
    RangeEndpoint(String),
}

/// Five-number summary of a box-plot entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl FiveNumberSummary {
    /// Summary of a `[a, b]` range assuming values are spread uniformly
    /// across it: quartiles are linear interpolations between the endpoints,
    /// not order statistics of a sample.
    pub fn from_range(a: f64, b: f64) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        let spread = max - min;
        Self {
            min,
            q1: min + 0.25 * spread,
            median: min + 0.5 * spread,
            q3: min + 0.75 * spread,
            max,
        }
    }

    /// Whether `min <= q1 <= median <= q3 <= max` holds.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.q1 && self.q1 <= self.median && self.median <= self.q3 && self.q3 <= self.max
    }
}

/// Running `(sum, count)` pair. Only created with a first value, so
/// `count` is never zero.
///
/// An incremental mean is kept alongside the sum and used when the sum of
/// finite values overflows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningMean {
    sum: f64,
    count: usize,
    incremental: f64,
}

impl RunningMean {
    /// Start from the first contributing value.
    pub fn new(first: f64) -> Self {
        Self {
            sum: first,
            count: 1,
            incremental: first,
        }
    }

    /// Add one value.
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.incremental += (value - self.incremental) / self.count as f64;
    }

    /// Number of values folded so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// `sum / count`, or the incremental mean if the sum is no longer finite.
    pub fn mean(&self) -> f64 {
        if self.sum.is_finite() {
            self.sum / self.count as f64
        } else {
            self.incremental
        }
    }
}

/// Field decoding helpers shared by the aggregation modes.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Parse a whole field as a finite float. Partial numbers such as
    /// `"12abc"`, thousands separators, `NaN` and infinities are rejected.
    pub fn parse_number(raw: &str) -> Result<f64, FieldError> {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(FieldError::NotNumeric(trimmed.to_string())),
        }
    }

    /// Year of a `DD-MM-YYYY` date: the third `-`-separated token.
    ///
    /// Year-first dates are not detected; `2020-01-15` yields year 15.
    pub fn parse_year(raw: &str) -> Result<i32, FieldError> {
        let parts: Vec<&str> = raw.split('-').collect();
        if parts.len() != 3 {
            return Err(FieldError::DatePartCount(parts.len()));
        }
        let year = parts[2].trim();
        year.parse().map_err(|_| FieldError::BadYear(year.to_string()))
    }

    /// Split a `"<number> - <number>"` range into its two endpoints.
    ///
    /// A leading minus sign adds a part, so negative endpoints are rejected.
    pub fn parse_range(raw: &str) -> Result<(f64, f64), FieldError> {
        let parts: Vec<&str> = raw.split('-').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(FieldError::RangePartCount(parts.len()));
        }
        let endpoint = |s: &str| {
            Self::parse_number(s).map_err(|_| FieldError::RangeEndpoint(s.to_string()))
        };
        Ok((endpoint(parts[0])?, endpoint(parts[1])?))
    }

    /// Five-number summary of a range field.
    pub fn range_summary(raw: &str) -> Result<FiveNumberSummary, FieldError> {
        let (a, b) = Self::parse_range(raw)?;
        Ok(FiveNumberSummary::from_range(a, b))
    }
}

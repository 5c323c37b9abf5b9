//! Stats module - Numeric coercion and summaries

mod calculator;

pub use calculator::{FieldError, FiveNumberSummary, RunningMean, StatsCalculator};

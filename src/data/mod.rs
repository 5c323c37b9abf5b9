//! Data module - CSV parsing and aggregation

mod diagnostics;
mod loader;
mod processor;
mod record;
mod spec;

pub use diagnostics::{Diagnostic, DiagnosticCode};
pub use loader::{parse, DataLoader, ParseError, ParsedRecords};
pub use processor::{
    fold_year, AggregateResult, AggregatePoint, AggregationError, DataProcessor, FiveNumberPoint,
    MeanPoint, PointKey, YearBucket, YearBuckets,
};
pub use record::{RawRecord, Schema, SchemaError};
pub use spec::{AggregationMode, AggregationSpec, GroupKey, SpecError, PRESET_NAMES};

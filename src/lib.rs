//! Reservoir Dash - CSV aggregation pipeline
//!
//! Turns the dashboard's CSV datasets (reservoir levels, rainfall, population,
//! groundwater) into chart-ready series plus row-level diagnostics.

pub mod config;
pub mod data;
pub mod export;
pub mod pipeline;
pub mod stats;

pub use data::{
    AggregatePoint, AggregateResult, AggregationError, AggregationMode, AggregationSpec,
    DataLoader, DataProcessor, Diagnostic, DiagnosticCode, GroupKey, ParseError, RawRecord,
};
pub use pipeline::{DatasetStatus, Pipeline, PipelineError};

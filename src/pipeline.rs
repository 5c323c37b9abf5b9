//! Pipeline Module
//! Composes parsing and aggregation per dataset and maps the outcome onto
//! the loading / error / empty / ready states the dashboard renders.

use crate::data::{
    AggregatePoint, AggregateResult, AggregationError, AggregationSpec, DataLoader,
    DataProcessor, Diagnostic, ParseError, ParsedRecords,
};
use rayon::prelude::*;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, info_span, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

impl PipelineError {
    /// Code of the underlying parse or aggregation error.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Parse(e) => e.code(),
            PipelineError::Aggregation(e) => e.code(),
        }
    }
}

/// State of one dataset as seen by the rendering layer.
#[derive(Debug)]
pub enum DatasetStatus {
    /// Not run yet.
    Loading,
    /// Fatal parse or aggregation error.
    Failed(PipelineError),
    /// Input was processed but every row was skipped.
    NoValidData { diagnostics: Vec<Diagnostic> },
    Ready(AggregateResult),
}

impl DatasetStatus {
    /// State name as serialized: `loading`, `error`, `no-data` or `ready`.
    pub fn state(&self) -> &'static str {
        match self {
            DatasetStatus::Loading => "loading",
            DatasetStatus::Failed(_) => "error",
            DatasetStatus::NoValidData { .. } => "no-data",
            DatasetStatus::Ready(_) => "ready",
        }
    }

    /// Whether the dataset has finished processing, successfully or not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DatasetStatus::Loading)
    }

    /// Chart points, only when ready.
    pub fn points(&self) -> Option<&[AggregatePoint]> {
        match self {
            DatasetStatus::Ready(result) => Some(&result.points),
            _ => None,
        }
    }

    /// Row diagnostics of a finished run; empty while loading or on failure.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            DatasetStatus::Ready(result) => &result.diagnostics,
            DatasetStatus::NoValidData { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

impl Serialize for DatasetStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DatasetStatus::Loading => {
                let mut s = serializer.serialize_struct("DatasetStatus", 1)?;
                s.serialize_field("state", self.state())?;
                s.end()
            }
            DatasetStatus::Failed(err) => {
                let mut s = serializer.serialize_struct("DatasetStatus", 3)?;
                s.serialize_field("state", self.state())?;
                s.serialize_field("code", err.code())?;
                s.serialize_field("message", &err.to_string())?;
                s.end()
            }
            DatasetStatus::NoValidData { diagnostics } => {
                let mut s = serializer.serialize_struct("DatasetStatus", 3)?;
                s.serialize_field("state", self.state())?;
                s.serialize_field("message", "no valid data after processing")?;
                s.serialize_field("diagnostics", diagnostics)?;
                s.end()
            }
            DatasetStatus::Ready(result) => {
                let mut s = serializer.serialize_struct("DatasetStatus", 2)?;
                s.serialize_field("state", self.state())?;
                s.serialize_field("result", result)?;
                s.end()
            }
        }
    }
}

/// Where a dataset's text comes from.
#[derive(Debug, Clone)]
pub enum JobInput {
    Text(String),
    File(PathBuf),
}

/// One dataset to process.
#[derive(Debug, Clone)]
pub struct DatasetJob {
    pub name: String,
    pub input: JobInput,
    pub loader: DataLoader,
    pub spec: AggregationSpec,
}

/// Named outcome of a [`DatasetJob`].
#[derive(Debug, serde::Serialize)]
pub struct DatasetReport {
    pub name: String,
    #[serde(flatten)]
    pub status: DatasetStatus,
}

pub struct Pipeline;

impl Pipeline {
    /// Parse `text` and aggregate it with `spec`.
    pub fn run(text: &str, has_header: bool, spec: &AggregationSpec) -> DatasetStatus {
        Self::into_status(Self::try_run(DataLoader::new().with_header(has_header), text, spec))
    }

    /// Parse and aggregate, keeping fatal errors as `Err`.
    ///
    /// Parser diagnostics are merged with aggregation diagnostics, ordered by row.
    pub fn try_run(
        loader: DataLoader,
        text: &str,
        spec: &AggregationSpec,
    ) -> Result<AggregateResult, PipelineError> {
        let parsed = loader.parse(text)?;
        Self::finish(parsed, spec)
    }

    /// Run one job, reading its file if needed.
    pub fn run_job(job: &DatasetJob) -> DatasetStatus {
        let span = info_span!("dataset", name = %job.name);
        let _enter = span.enter();

        let outcome = match &job.input {
            JobInput::Text(text) => Self::try_run(job.loader, text, &job.spec),
            JobInput::File(path) => job
                .loader
                .load_csv(path)
                .map_err(PipelineError::from)
                .and_then(|parsed| Self::finish(parsed, &job.spec)),
        };
        Self::into_status(outcome)
    }

    /// Run independent datasets in parallel. Reports come back in job order.
    pub fn run_all(jobs: &[DatasetJob]) -> Vec<DatasetReport> {
        jobs.par_iter()
            .map(|job| DatasetReport {
                name: job.name.clone(),
                status: Self::run_job(job),
            })
            .collect()
    }

    fn finish(
        parsed: ParsedRecords,
        spec: &AggregationSpec,
    ) -> Result<AggregateResult, PipelineError> {
        let mut result = DataProcessor::aggregate(&parsed.records, spec)?;

        let mut diagnostics = parsed.diagnostics;
        diagnostics.append(&mut result.diagnostics);
        diagnostics.sort_by_key(|d| d.row);
        result.diagnostics = diagnostics;

        Ok(result)
    }

    fn into_status(outcome: Result<AggregateResult, PipelineError>) -> DatasetStatus {
        match outcome {
            Ok(result) if result.is_empty() => {
                warn!(
                    rows_in = result.rows_in,
                    diagnostics = result.diagnostics.len(),
                    "no valid data after processing"
                );
                DatasetStatus::NoValidData {
                    diagnostics: result.diagnostics,
                }
            }
            Ok(result) => {
                info!(
                    points = result.points.len(),
                    diagnostics = result.diagnostics.len(),
                    "dataset ready"
                );
                DatasetStatus::Ready(result)
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "dataset failed");
                DatasetStatus::Failed(err)
            }
        }
    }
}

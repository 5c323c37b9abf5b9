//! Dashboard manifest: which CSV files to load and how to aggregate each.

use crate::data::{AggregationSpec, DataLoader, PRESET_NAMES};
use crate::pipeline::{DatasetJob, JobInput};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub spec: Option<AggregationSpec>,
}

impl DatasetConfig {
    /// The effective spec: the inline one or the named preset.
    pub fn resolve_spec(&self) -> Result<AggregationSpec> {
        match (&self.preset, &self.spec) {
            (Some(_), Some(_)) => bail!("dataset `{}`: give either `preset` or `spec`, not both", self.name),
            (None, None) => bail!("dataset `{}`: one of `preset` or `spec` is required", self.name),
            (None, Some(spec)) => Ok(spec.clone()),
            (Some(preset), None) => AggregationSpec::preset(preset).with_context(|| {
                format!(
                    "dataset `{}`: unknown preset `{}` (known: {})",
                    self.name,
                    preset,
                    PRESET_NAMES.join(", ")
                )
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    pub datasets: Vec<DatasetConfig>,
    /// Directory relative dataset paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl DashboardConfig {
    /// Load a JSON manifest. Relative paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let mut config = Self::from_json(&text)
            .with_context(|| format!("invalid manifest {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        debug!(datasets = config.datasets.len(), base = %config.base_dir.display(), "loaded manifest");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        // Surface preset/spec mistakes before any file is read
        for dataset in &config.datasets {
            dataset.resolve_spec()?;
        }
        Ok(config)
    }

    /// Turn every dataset into a pipeline job.
    pub fn jobs(&self) -> Result<Vec<DatasetJob>> {
        self.datasets
            .iter()
            .map(|dataset| {
                Ok(DatasetJob {
                    name: dataset.name.clone(),
                    input: JobInput::File(self.base_dir.join(&dataset.path)),
                    loader: DataLoader::new().with_header(dataset.has_header),
                    spec: dataset.resolve_spec()?,
                })
            })
            .collect()
    }
}

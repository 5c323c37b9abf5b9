//! Reservoir Dash - command line host
//!
//! Reads dataset files, runs the aggregation pipeline and prints the results
//! for a renderer to pick up.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reservoir_dash::config::DashboardConfig;
use reservoir_dash::data::{AggregationSpec, DataLoader, PRESET_NAMES};
use reservoir_dash::export::DataExporter;
use reservoir_dash::pipeline::{DatasetJob, DatasetReport, DatasetStatus, JobInput, Pipeline};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
    Csv,
}

#[derive(Parser)]
#[command(name = "reservoir-dash")]
#[command(about = "Aggregate dashboard CSV datasets into chart-ready series")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a single CSV file
    Aggregate {
        file: PathBuf,
        /// Built-in spec to apply
        #[arg(long, conflicts_with = "spec", required_unless_present = "spec")]
        preset: Option<String>,
        /// JSON file holding an aggregation spec
        #[arg(long)]
        spec: Option<PathBuf>,
        /// Treat the first row as data; columns are named "0", "1", ...
        #[arg(long)]
        no_header: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Aggregate every dataset listed in a JSON manifest
    Dashboard {
        manifest: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// List the built-in presets
    Presets,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Aggregate {
            file,
            preset,
            spec,
            no_header,
            format,
        } => {
            let spec = match (preset, spec) {
                (Some(name), _) => AggregationSpec::preset(&name).with_context(|| {
                    format!("unknown preset `{name}` (known: {})", PRESET_NAMES.join(", "))
                })?,
                (None, Some(path)) => read_spec(&path)?,
                (None, None) => bail!("either --preset or --spec is required"),
            };
            let job = DatasetJob {
                name: file.display().to_string(),
                input: JobInput::File(file),
                loader: DataLoader::new().with_header(!no_header),
                spec,
            };
            let report = DatasetReport {
                name: job.name.clone(),
                status: Pipeline::run_job(&job),
            };
            let reports = [report];
            print_reports(&reports, std::slice::from_ref(&job), format)?;

            if let DatasetStatus::Failed(err) = &reports[0].status {
                bail!("{}: {} ({})", job.name, err, err.code());
            }
        }
        Commands::Dashboard { manifest, format } => {
            let config = DashboardConfig::load(&manifest)?;
            let jobs = config.jobs()?;
            info!(datasets = jobs.len(), "running dashboard");

            let reports = Pipeline::run_all(&jobs);
            print_reports(&reports, &jobs, format)?;
        }
        Commands::Presets => {
            for name in PRESET_NAMES {
                if let Some(spec) = AggregationSpec::preset(name) {
                    println!("{name}: {}", serde_json::to_string(&spec)?);
                }
            }
        }
    }

    Ok(())
}

fn read_spec(path: &Path) -> Result<AggregationSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read spec {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid spec {}", path.display()))
}

fn print_reports(reports: &[DatasetReport], jobs: &[DatasetJob], format: OutputFormat) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut out, reports)?;
        writeln!(out)?;
        return Ok(());
    }

    for (report, job) in reports.iter().zip(jobs) {
        match &report.status {
            DatasetStatus::Ready(result) => {
                let mut df = DataExporter::to_dataframe(result, &job.spec.value_columns)?;
                match format {
                    OutputFormat::Table => {
                        writeln!(out, "{} ({} diagnostics)", report.name, result.diagnostics.len())?;
                        writeln!(out, "{df}")?;
                    }
                    _ => {
                        writeln!(out, "# {}", report.name)?;
                        DataExporter::write_csv(&mut df, &mut out)?;
                    }
                }
            }
            DatasetStatus::Failed(err) => {
                writeln!(out, "# {}: error: {} ({})", report.name, err, err.code())?;
            }
            other => {
                writeln!(out, "# {}: {}", report.name, other.state())?;
            }
        }
    }

    Ok(())
}

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use catalog_scout_core::{
    observe, render_markdown_summary, run_pipeline_with_callback, write_catalog, ClassifierMode,
    OpenAiOracle, Oracle, OracleConfig, PipelineOptions, DEFAULT_CATALOG_PATH,
};
use clap::ArgAction;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "catalog-scout",
    version,
    about = "Classify project data files and generate a dataset catalog."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan the data directory and write a catalog YAML file.
    Generate(GenerateArgs),
    /// Show versioned datasets, uncatalogued files and possible model artifacts.
    Observe(ObserveArgs),
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum CliClassifierMode {
    Batch,
    #[value(name = "per-file", alias = "per_file")]
    PerFile,
    Disabled,
}

impl From<CliClassifierMode> for ClassifierMode {
    fn from(value: CliClassifierMode) -> Self {
        match value {
            CliClassifierMode::Batch => ClassifierMode::Batch,
            CliClassifierMode::PerFile => ClassifierMode::PerFile,
            CliClassifierMode::Disabled => ClassifierMode::Disabled,
        }
    }
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Root directory holding the project's data files.
    #[arg(long, default_value = "data", value_name = "DIR")]
    data_dir: PathBuf,

    /// Maximum traversal depth (root is depth 0).
    #[arg(long)]
    max_depth: Option<usize>,

    /// Exclude glob patterns (repeatable).
    #[arg(long = "exclude", value_name = "GLOB", num_args = 1.., action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Keep checkpoint, log and marker files instead of filtering them out.
    #[arg(long)]
    keep_noise: bool,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[command(flatten)]
    scan: ScanArgs,

    /// Output catalog path.
    #[arg(long, default_value = DEFAULT_CATALOG_PATH, value_name = "FILE")]
    output: PathBuf,

    /// Directory searched for nodes.py and pipeline.py files.
    #[arg(long, default_value = "src", value_name = "DIR")]
    source_dir: PathBuf,

    /// Do not embed project source in the model prompt.
    #[arg(long)]
    no_source_context: bool,

    /// How unresolved files are classified (`batch`, `per-file` or `disabled`).
    #[arg(long, default_value = "batch")]
    mode: CliClassifierMode,

    /// Model name sent to the completion endpoint.
    #[arg(long, default_value = catalog_scout_core::oracle::DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, default_value = catalog_scout_core::oracle::DEFAULT_BASE_URL)]
    base_url: String,

    /// Optional JSON run report output file.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Optional markdown summary output file.
    #[arg(long, value_name = "FILE")]
    md: Option<PathBuf>,

    /// Log pipeline phase events.
    #[arg(long)]
    progress: bool,
}

#[derive(Debug, Args)]
struct ObserveArgs {
    #[command(flatten)]
    scan: ScanArgs,

    /// Optional JSON output file.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => run_generate_command(args),
        Commands::Observe(args) => run_observe_command(args),
    }
}

fn run_generate_command(args: GenerateArgs) -> Result<()> {
    let GenerateArgs {
        scan,
        output,
        source_dir,
        no_source_context,
        mode,
        model,
        temperature,
        base_url,
        report,
        md,
        progress,
    } = args;

    let options = PipelineOptions {
        source_dir,
        use_source_context: !no_source_context,
        mode: mode.into(),
        oracle: OracleConfig {
            model,
            temperature,
            base_url,
            ..OracleConfig::default()
        },
        ..scan_options(scan)
    };

    let client = match options.mode {
        ClassifierMode::Disabled => None,
        _ => Some(
            OpenAiOracle::from_env(&options.oracle)
                .context("model classification needs credentials; pass --mode disabled to skip it")?,
        ),
    };
    let oracle = client.as_ref().map(|client| client as &dyn Oracle);

    let output_run = run_pipeline_with_callback(&options, oracle, |event| {
        if progress {
            info!(
                "phase {:?}: {} file(s), {} pending, {} warning(s)",
                event.phase, event.discovered_files, event.pending, event.warnings
            );
        }
    })?;
    let run_report = &output_run.report;

    write_catalog(&output_run.catalog, &output)?;
    println!("Catalog written to {}", output.display());
    println!(
        "Discovered {} file(s): {} catalogued, {} skipped, {} noise, {} versioned dataset(s).",
        run_report.metrics.discovered_files,
        run_report.metrics.catalog_entries,
        run_report.metrics.skipped,
        run_report.metrics.noise_filtered,
        run_report.metrics.versioned_datasets
    );
    if run_report.metrics.oracle_requested > 0 {
        println!(
            "Oracle resolved {}/{} entr(ies), {} uncertain.",
            run_report.metrics.oracle_resolved,
            run_report.metrics.oracle_requested,
            run_report.metrics.uncertain_replies
        );
    }
    for warning in &run_report.warnings {
        println!("Warning: {}", warning);
    }

    if let Some(report_path) = report {
        let payload =
            serde_json::to_string_pretty(run_report).context("failed to serialize report")?;
        fs::write(&report_path, payload)
            .with_context(|| format!("failed to write report to {}", report_path.display()))?;
        println!("Report written to {}", report_path.display());
    }

    if let Some(md_path) = md {
        let markdown = render_markdown_summary(run_report, &output_run.catalog);
        fs::write(&md_path, markdown).with_context(|| {
            format!("failed to write markdown summary to {}", md_path.display())
        })?;
        println!("Markdown summary written to {}", md_path.display());
    }

    Ok(())
}

fn run_observe_command(args: ObserveArgs) -> Result<()> {
    let observed = observe(&scan_options(args.scan))?;
    let payload =
        serde_json::to_string_pretty(&observed).context("failed to serialize observation")?;

    match args.output {
        Some(output) => {
            fs::write(&output, payload)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Observation written to {}", output.display());
        }
        None => println!("{payload}"),
    }

    Ok(())
}

fn scan_options(args: ScanArgs) -> PipelineOptions {
    PipelineOptions {
        data_dir: args.data_dir,
        max_depth: args.max_depth,
        excludes: args.exclude,
        filter_noise: !args.keep_noise,
        ..PipelineOptions::default()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{build_catalog, Catalog};
use crate::context::collect_source_context;
use crate::infer::{
    classify_batch, classify_per_file, colliding_names, EntryResolution, PendingEntry, Resolution,
};
use crate::layout::{analyze_layout, classify_versioned, observe_project};
use crate::model::{
    ClassificationResult, ClassifierMode, ObservedProject, PipelineEvent,
    PipelinePhase, ResolutionSource, RunMetrics, RunReport, REPORT_VERSION,
};
use crate::oracle::{Oracle, OracleConfig};
use crate::rules::classify_file;
use crate::scan::{scan_data_dir, ScanOptions};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub data_dir: PathBuf,
    pub source_dir: PathBuf,
    pub use_source_context: bool,
    pub mode: ClassifierMode,
    pub filter_noise: bool,
    pub max_depth: Option<usize>,
    pub excludes: Vec<String>,
    pub oracle: OracleConfig,
    pub run_id: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            source_dir: PathBuf::from("src"),
            use_source_context: true,
            mode: ClassifierMode::Batch,
            filter_noise: true,
            max_depth: None,
            excludes: Vec::new(),
            oracle: OracleConfig::default(),
            run_id: None,
        }
    }
}

impl PipelineOptions {
    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_depth: self.max_depth,
            excludes: self.excludes.clone(),
        }
    }
}

pub struct PipelineOutput {
    pub catalog: Catalog,
    pub report: RunReport,
}

pub fn run_pipeline(options: &PipelineOptions, oracle: Option<&dyn Oracle>) -> Result<PipelineOutput> {
    run_pipeline_with_callback(options, oracle, |_| {})
}

pub fn run_pipeline_with_callback<F>(
    options: &PipelineOptions,
    oracle: Option<&dyn Oracle>,
    mut on_event: F,
) -> Result<PipelineOutput>
where
    F: FnMut(PipelineEvent),
{
    let started = Instant::now();
    let run_id = options
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut warnings = Vec::new();
    let mut metrics = RunMetrics::default();
    let mut total_events = 0_u64;

    emit_event(
        &mut on_event,
        &run_id,
        &mut total_events,
        PipelinePhase::Scanning,
        0,
        0,
        0,
    );

    let files = scan_data_dir(&options.data_dir, &options.scan_options(), &mut warnings)?;
    metrics.discovered_files = files.len() as u64;

    emit_event(
        &mut on_event,
        &run_id,
        &mut total_events,
        PipelinePhase::AnalyzingLayout,
        metrics.discovered_files,
        0,
        warnings.len() as u64,
    );

    let analysis = analyze_layout(&files, options.filter_noise);
    let observed = observe_project(&analysis);
    metrics.noise_filtered = analysis.noise.len() as u64;
    metrics.plain_files = analysis.plain.len() as u64;
    metrics.versioned_datasets = analysis.versioned.len() as u64;
    for dataset in analysis.versioned.iter().filter(|dataset| dataset.possible_model) {
        info!("possible model artifact: {}", dataset.path);
    }

    emit_event(
        &mut on_event,
        &run_id,
        &mut total_events,
        PipelinePhase::ClassifyingRules,
        metrics.discovered_files,
        0,
        warnings.len() as u64,
    );

    let mut results = analysis
        .plain
        .iter()
        .map(classify_file)
        .chain(analysis.versioned.iter().map(classify_versioned))
        .collect::<Vec<_>>();
    metrics.rule_resolved = results.iter().filter(|result| !result.unresolved()).count() as u64;

    let pending_positions = results
        .iter()
        .enumerate()
        .filter(|(_, result)| result.unresolved())
        .map(|(position, _)| position)
        .collect::<Vec<_>>();
    let pending = pending_positions
        .iter()
        .map(|&position| PendingEntry::from_result(&results[position]))
        .collect::<Vec<_>>();

    emit_event(
        &mut on_event,
        &run_id,
        &mut total_events,
        PipelinePhase::QueryingOracle,
        metrics.discovered_files,
        pending.len() as u64,
        warnings.len() as u64,
    );

    if !pending.is_empty() {
        if options.mode != ClassifierMode::Disabled && oracle.is_some() {
            metrics.oracle_requested = pending.len() as u64;
        }
        let resolutions = query_oracle(options, oracle, &pending, &mut warnings);
        apply_resolutions(&mut results, &pending_positions, &resolutions, &mut metrics);
    }

    emit_event(
        &mut on_event,
        &run_id,
        &mut total_events,
        PipelinePhase::BuildingCatalog,
        metrics.discovered_files,
        results.iter().filter(|result| result.unresolved()).count() as u64,
        warnings.len() as u64,
    );

    let data_root = options.data_dir.to_string_lossy().to_string();
    let outcome = build_catalog(&results, &data_root);
    metrics.skipped = outcome.skipped.len() as u64;
    metrics.catalog_entries = outcome.catalog.len() as u64;
    metrics.overwritten_names = outcome.overwritten;

    info!(
        "catalog built: {} entr(ies), {} skipped, {} overwritten",
        metrics.catalog_entries, metrics.skipped, metrics.overwritten_names
    );

    emit_event(
        &mut on_event,
        &run_id,
        &mut total_events,
        PipelinePhase::Done,
        metrics.discovered_files,
        metrics.skipped,
        warnings.len() as u64,
    );

    metrics.elapsed_ms = started.elapsed().as_millis().try_into().unwrap_or(u64::MAX);

    let report = RunReport {
        report_version: REPORT_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        run_id,
        data_dir: data_root,
        classifier_mode: options.mode,
        metrics,
        observed,
        suggestions: outcome.suggestions,
        skipped: outcome.skipped,
        warnings,
    };

    Ok(PipelineOutput {
        catalog: outcome.catalog,
        report,
    })
}

pub fn observe(options: &PipelineOptions) -> Result<ObservedProject> {
    let mut warnings = Vec::new();
    let files = scan_data_dir(&options.data_dir, &options.scan_options(), &mut warnings)?;
    for warning in &warnings {
        warn!("{warning}");
    }
    Ok(observe_project(&analyze_layout(&files, options.filter_noise)))
}

fn query_oracle(
    options: &PipelineOptions,
    oracle: Option<&dyn Oracle>,
    pending: &[PendingEntry],
    warnings: &mut Vec<String>,
) -> Vec<EntryResolution> {
    if options.mode == ClassifierMode::Disabled {
        info!(
            "model classification disabled; {} entr(ies) stay unresolved",
            pending.len()
        );
        return Vec::new();
    }
    let Some(oracle) = oracle else {
        warnings.push(format!(
            "no oracle configured; {} entr(ies) left unresolved",
            pending.len()
        ));
        return Vec::new();
    };

    match options.mode {
        ClassifierMode::Batch => {
            for name in colliding_names(pending) {
                warn!(name = %name, "several pending files share one dataset name");
                warnings.push(format!(
                    "pending files share the dataset name '{name}'; one reply line types all of them"
                ));
            }
            let context = options
                .use_source_context
                .then(|| collect_source_context(&options.source_dir, warnings));
            match classify_batch(oracle, &options.oracle, pending, context.as_ref()) {
                Ok(resolutions) => resolutions,
                Err(err) => {
                    warn!("oracle classification failed: {err}");
                    warnings.push(format!(
                        "oracle classification failed: {err}; {} entr(ies) left unresolved",
                        pending.len()
                    ));
                    Vec::new()
                }
            }
        }
        ClassifierMode::PerFile => classify_per_file(oracle, &options.oracle, pending, warnings),
        ClassifierMode::Disabled => Vec::new(),
    }
}

fn apply_resolutions(
    results: &mut [ClassificationResult],
    positions: &[usize],
    resolutions: &[EntryResolution],
    metrics: &mut RunMetrics,
) {
    for (&position, entry) in positions.iter().zip(resolutions) {
        if matches!(entry.resolution, Resolution::Uncertain(_)) {
            metrics.uncertain_replies += 1;
        }
        if let Some(dataset_type) = entry.resolution.dataset_type() {
            results[position].resolve(dataset_type.to_string(), ResolutionSource::Oracle);
            metrics.oracle_resolved += 1;
        }
    }
}

fn emit_event<F>(
    on_event: &mut F,
    run_id: &str,
    total_events: &mut u64,
    phase: PipelinePhase,
    discovered_files: u64,
    pending: u64,
    warnings: u64,
) where
    F: FnMut(PipelineEvent),
{
    *total_events = total_events.saturating_add(1);

    on_event(PipelineEvent {
        seq: *total_events,
        run_id: run_id.to_string(),
        phase,
        discovered_files,
        pending,
        warnings,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    });
}

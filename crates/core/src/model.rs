use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub extension: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Rule,
    Oracle,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub relative_path: String,
    pub resolved_type: Option<String>,
    pub is_versioned: bool,
    pub source: ResolutionSource,
    /// File the per-file classifier samples; for versioned groups this is the
    /// first snapshot file rather than the representative directory.
    pub sample_path: Option<PathBuf>,
}

impl ClassificationResult {
    pub fn unresolved(&self) -> bool {
        self.resolved_type.is_none()
    }

    pub fn resolve(&mut self, dataset_type: String, source: ResolutionSource) {
        self.resolved_type = Some(dataset_type);
        self.source = source;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub dataset_type: String,
    pub filepath: String,
    pub versioned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionedDataset {
    pub path: String,
    pub snapshots: usize,
    pub latest_snapshot: Option<String>,
    pub members: Vec<String>,
    pub possible_model: bool,
    #[serde(skip)]
    pub sample_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ObservedProject {
    pub versioned_files: Vec<String>,
    pub uncatalogued_files: Vec<String>,
    pub possible_models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntrySuggestion {
    pub filepath: String,
    pub suggested_name: String,
    pub suggested_type: Option<String>,
    pub is_versioned: bool,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub report_version: String,
    pub generated_at: String,
    pub run_id: String,
    pub data_dir: String,
    pub classifier_mode: ClassifierMode,
    #[serde(default)]
    pub metrics: RunMetrics,
    #[serde(default)]
    pub observed: ObservedProject,
    #[serde(default)]
    pub suggestions: Vec<CatalogEntrySuggestion>,
    #[serde(default)]
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RunMetrics {
    #[serde(default)]
    pub discovered_files: u64,
    #[serde(default)]
    pub noise_filtered: u64,
    #[serde(default)]
    pub plain_files: u64,
    #[serde(default)]
    pub versioned_datasets: u64,
    #[serde(default)]
    pub rule_resolved: u64,
    #[serde(default)]
    pub oracle_requested: u64,
    #[serde(default)]
    pub oracle_resolved: u64,
    #[serde(default)]
    pub uncertain_replies: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub catalog_entries: u64,
    #[serde(default)]
    pub overwritten_names: u64,
    #[serde(default)]
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMode {
    #[default]
    Batch,
    #[serde(alias = "per-file")]
    PerFile,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineEvent {
    pub seq: u64,
    pub run_id: String,
    pub phase: PipelinePhase,
    pub discovered_files: u64,
    pub pending: u64,
    pub warnings: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Scanning,
    AnalyzingLayout,
    ClassifyingRules,
    QueryingOracle,
    BuildingCatalog,
    Done,
}

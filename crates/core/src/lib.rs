pub mod catalog;
pub mod context;
pub mod infer;
pub mod layout;
pub mod markdown;
pub mod model;
pub mod oracle;
pub mod pipeline;
pub mod rules;
pub mod scan;
pub mod writer;

pub use catalog::{build_catalog, dataset_name, BuildOutcome, Catalog};
pub use context::{collect_source_context, SourceContext, SourceFile};
pub use infer::{
    classify_batch, classify_per_file, parse_reply, reconcile, EntryResolution, PendingEntry,
    Resolution, KNOWN_DATASET_TYPES,
};
pub use layout::{analyze_layout, observe_project, LayoutAnalysis};
pub use markdown::render_markdown_summary;
pub use model::{
    CatalogEntry, CatalogEntrySuggestion, ClassificationResult, ClassifierMode, DiscoveredFile,
    ObservedProject, PipelineEvent, PipelinePhase, ResolutionSource, RunMetrics,
    RunReport, VersionedDataset, REPORT_VERSION,
};
pub use oracle::{
    ChatMessage, OpenAiOracle, Oracle, OracleConfig, OracleError, OracleRequest, Role,
};
pub use pipeline::{observe, run_pipeline, run_pipeline_with_callback, PipelineOptions, PipelineOutput};
pub use rules::{classify_file, dataset_type_for_extension};
pub use scan::{scan_data_dir, ScanOptions};
pub use writer::{read_catalog, render_catalog, write_catalog, DEFAULT_CATALOG_PATH};

use crate::catalog::Catalog;
use crate::model::{ClassifierMode, ResolutionSource, RunReport};

pub fn render_markdown_summary(report: &RunReport, catalog: &Catalog) -> String {
    let mut out = String::new();
    out.push_str("# Catalog Scout Summary\n\n");
    out.push_str(&format!(
        "- Report version: `{}`\n- Generated at: `{}`\n- Run id: `{}`\n- Data directory: `{}`\n- Classifier: `{}`\n- Elapsed: `{} ms`\n\n",
        report.report_version,
        report.generated_at,
        report.run_id,
        report.data_dir,
        mode_label(report.classifier_mode),
        report.metrics.elapsed_ms
    ));

    let metrics = &report.metrics;
    out.push_str("## Classification\n\n");
    out.push_str(&format!(
        "- Files discovered: {}\n- Noise filtered: {}\n- Plain files: {}\n- Versioned datasets: {}\n- Resolved by extension: {}\n- Sent to oracle: {}\n- Resolved by oracle: {}\n- Uncertain replies kept: {}\n- Skipped: {}\n- Overwritten names: {}\n\n",
        metrics.discovered_files,
        metrics.noise_filtered,
        metrics.plain_files,
        metrics.versioned_datasets,
        metrics.rule_resolved,
        metrics.oracle_requested,
        metrics.oracle_resolved,
        metrics.uncertain_replies,
        metrics.skipped,
        metrics.overwritten_names
    ));

    out.push_str("## Catalog\n\n");
    if catalog.is_empty() {
        out.push_str("No catalog entries generated.\n\n");
    } else {
        out.push_str("| Name | Type | Filepath | Versioned |\n|---|---|---|---|\n");
        for entry in catalog.iter() {
            out.push_str(&format!(
                "| `{}` | `{}` | `{}` | {} |\n",
                entry.name,
                entry.dataset_type,
                entry.filepath,
                if entry.versioned { "yes" } else { "" }
            ));
        }
        out.push('\n');
    }

    let oracle_typed = report
        .suggestions
        .iter()
        .filter(|suggestion| suggestion.source == ResolutionSource::Oracle)
        .collect::<Vec<_>>();
    if !oracle_typed.is_empty() {
        out.push_str("## Oracle Classifications\n\n");
        for suggestion in oracle_typed {
            out.push_str(&format!(
                "- `{}` -> `{}`\n",
                suggestion.filepath,
                suggestion.suggested_type.as_deref().unwrap_or("")
            ));
        }
        out.push('\n');
    }

    if !report.observed.possible_models.is_empty() {
        out.push_str("## Possible Model Artifacts\n\n");
        for path in &report.observed.possible_models {
            out.push_str(&format!("- `{}`\n", path));
        }
        out.push('\n');
    }

    if !report.skipped.is_empty() {
        out.push_str("## Skipped\n\n");
        for path in &report.skipped {
            out.push_str(&format!("- `{}`\n", path));
        }
        out.push('\n');
    }

    if !report.warnings.is_empty() {
        out.push_str("## Warnings\n\n");
        for warning in &report.warnings {
            out.push_str(&format!("- {}\n", warning));
        }
    }

    out
}

fn mode_label(mode: ClassifierMode) -> &'static str {
    match mode {
        ClassifierMode::Batch => "batch",
        ClassifierMode::PerFile => "per_file",
        ClassifierMode::Disabled => "disabled",
    }
}

#[cfg(test)]
mod tests {
    use super::render_markdown_summary;
    use crate::catalog::Catalog;
    use crate::model::{
        CatalogEntry, CatalogEntrySuggestion, ClassifierMode, ObservedProject, ResolutionSource,
        RunMetrics, RunReport,
    };

    fn report() -> RunReport {
        RunReport {
            report_version: "1.0.0".to_string(),
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            run_id: "run-1".to_string(),
            data_dir: "data".to_string(),
            classifier_mode: ClassifierMode::Batch,
            metrics: RunMetrics {
                discovered_files: 3,
                skipped: 1,
                ..RunMetrics::default()
            },
            observed: ObservedProject {
                possible_models: vec!["models/regressor".to_string()],
                ..ObservedProject::default()
            },
            suggestions: vec![CatalogEntrySuggestion {
                filepath: "data/raw/events.jsonl".to_string(),
                suggested_name: "events".to_string(),
                suggested_type: Some("pandas.JSONDataset".to_string()),
                is_versioned: false,
                source: ResolutionSource::Oracle,
            }],
            skipped: vec!["raw/blob.bin".to_string()],
            warnings: vec!["source directory src not found".to_string()],
        }
    }

    #[test]
    fn summary_lists_entries_and_diagnostics() {
        let catalog = vec![CatalogEntry {
            name: "readings".to_string(),
            dataset_type: "pandas.CSVDataset".to_string(),
            filepath: "data/raw/readings".to_string(),
            versioned: true,
        }]
        .into_iter()
        .collect::<Catalog>();

        let markdown = render_markdown_summary(&report(), &catalog);

        assert!(markdown.contains("- Classifier: `batch`"));
        assert!(markdown.contains("| `readings` | `pandas.CSVDataset` | `data/raw/readings` | yes |"));
        assert!(markdown.contains("- `data/raw/events.jsonl` -> `pandas.JSONDataset`"));
        assert!(markdown.contains("## Possible Model Artifacts\n\n- `models/regressor`"));
        assert!(markdown.contains("## Skipped\n\n- `raw/blob.bin`"));
        assert!(markdown.contains("## Warnings\n\n- source directory src not found"));
    }

    #[test]
    fn empty_catalog_is_called_out() {
        let markdown = render_markdown_summary(&report(), &Catalog::new());
        assert!(markdown.contains("No catalog entries generated."));
    }
}

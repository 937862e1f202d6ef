use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::model::{ClassificationResult, DiscoveredFile, ResolutionSource};

pub const CSV_DATASET: &str = "pandas.CSVDataset";
pub const PARQUET_DATASET: &str = "pandas.ParquetDataset";
pub const EXCEL_DATASET: &str = "pandas.ExcelDataset";
pub const XML_DATASET: &str = "pandas.XMLDataset";
pub const YAML_DATASET: &str = "yaml.YAMLDataset";

static EXTENSION_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (".csv", CSV_DATASET),
        (".parquet", PARQUET_DATASET),
        (".xlsx", EXCEL_DATASET),
        (".xls", EXCEL_DATASET),
        (".xml", XML_DATASET),
        (".yaml", YAML_DATASET),
        (".yml", YAML_DATASET),
    ])
});

/// Returns the fixed dataset type for an extension such as `.CSV` or `csv`.
pub fn dataset_type_for_extension(extension: &str) -> Option<&'static str> {
    let lowered = extension.to_lowercase();
    let key = if lowered.starts_with('.') {
        lowered
    } else {
        format!(".{lowered}")
    };
    EXTENSION_TYPES.get(key.as_str()).copied()
}

pub fn dataset_type_for_path(relative_path: &str) -> Option<&'static str> {
    let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(index) => dataset_type_for_extension(&file_name[index..]),
    }
}

pub fn classify_file(file: &DiscoveredFile) -> ClassificationResult {
    let resolved_type = dataset_type_for_extension(&file.extension).map(str::to_string);
    let source = if resolved_type.is_some() {
        ResolutionSource::Rule
    } else {
        ResolutionSource::None
    };
    ClassificationResult {
        relative_path: file.relative_path.clone(),
        resolved_type,
        is_versioned: false,
        source,
        sample_path: Some(file.absolute_path.clone()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{
        classify_file, dataset_type_for_extension, dataset_type_for_path,
        CSV_DATASET, EXCEL_DATASET, YAML_DATASET,
    };
    use crate::model::{DiscoveredFile, ResolutionSource};

    #[test]
    fn extension_lookup_ignores_case() {
        assert_eq!(dataset_type_for_extension(".CSV"), Some(CSV_DATASET));
        assert_eq!(dataset_type_for_extension("csv"), Some(CSV_DATASET));
        assert_eq!(dataset_type_for_extension(".Xls"), Some(EXCEL_DATASET));
        assert_eq!(dataset_type_for_extension(".yml"), Some(YAML_DATASET));
        assert_eq!(dataset_type_for_extension(".pkl"), None);
        assert_eq!(dataset_type_for_extension(""), None);
    }

    #[test]
    fn path_lookup_uses_final_segment() {
        assert_eq!(dataset_type_for_path("raw/report.CSV"), Some(CSV_DATASET));
        assert_eq!(dataset_type_for_path("raw.csv/readings"), None);
        assert_eq!(dataset_type_for_path("raw/.csv"), None);
    }

    #[test]
    fn classify_file_marks_rule_source() {
        let file = DiscoveredFile {
            absolute_path: PathBuf::from("data/raw/report.CSV"),
            relative_path: "raw/report.CSV".to_string(),
            extension: ".csv".to_string(),
        };
        let result = classify_file(&file);
        assert_eq!(result.resolved_type.as_deref(), Some(CSV_DATASET));
        assert_eq!(result.source, ResolutionSource::Rule);
        assert!(!result.is_versioned);

        let unknown = DiscoveredFile {
            extension: ".pkl".to_string(),
            ..file
        };
        let result = classify_file(&unknown);
        assert!(result.unresolved());
        assert_eq!(result.source, ResolutionSource::None);
    }
}

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::model::{CatalogEntry, CatalogEntrySuggestion, ClassificationResult};

/// Insertion-ordered catalog. Re-inserting a name replaces the entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: CatalogEntry) -> Option<CatalogEntry> {
        match self.index.get(&entry.name) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position], entry)),
            None => {
                self.index.insert(entry.name.clone(), self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.index
            .get(name)
            .and_then(|&position| self.entries.get(position))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CatalogEntry> for Catalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for entry in iter {
            catalog.insert(entry);
        }
        catalog
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    pub catalog: Catalog,
    pub suggestions: Vec<CatalogEntrySuggestion>,
    pub skipped: Vec<String>,
    pub overwritten: u64,
}

pub fn dataset_name(relative_path: &str) -> String {
    Path::new(relative_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| relative_path.to_lowercase())
}

pub fn catalog_filepath(data_root: &str, relative_path: &str) -> String {
    let root = data_root.replace('\\', "/");
    let root = root.trim_end_matches('/');
    let relative = relative_path.replace('\\', "/");
    if root.is_empty() {
        relative
    } else {
        format!("{root}/{relative}")
    }
}

pub fn build_catalog(results: &[ClassificationResult], data_root: &str) -> BuildOutcome {
    let mut outcome = BuildOutcome::default();

    for result in results {
        let name = dataset_name(&result.relative_path);
        let filepath = catalog_filepath(data_root, &result.relative_path);
        outcome.suggestions.push(CatalogEntrySuggestion {
            filepath: filepath.clone(),
            suggested_name: name.clone(),
            suggested_type: result.resolved_type.clone(),
            is_versioned: result.is_versioned,
            source: result.source,
        });

        let Some(dataset_type) = result.resolved_type.clone() else {
            info!(
                "skipped: could not determine dataset type for {}",
                result.relative_path
            );
            outcome.skipped.push(result.relative_path.clone());
            continue;
        };

        let replaced = outcome.catalog.insert(CatalogEntry {
            name,
            dataset_type,
            filepath,
            versioned: result.is_versioned,
        });
        if let Some(previous) = replaced {
            debug!(name = %previous.name, previous = %previous.filepath, "catalog name overwritten");
            outcome.overwritten += 1;
        }
    }

    outcome
}

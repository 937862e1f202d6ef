use std::path::Path;

use anyhow::{anyhow, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::model::DiscoveredFile;

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub max_depth: Option<usize>,
    pub excludes: Vec<String>,
}

pub fn scan_data_dir(
    root: &Path,
    options: &ScanOptions,
    warnings: &mut Vec<String>,
) -> Result<Vec<DiscoveredFile>> {
    if !root.is_dir() {
        return Err(anyhow!("data directory not found: {}", root.display()));
    }

    let excludes = ExcludeMatcher::new(&options.excludes, warnings);
    let mut walker = WalkDir::new(root).follow_links(false);
    if let Some(depth) = options.max_depth {
        walker = walker.max_depth(depth);
    }
    let iter = walker.into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        !excludes.is_excluded(&normalize_relative(relative))
    });

    let mut files = Vec::new();
    for item in iter {
        let entry = item.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
        let relative_path = normalize_relative(relative);
        debug!(path = %relative_path, "discovered file");

        files.push(DiscoveredFile {
            absolute_path: path.to_path_buf(),
            relative_path,
            extension: extension_of(path),
        });
    }

    info!("scan complete: {} file(s) under {}", files.len(), root.display());
    Ok(files)
}

pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub fn normalize_relative(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Exclude patterns tested against the `/`-separated path relative to the data root.
/// Patterns without glob syntax match as case-insensitive fragments.
struct ExcludeMatcher {
    globs: Option<GlobSet>,
    fragments: Vec<String>,
}

impl ExcludeMatcher {
    fn new(patterns: &[String], warnings: &mut Vec<String>) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut glob_count = 0usize;
        let mut fragments = Vec::new();

        for pattern in patterns.iter().map(|pattern| pattern.trim()) {
            if pattern.is_empty() {
                continue;
            }
            if !has_glob_syntax(pattern) {
                fragments.push(pattern.to_lowercase());
                continue;
            }
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    glob_count += 1;
                }
                Err(err) => {
                    warn!(pattern, %err, "exclude glob rejected");
                    warnings.push(format!(
                        "exclude pattern '{pattern}' is not a valid glob ({err}); matching it as text"
                    ));
                    fragments.push(pattern.to_lowercase());
                }
            }
        }

        let globs = if glob_count == 0 {
            None
        } else {
            match builder.build() {
                Ok(set) => Some(set),
                Err(err) => {
                    warnings.push(format!("exclude globs disabled: {err}"));
                    None
                }
            }
        };

        Self { globs, fragments }
    }

    fn is_excluded(&self, relative_path: &str) -> bool {
        if self
            .globs
            .as_ref()
            .is_some_and(|globs| globs.is_match(relative_path))
        {
            return true;
        }
        if self.fragments.is_empty() {
            return false;
        }
        let lowered = relative_path.to_lowercase();
        self.fragments
            .iter()
            .any(|fragment| lowered.contains(fragment.as_str()))
    }
}

fn has_glob_syntax(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']', '{', '}'])
}

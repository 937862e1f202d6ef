use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::scan::normalize_relative;

pub const CONTEXT_FILE_NAMES: &[&str] = &["nodes.py", "pipeline.py"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFile {
    pub relative_path: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceContext {
    pub files: Vec<SourceFile>,
}

impl SourceContext {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            out.push_str(&format!("# File: {}\n", file.relative_path));
            out.push_str(&file.content);
            if !file.content.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

pub fn collect_source_context(root: &Path, warnings: &mut Vec<String>) -> SourceContext {
    let mut context = SourceContext::default();
    if !root.is_dir() {
        warnings.push(format!(
            "source directory {} not found; classifying without project source",
            root.display()
        ));
        return context;
    }

    for item in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                warnings.push(format!("walk error under {}: {}", root.display(), err));
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_context_file(entry.file_name().to_str()) {
            continue;
        }

        let path = entry.path();
        match fs::read_to_string(path) {
            Ok(content) => {
                let relative = path.strip_prefix(root).unwrap_or(path);
                debug!(path = %path.display(), "embedding source file");
                context.files.push(SourceFile {
                    relative_path: normalize_relative(relative),
                    content,
                });
            }
            Err(err) => {
                warn!("skipping unreadable source file {}: {}", path.display(), err);
                warnings.push(format!("failed to read {}: {}", path.display(), err));
            }
        }
    }

    context
}

fn is_context_file(name: Option<&str>) -> bool {
    name.is_some_and(|name| CONTEXT_FILE_NAMES.contains(&name))
}

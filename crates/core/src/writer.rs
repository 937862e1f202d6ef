use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::catalog::Catalog;
use crate::model::CatalogEntry;

pub const DEFAULT_CATALOG_PATH: &str = "conf/base/auto_catalog.yml";

// Plain scalars a YAML 1.1 loader reads as booleans or null.
const YAML11_RESERVED: &[&str] = &[
    "y", "Y", "yes", "Yes", "YES", "n", "N", "no", "No", "NO", "true", "True", "TRUE", "false",
    "False", "FALSE", "on", "On", "ON", "off", "Off", "OFF", "~", "null", "Null", "NULL",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct CatalogRecord {
    #[serde(rename = "type")]
    dataset_type: String,
    filepath: String,
    #[serde(default, skip_serializing_if = "is_false")]
    versioned: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl From<&CatalogEntry> for CatalogRecord {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            dataset_type: entry.dataset_type.clone(),
            filepath: entry.filepath.clone(),
            versioned: entry.versioned,
        }
    }
}

fn render_block(entry: &CatalogEntry) -> Result<String> {
    let record = serde_yaml::to_value(CatalogRecord::from(entry))
        .with_context(|| format!("failed to serialize catalog entry {}", entry.name))?;
    let mut block = Mapping::new();
    block.insert(Value::String(entry.name.clone()), record);
    let text = serde_yaml::to_string(&block)
        .with_context(|| format!("failed to serialize catalog entry {}", entry.name))?;

    if YAML11_RESERVED.contains(&entry.name.as_str()) {
        if let Some(body) = text.strip_prefix(&format!("{}:", entry.name)) {
            return Ok(format!("'{}':{body}", entry.name));
        }
    }
    Ok(text)
}

/// Renders one single-key block per entry, separated by blank lines.
pub fn render_catalog(catalog: &Catalog) -> Result<String> {
    let mut out = String::new();
    for (position, entry) in catalog.iter().enumerate() {
        if position > 0 {
            out.push('\n');
        }
        out.push_str(&render_block(entry)?);
    }
    Ok(out)
}

/// Streams blocks straight to the file; a failure part-way leaves it truncated.
pub fn write_catalog(catalog: &Catalog, output_path: impl AsRef<Path>) -> Result<()> {
    let path = output_path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for (position, entry) in catalog.iter().enumerate() {
        if position > 0 {
            writer.write_all(b"\n")?;
        }
        writer
            .write_all(render_block(entry)?.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn parse_catalog(text: &str) -> Result<Catalog> {
    let mut catalog = Catalog::new();
    if text.trim().is_empty() {
        return Ok(catalog);
    }

    let mapping: Mapping = serde_yaml::from_str(text).context("failed to parse catalog YAML")?;
    for (key, value) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| anyhow!("catalog key is not a string: {key:?}"))?
            .to_string();
        let record: CatalogRecord = serde_yaml::from_value(value)
            .with_context(|| format!("invalid catalog entry {name}"))?;
        catalog.insert(CatalogEntry {
            name,
            dataset_type: record.dataset_type,
            filepath: record.filepath,
            versioned: record.versioned,
        });
    }
    Ok(catalog)
}

pub fn read_catalog(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_catalog(&text).with_context(|| format!("failed to parse {}", path.display()))
}

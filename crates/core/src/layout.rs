use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::model::{
    ClassificationResult, DiscoveredFile, ObservedProject, ResolutionSource, VersionedDataset,
};
use crate::rules::{dataset_type_for_extension, dataset_type_for_path};

pub const NOISE_PATTERNS: &[&str] = &[
    "_versions",
    "checkpoint",
    "SUCCESS",
    ".ipynb_checkpoints",
    ".DS_Store",
    ".trash",
    "metadata",
    ".log",
];

const MODEL_HINTS: &[&str] = &["model", "regressor"];

// `0` marks a digit position, every other byte is literal.
const TIMESTAMP_SHAPE: &[u8] = b"0000-00-00T00.00.00.000Z";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H.%M.%S%.3fZ";

#[derive(Debug, Clone, Default)]
pub struct LayoutAnalysis {
    pub plain: Vec<DiscoveredFile>,
    pub versioned: Vec<VersionedDataset>,
    pub noise: Vec<String>,
}

pub fn analyze_layout(files: &[DiscoveredFile], filter_noise: bool) -> LayoutAnalysis {
    let mut analysis = LayoutAnalysis::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for file in files {
        if filter_noise && is_noise(&file.relative_path) {
            debug!(path = %file.relative_path, "noise path filtered");
            analysis.noise.push(file.relative_path.clone());
            continue;
        }

        let Some((representative, snapshot)) = split_versioned(&file.relative_path) else {
            analysis.plain.push(file.clone());
            continue;
        };

        let slot = *index.entry(representative.clone()).or_insert_with(|| {
            analysis.versioned.push(VersionedDataset {
                possible_model: is_possible_model(&representative),
                path: representative.clone(),
                snapshots: 0,
                latest_snapshot: None,
                members: Vec::new(),
                sample_path: Some(file.absolute_path.clone()),
            });
            analysis.versioned.len() - 1
        });

        let dataset = &mut analysis.versioned[slot];
        if !dataset
            .members
            .iter()
            .any(|member| snapshot_of(member) == Some(snapshot))
        {
            dataset.snapshots += 1;
        }
        dataset.members.push(file.relative_path.clone());
        if is_later_snapshot(snapshot, dataset.latest_snapshot.as_deref()) {
            dataset.latest_snapshot = Some(snapshot.to_string());
        }
    }

    analysis
}

pub fn is_noise(relative_path: &str) -> bool {
    relative_path
        .split('/')
        .any(|segment| segment.starts_with("._"))
        || NOISE_PATTERNS
            .iter()
            .any(|pattern| relative_path.contains(pattern))
}

pub fn is_timestamp_segment(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == TIMESTAMP_SHAPE.len()
        && bytes
            .iter()
            .zip(TIMESTAMP_SHAPE)
            .all(|(byte, shape)| match shape {
                b'0' => byte.is_ascii_digit(),
                literal => byte == literal,
            })
}

/// Splits `<dataset>/<timestamp>/<rest>` into the dataset path and the
/// timestamp segment.
pub fn split_versioned(relative_path: &str) -> Option<(String, &str)> {
    let segments = relative_path.split('/').collect::<Vec<_>>();
    if segments.len() < 3 {
        return None;
    }
    (1..segments.len() - 1)
        .find(|&position| is_timestamp_segment(segments[position]))
        .map(|position| (segments[..position].join("/"), segments[position]))
}

pub fn is_possible_model(path: &str) -> bool {
    let lowered = path.to_lowercase();
    MODEL_HINTS.iter().any(|hint| lowered.contains(hint))
}

pub fn parse_snapshot(segment: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(segment, TIMESTAMP_FORMAT).ok()
}

fn snapshot_of(relative_path: &str) -> Option<&str> {
    split_versioned(relative_path).map(|(_, snapshot)| snapshot)
}

fn is_later_snapshot(candidate: &str, current: Option<&str>) -> bool {
    let Some(candidate_time) = parse_snapshot(candidate) else {
        return false;
    };
    match current.and_then(parse_snapshot) {
        Some(current_time) => candidate_time > current_time,
        None => true,
    }
}

/// Versioned datasets are typed from the representative path itself, so a
/// `readings.csv/<timestamp>/readings.csv` layout resolves by rule. When the
/// representative carries no extension every snapshot member must agree.
pub fn classify_versioned(dataset: &VersionedDataset) -> ClassificationResult {
    let resolved_type = dataset_type_for_path(&dataset.path)
        .or_else(|| shared_member_type(&dataset.members))
        .map(str::to_string);
    let source = if resolved_type.is_some() {
        ResolutionSource::Rule
    } else {
        ResolutionSource::None
    };
    ClassificationResult {
        relative_path: dataset.path.clone(),
        resolved_type,
        is_versioned: true,
        source,
        sample_path: dataset.sample_path.clone(),
    }
}

fn shared_member_type(members: &[String]) -> Option<&'static str> {
    let mut types = members.iter().map(|member| {
        let name = member.rsplit('/').next().unwrap_or(member);
        match name.rfind('.') {
            Some(0) | None => None,
            Some(index) => dataset_type_for_extension(&name[index..]),
        }
    });
    let first = types.next()??;
    types.all(|other| other == Some(first)).then_some(first)
}

pub fn observe_project(analysis: &LayoutAnalysis) -> ObservedProject {
    ObservedProject {
        versioned_files: analysis
            .versioned
            .iter()
            .map(|dataset| dataset.path.clone())
            .collect(),
        uncatalogued_files: analysis
            .plain
            .iter()
            .filter(|file| dataset_type_for_extension(&file.extension).is_none())
            .map(|file| file.relative_path.clone())
            .collect(),
        possible_models: analysis
            .versioned
            .iter()
            .filter(|dataset| dataset.possible_model)
            .map(|dataset| dataset.path.clone())
            .collect(),
    }
}

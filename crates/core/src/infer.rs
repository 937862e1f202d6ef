use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::catalog::dataset_name;
use crate::context::SourceContext;
use crate::layout::NOISE_PATTERNS;
use crate::model::ClassificationResult;
use crate::oracle::{ChatMessage, Oracle, OracleConfig, OracleError, OracleRequest};

pub const KNOWN_DATASET_TYPES: &[&str] = &[
    "api.APIDataset",
    "biosequence.BioSequenceDataset",
    "dask.CSVDataset",
    "dask.ParquetDataset",
    "databricks.ManagedTableDataset",
    "email.EmailMessageDataset",
    "geopandas.GenericDataset",
    "holoviews.HoloviewsWriter",
    "huggingface.HFDataset",
    "huggingface.HFTransformerPipelineDataset",
    "ibis.FileDataset",
    "ibis.TableDataset",
    "json.JSONDataset",
    "matlab.MatlabDataset",
    "matplotlib.MatplotlibDataset",
    "matplotlib.MatplotlibWriter",
    "networkx.GMLDataset",
    "networkx.GraphMLDataset",
    "networkx.JSONDataset",
    "openxlml.DocxDataset",
    "pandas.CSVDataset",
    "pandas.DeltaTableDataset",
    "pandas.ExcelDataset",
    "pandas.FeatherDataset",
    "pandas.GBQTableDataset",
    "pandas.HDFDataset",
    "pandas.JSONDataset",
    "pandas.ParquetDataset",
    "pandas.SQLTableDataset",
    "pandas.SQLQueryDataset",
    "pandas.XMLDataset",
    "partitions.IncrementalDataset",
    "partitions.PartitionedDataset",
    "pillow.ImageDataset",
    "pickle.PickleDataset",
    "plotly.HTMLDataset",
    "plotly.JSONDataset",
    "plotly.PlotlyDataset",
    "polars.CSVDataset",
    "polars.EagerPolarsDataset",
    "polars.LazyPolarsDataset",
    "redis.PickleDataset",
    "snowflake.SnowparkTableDataset",
    "spark.SparkDataset",
    "spark.SparkHiveDataset",
    "spark.SparkJDBCDataset",
    "spark.SparkStreamingDataset",
    "svmlight.SVMLightDataset",
    "tensorflow.TensorFlowModelDataset",
    "text.TextDataset",
    "yaml.YAMLDataset",
];

/// Replies that signal the model is guessing. They are logged, not dropped.
pub const HEDGE_WORDS: &[&str] = &["unknown", "?", "none", "unsure", "null"];

const NO_RESULT_SENTINELS: &[&str] = &["null", "SKIP"];
const SAMPLE_LINES: usize = 5;
const SAMPLE_BYTE_LIMIT: u64 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub name: String,
    pub relative_path: String,
    pub sample_path: Option<PathBuf>,
}

impl PendingEntry {
    pub fn from_result(result: &ClassificationResult) -> Self {
        Self {
            name: dataset_name(&result.relative_path),
            relative_path: result.relative_path.clone(),
            sample_path: result.sample_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    Uncertain(String),
    /// The model answered with a `null`/`SKIP` sentinel.
    NoResult,
    /// No line for this entry appeared in the reply.
    Missing,
}

impl Resolution {
    pub fn dataset_type(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(value) | Resolution::Uncertain(value) => Some(value.as_str()),
            Resolution::NoResult | Resolution::Missing => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryResolution {
    pub name: String,
    pub relative_path: String,
    pub resolution: Resolution,
}

/// Names carried by more than one pending entry, in first-seen order.
pub fn colliding_names(entries: &[PendingEntry]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.name.as_str()).or_insert(0) += 1;
    }

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let shared = counts.get(entry.name.as_str()).is_some_and(|&count| count > 1);
        if shared && !names.contains(&entry.name) {
            names.push(entry.name.clone());
        }
    }
    names
}

pub fn build_batch_request(
    config: &OracleConfig,
    entries: &[PendingEntry],
    context: Option<&SourceContext>,
) -> OracleRequest {
    let mut user = String::from("Entries:\n");
    for entry in entries {
        user.push_str(&format!("{}: {}\n", entry.name, entry.relative_path));
    }

    if let Some(context) = context.filter(|context| !context.is_empty()) {
        user.push_str("\nProject source (pipeline and node definitions):\n\n");
        user.push_str(&context.render());
    }

    OracleRequest::new(
        config,
        vec![ChatMessage::system(batch_instructions()), ChatMessage::user(user)],
    )
}

fn batch_instructions() -> String {
    let mut text = String::from(
        "You are an expert in the Kedro framework. You will receive data file entries, one per line, \
         formatted as `name: relative/path`.\n\n\
         Return one line per entry formatted as `name: dataset_type`, keeping the name exactly as given. \
         Every entry must receive a line.\n\n\
         dataset_type must be one of:\n",
    );
    for label in KNOWN_DATASET_TYPES {
        text.push_str(&format!("- {label}\n"));
    }
    text.push_str(&format!(
        "\nIf an entry is not a dataset, answer `null` or `SKIP` for it. Ignore entries whose path contains any of: {}, or whose file name starts with `._`.\n",
        NOISE_PATTERNS.join(", ")
    ));
    text.push_str(
        "Project source may follow the entries; use it to see how each dataset is loaded. \
         Do not include explanations.",
    );
    text
}

/// Parses `name: value` lines. Splits on the first colon only; lines without a
/// colon or with an empty name are skipped, and a repeated name keeps the last
/// value. Sentinel values map to `None`.
pub fn parse_reply(reply: &str) -> HashMap<String, Option<String>> {
    let mut parsed = HashMap::new();
    for line in reply.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, raw_type)) = line.split_once(':') else {
            debug!(line, "reply line without colon skipped");
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let raw_type = raw_type.trim();
        let value = if NO_RESULT_SENTINELS.contains(&raw_type) {
            None
        } else {
            Some(raw_type.to_string())
        };
        parsed.insert(name.to_string(), value);
    }
    parsed
}

pub fn is_hedge(value: &str) -> bool {
    HEDGE_WORDS
        .iter()
        .any(|word| value.eq_ignore_ascii_case(word))
}

pub fn reconcile(
    entries: &[PendingEntry],
    parsed: &HashMap<String, Option<String>>,
) -> Vec<EntryResolution> {
    let requested = entries
        .iter()
        .map(|entry| entry.name.as_str())
        .collect::<Vec<_>>();
    for name in parsed.keys() {
        if !requested.contains(&name.as_str()) {
            debug!(name = %name, "reply named an entry that was not requested");
        }
    }

    entries
        .iter()
        .map(|entry| {
            let resolution = match parsed.get(&entry.name) {
                None => {
                    info!("no classification returned for {}", entry.relative_path);
                    Resolution::Missing
                }
                Some(None) => {
                    info!("model declined to classify {}", entry.relative_path);
                    Resolution::NoResult
                }
                Some(Some(value)) if is_hedge(value) => {
                    warn!(
                        "uncertain classification for {}: {:?}; keeping it",
                        entry.relative_path, value
                    );
                    Resolution::Uncertain(value.clone())
                }
                Some(Some(value)) => Resolution::Resolved(value.clone()),
            };
            EntryResolution {
                name: entry.name.clone(),
                relative_path: entry.relative_path.clone(),
                resolution,
            }
        })
        .collect()
}

/// One round trip for every pending entry.
pub fn classify_batch(
    oracle: &dyn Oracle,
    config: &OracleConfig,
    entries: &[PendingEntry],
    context: Option<&SourceContext>,
) -> Result<Vec<EntryResolution>, OracleError> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }
    let request = build_batch_request(config, entries, context);
    info!("asking oracle to classify {} entr(ies)", entries.len());
    let reply = oracle.complete(&request)?;
    debug!(reply = %reply, "oracle reply");
    Ok(reconcile(entries, &parse_reply(&reply)))
}

pub fn build_file_request(config: &OracleConfig, file_name: &str, sample: &str) -> OracleRequest {
    let mut prompt = String::from(
        "You are an expert in the Kedro framework.\n\n\
         You will receive a file name and a sample of its contents. Infer the most appropriate Kedro \
         dataset type for loading this file.\n\nKedro dataset types include:\n",
    );
    for label in KNOWN_DATASET_TYPES {
        prompt.push_str(&format!("    {label}\n"));
    }
    prompt.push_str(
        "\nIf the file looks like real data (text, structured, binary), return the most appropriate \
         dataset class on a single line. If it clearly is not data (e.g. .gitkeep, README), return `SKIP`.\n\
         Do not include explanations. Return only the class name or `SKIP`.\n\n---\n",
    );
    prompt.push_str(&format!(
        "Filename: {file_name}\n\nSample content:\n{sample}\n---\n"
    ));
    OracleRequest::new(config, vec![ChatMessage::user(prompt)])
}

pub fn normalize_file_reply(reply: &str) -> Option<String> {
    let normalized = reply.to_lowercase().replace('`', "");
    let normalized = normalized.trim();
    if normalized.contains("skip") || normalized.contains("none") {
        return None;
    }
    if normalized.contains('.') && normalized.contains("dataset") {
        return Some(
            reply
                .trim()
                .trim_matches(|ch| ch == '`' || ch == ' ')
                .to_string(),
        );
    }
    None
}

pub fn read_sample(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let reader = BufReader::new(file.take(SAMPLE_BYTE_LIMIT));
    let mut sample = String::new();
    for line in reader.split(b'\n').take(SAMPLE_LINES) {
        sample.push_str(&String::from_utf8_lossy(&line?));
        sample.push('\n');
    }
    Ok(sample)
}

/// One round trip per entry, sampling file contents. Failures for a single
/// entry never abort the pass.
pub fn classify_per_file(
    oracle: &dyn Oracle,
    config: &OracleConfig,
    entries: &[PendingEntry],
    warnings: &mut Vec<String>,
) -> Vec<EntryResolution> {
    entries
        .iter()
        .map(|entry| {
            let resolution = match classify_one(oracle, config, entry) {
                Ok(Some(dataset_type)) => Resolution::Resolved(dataset_type),
                Ok(None) => Resolution::NoResult,
                Err(message) => {
                    warn!("oracle fallback failed for {}: {}", entry.relative_path, message);
                    warnings.push(format!(
                        "oracle fallback failed for {}: {}",
                        entry.relative_path, message
                    ));
                    Resolution::NoResult
                }
            };
            EntryResolution {
                name: entry.name.clone(),
                relative_path: entry.relative_path.clone(),
                resolution,
            }
        })
        .collect()
}

fn classify_one(
    oracle: &dyn Oracle,
    config: &OracleConfig,
    entry: &PendingEntry,
) -> Result<Option<String>, String> {
    let path = entry
        .sample_path
        .as_deref()
        .ok_or_else(|| "no file to sample".to_string())?;
    let sample = read_sample(path).map_err(|err| err.to_string())?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| entry.name.clone());

    let request = build_file_request(config, &file_name, &sample);
    let reply = oracle.complete(&request).map_err(|err| err.to_string())?;
    info!("oracle inference for {file_name} -> {reply:?}");
    Ok(normalize_file_reply(&reply))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::{
        build_batch_request, classify_batch, classify_per_file, colliding_names,
        normalize_file_reply, parse_reply, read_sample, reconcile, PendingEntry, Resolution,
        KNOWN_DATASET_TYPES,
    };
    use crate::context::{SourceContext, SourceFile};
    use crate::oracle::{Oracle, OracleConfig, OracleError, OracleRequest, Role};

    struct ScriptedOracle {
        replies: RefCell<VecDeque<Result<String, OracleError>>>,
        requests: RefCell<Vec<OracleRequest>>,
    }

    impl ScriptedOracle {
        fn new(replies: Vec<Result<String, OracleError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Oracle for ScriptedOracle {
        fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
            self.requests.borrow_mut().push(request.clone());
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(OracleError::EmptyCompletion))
        }
    }

    fn pending(name: &str) -> PendingEntry {
        PendingEntry {
            name: name.to_string(),
            relative_path: format!("raw/{name}.bin"),
            sample_path: None,
        }
    }

    #[test]
    fn absent_and_null_lines_leave_entries_unresolved() {
        let entries = vec![pending("alpha"), pending("beta"), pending("gamma")];
        let parsed = parse_reply("alpha: pandas.CSVDataset\nbeta: null\n");
        let resolutions = reconcile(&entries, &parsed);

        assert_eq!(
            resolutions[0].resolution,
            Resolution::Resolved("pandas.CSVDataset".to_string())
        );
        assert_eq!(resolutions[1].resolution, Resolution::NoResult);
        assert_eq!(resolutions[2].resolution, Resolution::Missing);
        assert!(resolutions[1].resolution.dataset_type().is_none());
        assert!(resolutions[2].resolution.dataset_type().is_none());
    }

    #[test]
    fn hedge_words_are_kept_as_uncertain() {
        let entries = vec![pending("alpha"), pending("beta"), pending("gamma")];
        let parsed = parse_reply("alpha: Unknown\nbeta: NULL\ngamma: ?\n");
        let resolutions = reconcile(&entries, &parsed);

        assert_eq!(
            resolutions[0].resolution,
            Resolution::Uncertain("Unknown".to_string())
        );
        assert_eq!(
            resolutions[1].resolution,
            Resolution::Uncertain("NULL".to_string())
        );
        assert_eq!(resolutions[2].resolution.dataset_type(), Some("?"));
    }

    #[test]
    fn reply_parsing_splits_on_first_colon_only() {
        let parsed = parse_reply(
            "  alpha :  pandas.CSVDataset  \nno colon here\n: orphan\nbeta: s3://bucket:key\nalpha: text.TextDataset\ngamma: SKIP\n",
        );

        assert_eq!(
            parsed.get("alpha"),
            Some(&Some("text.TextDataset".to_string()))
        );
        assert_eq!(
            parsed.get("beta"),
            Some(&Some("s3://bucket:key".to_string()))
        );
        assert_eq!(parsed.get("gamma"), Some(&None));
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn labels_outside_vocabulary_are_accepted() {
        let entries = vec![pending("alpha")];
        let resolutions = reconcile(&entries, &parse_reply("alpha: custom.MyDataset"));
        assert_eq!(
            resolutions[0].resolution,
            Resolution::Resolved("custom.MyDataset".to_string())
        );
        assert!(!KNOWN_DATASET_TYPES.contains(&"custom.MyDataset"));
    }

    #[test]
    fn batch_request_lists_entries_and_appends_context() {
        let config = OracleConfig::default();
        let context = SourceContext {
            files: vec![SourceFile {
                relative_path: "pipelines/ingest/nodes.py".to_string(),
                content: "def load():\n    pass\n".to_string(),
            }],
        };
        let request = build_batch_request(
            &config,
            &[pending("alpha"), pending("beta")],
            Some(&context),
        );

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("pandas.ParquetDataset"));
        assert!(request.messages[0].content.contains("SKIP"));
        let user = &request.messages[1].content;
        assert!(user.contains("alpha: raw/alpha.bin\nbeta: raw/beta.bin\n"));
        assert!(user.contains("# File: pipelines/ingest/nodes.py\ndef load():"));
        assert_eq!(request.temperature, 0.0);
    }

    #[test]
    fn batch_makes_exactly_one_call() {
        let oracle = ScriptedOracle::new(vec![Ok("alpha: pickle.PickleDataset".to_string())]);
        let entries = vec![pending("alpha"), pending("beta")];
        let resolutions = classify_batch(&oracle, &OracleConfig::default(), &entries, None)
            .expect("batch succeeds");

        assert_eq!(oracle.requests.borrow().len(), 1);
        assert_eq!(resolutions[0].resolution.dataset_type(), Some("pickle.PickleDataset"));
        assert_eq!(resolutions[1].resolution, Resolution::Missing);
    }

    #[test]
    fn batch_skips_the_call_when_nothing_is_pending() {
        let oracle = ScriptedOracle::new(Vec::new());
        let resolutions =
            classify_batch(&oracle, &OracleConfig::default(), &[], None).expect("no-op");
        assert!(resolutions.is_empty());
        assert!(oracle.requests.borrow().is_empty());
    }

    #[test]
    fn batch_propagates_oracle_errors() {
        let oracle = ScriptedOracle::new(vec![Err(OracleError::Transport {
            message: "connection refused".to_string(),
        })]);
        let result = classify_batch(&oracle, &OracleConfig::default(), &[pending("alpha")], None);
        assert!(matches!(result, Err(OracleError::Transport { .. })));
    }

    #[test]
    fn file_reply_normalization() {
        assert_eq!(
            normalize_file_reply("`pandas.JSONDataset`"),
            Some("pandas.JSONDataset".to_string())
        );
        assert_eq!(normalize_file_reply("SKIP"), None);
        assert_eq!(normalize_file_reply("None"), None);
        assert_eq!(normalize_file_reply("I think it is a spreadsheet"), None);
    }

    #[test]
    fn sample_reads_first_five_lines() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("events.jsonl");
        fs::write(&path, "1\n2\n3\n4\n5\n6\n7\n").expect("write sample");

        let sample = read_sample(&path).expect("sample");
        assert_eq!(sample, "1\n2\n3\n4\n5\n");
    }

    #[test]
    fn per_file_mode_degrades_each_failure_to_no_result() {
        let temp = TempDir::new().expect("tempdir");
        let json_path = temp.path().join("events.jsonl");
        fs::write(&json_path, "{\"a\": 1}\n").expect("write json");
        let readme_path = temp.path().join("README");
        fs::write(&readme_path, "notes\n").expect("write readme");

        let entries = vec![
            PendingEntry {
                name: "events".to_string(),
                relative_path: "raw/events.jsonl".to_string(),
                sample_path: Some(json_path),
            },
            PendingEntry {
                name: "readme".to_string(),
                relative_path: "README".to_string(),
                sample_path: Some(readme_path),
            },
            PendingEntry {
                name: "gone".to_string(),
                relative_path: "raw/gone.bin".to_string(),
                sample_path: Some(PathBuf::from("/definitely/not/here.bin")),
            },
            PendingEntry {
                name: "broken".to_string(),
                relative_path: "raw/broken.dat".to_string(),
                sample_path: Some(temp.path().join("events.jsonl")),
            },
        ];
        let oracle = ScriptedOracle::new(vec![
            Ok("pandas.JSONDataset".to_string()),
            Ok("SKIP".to_string()),
            Err(OracleError::EmptyCompletion),
        ]);

        let mut warnings = Vec::new();
        let resolutions =
            classify_per_file(&oracle, &OracleConfig::default(), &entries, &mut warnings);

        assert_eq!(
            resolutions[0].resolution,
            Resolution::Resolved("pandas.JSONDataset".to_string())
        );
        assert_eq!(resolutions[1].resolution, Resolution::NoResult);
        assert_eq!(resolutions[2].resolution, Resolution::NoResult);
        assert_eq!(resolutions[3].resolution, Resolution::NoResult);
        // the unreadable file never reaches the oracle
        assert_eq!(oracle.requests.borrow().len(), 3);
        assert_eq!(warnings.len(), 2);
        assert!(oracle.requests.borrow()[0].messages[0]
            .content
            .contains("Filename: events.jsonl"));
    }

    #[test]
    fn shared_stems_are_reported_once() {
        let entries = ["raw/events.jsonl", "raw/blob.bin", "raw/Events.dat", "old/events.x"]
            .into_iter()
            .map(|path| PendingEntry {
                name: crate::catalog::dataset_name(path),
                relative_path: path.to_string(),
                sample_path: None,
            })
            .collect::<Vec<_>>();

        assert_eq!(colliding_names(&entries), vec!["events".to_string()]);
        assert!(colliding_names(&entries[..2]).is_empty());
    }
}

//! Request Log Loading
//!
//! Reads request logs in JSONL format, one request per line:
//!
//! ```json
//! {"timestamp": "2024-05-01T10:00:03.120Z", "input_tokens": 812, "output_tokens": 240}
//! ```
//!
//! Accepted variants:
//! - `time` or `created_at` instead of `timestamp`, as a string or a Unix epoch. When a
//!   record carries several, `timestamp` wins over `time`, which wins over `created_at`
//! - `prompt_tokens` / `completion_tokens` or `inputTokens` / `outputTokens`, at the top level
//!   or under `usage`, with the same first-present preference
//! - optional `model` and `model_version` (or `modelVersion`) used for per-model analysis
//! - `prompt` / `completion` text when counts are missing; tokens are then estimated at
//!   four characters per token and the request is marked as estimated
//!
//! Malformed lines are skipped and counted rather than failing the load.

use crate::models::Request;
use crate::timestamp_parser::TimestampParser;
use anyhow::{Context, Result};
use glob::glob;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CHARS_PER_TOKEN: u64 = 4;

// Every spelling is its own field: serde aliases reject a record that carries two of them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRequest {
    timestamp: Option<serde_json::Value>,
    time: Option<serde_json::Value>,
    created_at: Option<serde_json::Value>,
    #[serde(flatten)]
    tokens: RawTokens,
    usage: Option<RawTokens>,
    prompt: Option<String>,
    completion: Option<String>,
    model: Option<String>,
    model_version: Option<String>,
    #[serde(rename = "modelVersion")]
    model_version_camel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTokens {
    input_tokens: Option<u64>,
    prompt_tokens: Option<u64>,
    #[serde(rename = "inputTokens")]
    input_tokens_camel: Option<u64>,
    output_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    #[serde(rename = "outputTokens")]
    output_tokens_camel: Option<u64>,
}

impl RawRequest {
    fn timestamp(&self) -> Option<&serde_json::Value> {
        self.timestamp
            .as_ref()
            .or(self.time.as_ref())
            .or(self.created_at.as_ref())
    }
}

impl RawTokens {
    fn input(&self) -> Option<u64> {
        self.input_tokens
            .or(self.prompt_tokens)
            .or(self.input_tokens_camel)
    }

    fn output(&self) -> Option<u64> {
        self.output_tokens
            .or(self.completion_tokens)
            .or(self.output_tokens_camel)
    }
}

/// Counters describing what a load kept and what it dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadStats {
    pub files: usize,
    pub lines: usize,
    pub loaded: usize,
    pub estimated: usize,
    #[serde(rename = "malformedLines")]
    pub malformed_lines: usize,
    #[serde(rename = "badTimestamps")]
    pub bad_timestamps: usize,
    #[serde(rename = "missingTokens")]
    pub missing_tokens: usize,
}

impl LoadStats {
    pub fn skipped(&self) -> usize {
        self.malformed_lines + self.bad_timestamps + self.missing_tokens
    }

    fn merge(&mut self, other: &LoadStats) {
        self.files += other.files;
        self.lines += other.lines;
        self.loaded += other.loaded;
        self.estimated += other.estimated;
        self.malformed_lines += other.malformed_lines;
        self.bad_timestamps += other.bad_timestamps;
        self.missing_tokens += other.missing_tokens;
    }
}

enum LineOutcome {
    Request(Request),
    Malformed,
    BadTimestamp,
    MissingTokens,
}

pub struct RequestLogParser;

impl Default for RequestLogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLogParser {
    pub fn new() -> Self {
        Self
    }

    /// Expand file paths and glob patterns into a sorted, de-duplicated file list.
    pub fn resolve_inputs(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for pattern in patterns {
            let literal = Path::new(pattern);
            if literal.is_file() {
                files.push(literal.to_path_buf());
                continue;
            }

            let matches = glob(pattern).with_context(|| format!("Invalid input pattern: {}", pattern))?;
            let before = files.len();
            files.extend(matches.flatten().filter(|p| p.is_file()));

            if files.len() == before {
                warn!(pattern = %pattern, "Input pattern matched no files");
            }
        }

        files.sort();
        files.dedup();

        if files.is_empty() {
            anyhow::bail!("No request log files found for: {}", patterns.join(", "));
        }

        Ok(files)
    }

    /// Load every request from the files matched by `patterns`.
    pub fn load(&self, patterns: &[String]) -> Result<(Vec<Request>, LoadStats)> {
        let files = self.resolve_inputs(patterns)?;
        let mut requests = Vec::new();
        let mut stats = LoadStats::default();

        for file in &files {
            let (mut file_requests, file_stats) = self.parse_file(file)?;
            requests.append(&mut file_requests);
            stats.merge(&file_stats);
        }

        info!(
            files = stats.files,
            loaded = stats.loaded,
            estimated = stats.estimated,
            skipped = stats.skipped(),
            "Loaded request logs"
        );

        Ok((requests, stats))
    }

    pub fn parse_file(&self, file_path: &Path) -> Result<(Vec<Request>, LoadStats)> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open request log: {}", file_path.display()))?;
        let reader = BufReader::new(file);

        let mut requests = Vec::new();
        let mut stats = LoadStats {
            files: 1,
            ..LoadStats::default()
        };

        for (index, line) in reader.lines().enumerate() {
            let line = line
                .with_context(|| format!("Failed to read {}", file_path.display()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            stats.lines += 1;

            match Self::parse_line(line) {
                LineOutcome::Request(request) => {
                    if request.token_source == crate::models::TokenSource::Estimated {
                        stats.estimated += 1;
                    }
                    stats.loaded += 1;
                    requests.push(request);
                }
                LineOutcome::Malformed => {
                    debug!(file = %file_path.display(), line = index + 1, "Skipping malformed line");
                    stats.malformed_lines += 1;
                }
                LineOutcome::BadTimestamp => {
                    debug!(file = %file_path.display(), line = index + 1, "Skipping unparsable timestamp");
                    stats.bad_timestamps += 1;
                }
                LineOutcome::MissingTokens => {
                    debug!(file = %file_path.display(), line = index + 1, "Skipping line without token counts");
                    stats.missing_tokens += 1;
                }
            }
        }

        if stats.skipped() > 0 {
            warn!(
                file = %file_path.display(),
                malformed = stats.malformed_lines,
                bad_timestamps = stats.bad_timestamps,
                missing_tokens = stats.missing_tokens,
                "Skipped unusable lines"
            );
        }

        Ok((requests, stats))
    }

    fn parse_line(line: &str) -> LineOutcome {
        let Ok(raw) = serde_json::from_str::<RawRequest>(line) else {
            return LineOutcome::Malformed;
        };
        let Some(raw_timestamp) = raw.timestamp() else {
            return LineOutcome::Malformed;
        };

        let Ok(timestamp) = TimestampParser::parse_value(raw_timestamp) else {
            return LineOutcome::BadTimestamp;
        };

        let usage_input = raw.usage.as_ref().and_then(RawTokens::input);
        let usage_output = raw.usage.as_ref().and_then(RawTokens::output);
        let input = raw.tokens.input().or(usage_input);
        let output = raw.tokens.output().or(usage_output);

        let mut request = match (input, output) {
            (Some(input), Some(output)) => Request::new(timestamp, input, output),
            (None, None) if raw.prompt.is_none() && raw.completion.is_none() => {
                return LineOutcome::MissingTokens;
            }
            _ => {
                let input = input.unwrap_or_else(|| estimate_tokens(raw.prompt.as_deref()));
                let output = output.unwrap_or_else(|| estimate_tokens(raw.completion.as_deref()));
                Request::estimated(timestamp, input, output)
            }
        };

        request.model = raw.model;
        request.model_version = raw.model_version.or(raw.model_version_camel);
        LineOutcome::Request(request)
    }
}

/// Rough token count for text when the log carries no counts.
pub fn estimate_tokens(text: Option<&str>) -> u64 {
    let chars = text.map(|t| t.chars().count() as u64).unwrap_or(0);
    chars.div_ceil(CHARS_PER_TOKEN)
}

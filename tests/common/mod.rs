#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ptu_planner::Request;
use std::fs;
use std::path::{Path, PathBuf};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

/// Timestamp `minute` minutes and `second` seconds after [`t0`].
pub fn at(minute: i64, second: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minute) + Duration::seconds(second)
}

pub fn request(minute: i64, second: i64, input: u64, output: u64) -> Request {
    Request::new(at(minute, second), input, output)
}

pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-9 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}

pub fn create_test_jsonl(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// One JSONL line per request, in the plain log format. Model fields are written when set.
pub fn to_jsonl(requests: &[Request]) -> String {
    requests
        .iter()
        .map(|r| {
            let mut line = serde_json::json!({
                "timestamp": r.timestamp.to_rfc3339(),
                "input_tokens": r.input_tokens,
                "output_tokens": r.output_tokens,
            });
            if let Some(model) = &r.model {
                line["model"] = model.clone().into();
            }
            if let Some(version) = &r.model_version {
                line["model_version"] = version.clone().into();
            }
            line.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `count` requests one minute apart for `model`, starting at `first_minute`.
pub fn model_requests(model: &str, first_minute: i64, count: i64, input: u64, output: u64) -> Vec<Request> {
    (first_minute..first_minute + count)
        .map(|m| request(m, 0, input, output).with_model(model))
        .collect()
}

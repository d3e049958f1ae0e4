use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};

/// Naive layouts accepted when no offset is present; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Epoch values above this are taken as milliseconds (year 2286 in seconds).
const EPOCH_MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// Handles parsing timestamps from the formats found in request logs
pub struct TimestampParser;

impl TimestampParser {
    /// Parse a timestamp string into a DateTime<Utc>
    /// Handles Z suffix, explicit offsets, naive ISO layouts and Unix epochs
    pub fn parse(timestamp_str: &str) -> Result<DateTime<Utc>> {
        let trimmed = timestamp_str.trim();

        let timestamp = if trimmed.ends_with('Z') || trimmed.ends_with('z') {
            format!("{}+00:00", &trimmed[..trimmed.len() - 1])
        } else {
            trimmed.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&timestamp) {
            return Ok(dt.with_timezone(&Utc));
        }

        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&timestamp, format) {
                return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
            }
        }

        if let Ok(epoch) = trimmed.parse::<i64>() {
            return Self::from_epoch(epoch);
        }

        anyhow::bail!("Failed to parse timestamp: {}", timestamp_str)
    }

    /// Parse a JSON timestamp, either a string or a numeric Unix epoch
    pub fn parse_value(value: &serde_json::Value) -> Result<DateTime<Utc>> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(epoch) => Self::from_epoch(epoch),
                None => match n.as_f64() {
                    Some(secs) if secs.is_finite() => {
                        Self::from_epoch_millis((secs * 1000.0).round() as i64)
                    }
                    _ => anyhow::bail!("Failed to parse timestamp: {}", n),
                },
            },
            other => anyhow::bail!("Unsupported timestamp value: {}", other),
        }
    }

    fn from_epoch(epoch: i64) -> Result<DateTime<Utc>> {
        if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
            Self::from_epoch_millis(epoch)
        } else {
            DateTime::from_timestamp(epoch, 0)
                .ok_or_else(|| anyhow::anyhow!("Timestamp out of range: {}", epoch))
        }
    }

    fn from_epoch_millis(millis: i64) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| anyhow::anyhow!("Timestamp out of range: {}", millis))
    }
}

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One structured log record. Written to stderr as a single JSON line.
#[derive(Clone, Debug, Serialize)]
pub struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: u64,
    #[serde(rename = "timestampIso")]
    pub timestamp_iso: String,
    pub level: LogLevel,
    pub event: String,
    #[serde(rename = "matchId", skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick: Option<u64>,
    pub details: Value,
}

/// Fields shared by every line a run emits.
#[derive(Clone, Debug, Default)]
pub struct LogContext {
    pub match_id: Option<String>,
    pub seed: Option<u32>,
}

impl LogContext {
    pub fn new(match_id: impl Into<String>) -> Self {
        Self {
            match_id: Some(match_id.into()),
            seed: None,
        }
    }

    pub fn with_seed(&self, seed: u32) -> Self {
        Self {
            match_id: self.match_id.clone(),
            seed: Some(seed),
        }
    }
}

pub fn build_log_line(
    context: &LogContext,
    level: LogLevel,
    event: &str,
    tick: Option<u64>,
    details: Value,
    timestamp_ms: u64,
) -> StructuredLogLine {
    StructuredLogLine {
        timestamp_ms,
        timestamp_iso: iso_timestamp(timestamp_ms),
        level,
        event: event.to_string(),
        match_id: context.match_id.clone(),
        seed: context.seed,
        tick,
        details,
    }
}

pub fn emit_log(
    context: &LogContext,
    level: LogLevel,
    event: &str,
    tick: Option<u64>,
    details: Value,
) {
    let line = build_log_line(context, level, event, tick, details, now_ms());
    match serde_json::to_string(&line) {
        Ok(text) => eprintln!("{text}"),
        Err(error) => eprintln!("[log] failed to serialize {event}: {error}"),
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn iso_timestamp(timestamp_ms: u64) -> String {
    let millis = i64::try_from(timestamp_ms).unwrap_or(i64::MAX);
    match Utc.timestamp_millis_opt(millis).single() {
        Some(time) => time.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn iso_timestamp_uses_utc_millis() {
        assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(iso_timestamp(1_500), "1970-01-01T00:00:01.500Z");
    }

    #[test]
    fn log_line_serializes_camel_case_and_skips_missing_fields() {
        let context = LogContext::new("sim-1-2");
        let line = build_log_line(
            &context,
            LogLevel::Warn,
            "anomaly_detected",
            None,
            json!({ "message": "x" }),
            1_000,
        );
        let value = serde_json::to_value(&line).expect("log line should serialize");
        assert_eq!(value["level"], "warn");
        assert_eq!(value["matchId"], "sim-1-2");
        assert_eq!(value["timestampMs"], 1_000);
        assert!(value.get("seed").is_none());
        assert!(value.get("tick").is_none());
        assert_eq!(value["details"]["message"], "x");
    }

    #[test]
    fn context_with_seed_keeps_match_id() {
        let context = LogContext::new("run").with_seed(7);
        let line = build_log_line(&context, LogLevel::Info, "match_started", Some(3), json!({}), 0);
        assert_eq!(line.seed, Some(7));
        assert_eq!(line.tick, Some(3));
        assert_eq!(line.match_id.as_deref(), Some("run"));
    }
}

//! Structured JSONL logging for a replay run: one [`LogEntry`] per
//! interesting event, written through a [`LogEmitter`] to stdout or to the
//! file named by `PIPEWARM_LOG_FILE`.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use pipewarm_model::{EntryTag, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One JSONL record. Required fields mirror the teacher's structured-log
/// contract (`timestamp`, `trace_id`, `level`, `event`); the rest are
/// replay-specific and omitted from the line when absent.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            tag: None,
            hash: None,
            root_hash: None,
            outcome: None,
            latency_ns: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: EntryTag) -> Self {
        self.tag = Some(tag.as_str().to_string());
        self
    }

    #[must_use]
    pub fn with_hash(mut self, hash: impl std::fmt::Display) -> Self {
        self.hash = Some(hash.to_string());
        self
    }

    #[must_use]
    pub fn with_root_hash(mut self, hash: impl std::fmt::Display) -> Self {
        self.root_hash = Some(hash.to_string());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome.as_str().to_string());
        self
    }

    #[must_use]
    pub fn with_latency_ns(mut self, ns: u64) -> Self {
        self.latency_ns = Some(ns);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Tallies reported in the one summary `LogEntry` emitted at the end of a
/// run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunSummary {
    pub roots_created: u32,
    pub roots_invalid: u32,
    pub entries_created: u32,
    pub entries_invalid: u32,
}

/// Writes one JSONL line per `emit` call, auto-numbering `trace_id`.
///
/// `PIPEWARM_LOG_FILE` redirects every run's output to the named file
/// instead of stdout; [`LogEmitter::from_env`] is the entry point the CLI
/// uses.
pub struct LogEmitter {
    writer: Box<dyn Write + Send>,
    seq: u64,
    run_id: String,
}

impl LogEmitter {
    pub fn to_writer(writer: Box<dyn Write + Send>, run_id: impl Into<String>) -> Self {
        Self { writer, seq: 0, run_id: run_id.into() }
    }

    pub fn to_file(path: &Path, run_id: impl Into<String>) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::to_writer(Box::new(std::io::BufWriter::new(file)), run_id))
    }

    /// Honors `PIPEWARM_LOG_FILE` if set, otherwise writes to stdout.
    pub fn from_env(run_id: impl Into<String>) -> std::io::Result<Self> {
        match std::env::var_os("PIPEWARM_LOG_FILE") {
            Some(path) => Self::to_file(Path::new(&path), run_id),
            None => Ok(Self::to_writer(Box::new(std::io::stdout()), run_id)),
        }
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{:06}", self.run_id, self.seq)
    }

    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(trace_id, level, event);
        self.emit_entry(entry.clone())?;
        Ok(entry)
    }

    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        let line = entry.to_jsonl().map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn emit_summary(&mut self, summary: RunSummary) -> std::io::Result<()> {
        let entry = LogEntry::new(self.next_trace_id(), LogLevel::Info, "run_summary")
            .with_details(serde_json::to_value(summary).map_err(std::io::Error::other)?);
        self.emit_entry(entry)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        1970 + secs / 31_557_600,
        (secs % 31_557_600) / 2_629_800 + 1,
        (secs % 2_629_800) / 86400 + 1,
        (secs % 86400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
        millis,
    )
}

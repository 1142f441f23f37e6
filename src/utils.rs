use crate::error::InvalidTimestamp;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Milliseconds between the Unix epoch and the Core Data epoch (2001-01-01T00:00:00Z).
pub const CORE_DATA_EPOCH_OFFSET_MS: i64 = 978_307_200_000;

const BEAR_CONTAINER: &str =
    "Library/Group Containers/9K33E3U3T4.net.shinyfrog.bear/Application Data";

/// Configuration required to run the export process.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Root directory every note, attachment and report is written under.
    pub export_root: PathBuf,
    /// Attachment directory, relative to `export_root`.
    pub attachment_subdir: PathBuf,
    pub db_path: PathBuf,
    /// Bear's "Note Images" directory; asset records are resolved against it.
    pub assets_root: PathBuf,
    /// Tag prefixes that drop a note from the export.
    pub exclude_tags: Vec<String>,
    /// Lowercase root folders that folder tags may resolve to.
    pub treat_as_folders: Vec<String>,
    pub ignore_titles: Vec<String>,
    /// A note with this title is written to `index.md` at the export root.
    pub index_title: String,
    pub publish_only: bool,
    pub only_stage_published_assets: bool,
    pub dry_run: bool,
    /// Remove `export_root` before writing.
    pub clean: bool,
    /// Skip notes with broken timestamps instead of aborting the run.
    pub skip_invalid_notes: bool,
    /// List every planned file in a dry run instead of totals.
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            export_root: home.join("Desktop").join("BearExport"),
            attachment_subdir: PathBuf::from("00 Meta").join("02 Attachments"),
            db_path: default_db_path(&home),
            assets_root: default_assets_root(&home),
            exclude_tags: vec!["blog".into(), "draft".into()],
            treat_as_folders: [
                "00 meta",
                "10 journals",
                "30 external",
                "40 d&d",
                "50 slipbox",
                "60 outputs",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            ignore_titles: Vec::new(),
            index_title: "Index".into(),
            publish_only: false,
            only_stage_published_assets: true,
            dry_run: false,
            clean: false,
            skip_invalid_notes: false,
            verbose: false,
            quiet: false,
        }
    }
}

pub fn default_db_path(home: &std::path::Path) -> PathBuf {
    home.join(BEAR_CONTAINER).join("database.sqlite")
}

pub fn default_assets_root(home: &std::path::Path) -> PathBuf {
    home.join(BEAR_CONTAINER)
        .join("Local Files")
        .join("Note Images")
}

/// Convert a Core Data timestamp (seconds since 2001-01-01 UTC) to a calendar date.
///
/// Zero, NULL and non-finite inputs are rejected: Bear never writes them for a live note.
pub fn from_core_data_timestamp(raw: Option<f64>) -> Result<DateTime<Utc>, InvalidTimestamp> {
    let seconds = match raw {
        Some(s) if s != 0.0 && s.is_finite() => s,
        other => return Err(InvalidTimestamp(other)),
    };
    // Sub-millisecond precision is truncated.
    let millis = (seconds * 1000.0).trunc() as i64;
    millis
        .checked_add(CORE_DATA_EPOCH_OFFSET_MS)
        .and_then(DateTime::from_timestamp_millis)
        .ok_or(InvalidTimestamp(raw))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
}

/// Chronological record of every warning and error raised during a run.
///
/// Entries are mirrored to `tracing` as they happen and replayed in the
/// end-of-run summary.
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.entries.push(LogEntry {
            severity: Severity::Warning,
            message,
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.entries.push(LogEntry {
            severity: Severity::Error,
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Error)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// loglens - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no UI;
// these types are the shared vocabulary across all layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// =============================================================================
// Level
// =============================================================================

/// Normalised log levels, ordered from most to least severe.
///
/// Detected from line content by word-boundary keyword scan; formats with
/// an explicit level column map through the same variants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl Level {
    /// Returns all variants in display order (most severe first).
    pub fn all() -> &'static [Level] {
        &[
            Level::Error,
            Level::Warning,
            Level::Info,
            Level::Debug,
            Level::Trace,
        ]
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        }
    }

    /// Parse a level name (as emitted by `label()`), case-insensitive.
    pub fn parse(name: &str) -> Option<Level> {
        match name.to_ascii_lowercase().as_str() {
            "error" => Some(Level::Error),
            "warning" | "warn" => Some(Level::Warning),
            "info" => Some(Level::Info),
            "debug" => Some(Level::Debug),
            "trace" | "verbose" => Some(Level::Trace),
            _ => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Line record
// =============================================================================

/// A single line served by the file view.
///
/// `text` is the line contents with the trailing terminator stripped and
/// clamped to the line cap. Truncation is observable via
/// `FileInfo::truncated_lines`, not per record.
#[derive(Debug, Clone, Serialize)]
pub struct LineRecord {
    /// 0-based line number within the file.
    pub line_number: u64,

    /// Decoded line text (lossy UTF-8, truncated to the line cap).
    pub text: String,

    /// Detected level, if any keyword matched the line prefix.
    pub level: Option<Level>,

    /// Parsed leading timestamp as epoch milliseconds, if recognised.
    pub timestamp_ms: Option<i64>,
}

// =============================================================================
// File info
// =============================================================================

/// Metadata for a split part produced by the file splitter, parsed from a
/// `#SPLIT:part=K,total=N,prev=<name>,next=<name>` header line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitHeader {
    pub part: u32,
    pub total: u32,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Snapshot metadata for an open file.
///
/// Once a line is published at index `i`, its `(offset, length)` mapping is
/// immutable until the file is closed; live-tail sources are append-only.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    /// Full path to the file.
    pub path: PathBuf,

    /// Indexed size in bytes (the snapshot length at index time).
    pub size_bytes: u64,

    /// Total lines published by the index.
    pub total_lines: u64,

    /// Longest observed line length in bytes, pre-truncation.
    pub max_line_length: u64,

    /// True when at least one line exceeds the line cap and is served
    /// truncated.
    pub truncated_lines: bool,

    /// Split-part header, when the file is one part of a split set.
    pub split_header: Option<SplitHeader>,
}

// =============================================================================
// Columns
// =============================================================================

/// How a line is split into columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnDelimiter {
    /// Split on a single character (tab, comma, pipe, ...).
    Char(char),

    /// Split on runs of whitespace.
    Whitespace,
}

impl std::fmt::Display for ColumnDelimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnDelimiter::Char('\t') => f.write_str("tab"),
            ColumnDelimiter::Char(c) => write!(f, "'{c}'"),
            ColumnDelimiter::Whitespace => f.write_str("whitespace"),
        }
    }
}

// =============================================================================
// Search
// =============================================================================

/// One search hit. Multiple matches per line are all reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    /// 0-based line number.
    pub line_number: u64,

    /// 0-based byte offset of the match within the line text.
    pub column: u64,

    /// Match length in bytes.
    pub length: u64,

    /// Line text clamped to the snippet cap.
    pub line_text_snippet: String,
}

// =============================================================================
// Pattern clusters (Drain)
// =============================================================================

/// One position of a log template: a literal token or the parameter
/// placeholder `<*>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Token {
    Literal(String),
    Wildcard,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Literal(s) => f.write_str(s),
            Token::Wildcard => f.write_str("<*>"),
        }
    }
}

/// A group of log lines sharing a template.
#[derive(Debug, Clone, Serialize)]
pub struct PatternCluster {
    /// Template tokens; `Wildcard` marks parameter positions.
    pub template: Vec<Token>,

    /// Number of lines merged into this cluster.
    pub count: u64,

    /// Up to 10 line numbers that matched this cluster.
    pub sample_line_numbers: Vec<u64>,

    /// Level of the first classified sample, if any.
    pub detected_level: Option<Level>,
}

impl PatternCluster {
    /// Render the template as a single display string.
    pub fn template_text(&self) -> String {
        let parts: Vec<String> = self.template.iter().map(|t| t.to_string()).collect();
        parts.join(" ")
    }
}

// =============================================================================
// Analysis result (shared by both analyzers, consumed by baselines)
// =============================================================================

/// Inclusive time span covered by parsed timestamps, epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Counters for an analysis pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub total_lines: u64,
    pub analyzed_lines: u64,
}

/// A crash indicator found in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashInfo {
    /// The critical keyword that matched (lowercase).
    pub keyword: String,

    /// Line number of the first occurrence.
    pub line_number: u64,

    /// Truncated sample of the matching line.
    pub snippet: String,
}

/// A component with elevated error/warning traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailingComponent {
    pub name: String,

    /// Error/warning lines attributed to this component.
    pub error_count: u64,

    /// Truncated sample of one attributed line.
    pub snippet: String,
}

/// A deterministic filter the caller can offer the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSuggestion {
    pub title: String,
    pub description: String,

    /// Pattern to include or exclude, when the suggestion is pattern-based.
    pub pattern: Option<String>,

    /// True when `pattern` should be excluded rather than included.
    pub exclude: bool,

    /// Levels to keep, when the suggestion is level-based.
    pub levels: Vec<Level>,
}

/// Structural insights emitted by an analysis pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisInsights {
    pub crashes: Vec<CrashInfo>,
    pub top_failing_components: Vec<FailingComponent>,
    pub filter_suggestions: Vec<FilterSuggestion>,
}

/// Unified result shape produced by both analyzers; the baseline store
/// consumes this schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub stats: AnalysisStats,

    /// Lines per detected level.
    pub level_counts: BTreeMap<Level, u64>,

    /// Span of parsed timestamps, if any line carried one.
    pub time_range: Option<TimeRange>,

    /// Identifies which analyzer produced this result.
    pub analyzer_name: String,

    pub insights: AnalysisInsights,
}

// =============================================================================
// Live connections
// =============================================================================

/// Kind of streaming source feeding a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Serial,
    DeviceLog,
    Ssh,
}

impl SourceKind {
    /// Stable identifier used in backing file names and event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Serial => "serial",
            SourceKind::DeviceLog => "device-log",
            SourceKind::Ssh => "ssh",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one live connection, as listed by the registry.
#[derive(Debug, Clone, Serialize)]
pub struct LiveConnectionInfo {
    pub id: String,
    pub source_kind: SourceKind,
    pub display_name: String,
    pub detail: String,
    pub backing_file_path: PathBuf,
    pub connected_since: DateTime<Utc>,
    pub connected: bool,
    pub line_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order_most_severe_first() {
        let all = Level::all();
        assert_eq!(all[0], Level::Error);
        assert_eq!(all[all.len() - 1], Level::Trace);
    }

    #[test]
    fn test_level_parse_aliases() {
        assert_eq!(Level::parse("WARN"), Some(Level::Warning));
        assert_eq!(Level::parse("verbose"), Some(Level::Trace));
        assert_eq!(Level::parse("notice"), None);
    }

    #[test]
    fn test_template_text_renders_wildcards() {
        let cluster = PatternCluster {
            template: vec![
                Token::Literal("user".to_string()),
                Token::Wildcard,
                Token::Literal("logged".to_string()),
            ],
            count: 2,
            sample_line_numbers: vec![0, 4],
            detected_level: None,
        };
        assert_eq!(cluster.template_text(), "user <*> logged");
    }
}

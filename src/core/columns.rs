// loglens - core/columns.rs
//
// Column-aware structured analyzer. Three phases:
//   1. Column detection on a sample from the start of the file: delimiter
//      scoring, header recognition, column role classification.
//   2. Streaming analysis pass: per-channel / per-source / per-level
//      counting and canonical message-pattern accumulation.
//   3. Insight synthesis: noise candidates, error groups, anomalies, and
//      deterministic filter suggestions.

use crate::core::drain::critical_keyword;
use crate::core::model::{
    AnalysisInsights, AnalysisResult, AnalysisStats, ColumnDelimiter, CrashInfo,
    FailingComponent, FilterSuggestion, Level, TimeRange,
};
use crate::core::search::column_ranges;
use crate::core::timestamp::{byte_prefix, parse_leading_timestamp};
use crate::core::view::{detect_level, FileView};
use crate::util::cancel::{CancelToken, ProgressFn, ProgressThrottle};
use crate::util::constants::{
    ANALYSIS_LINE_BYTES, ANALYSIS_MAX_PATTERNS, ANALYSIS_PATTERN_CHARS, ANOMALY_MAX_COUNT,
    BASELINE_MAX_COMPONENTS, BASELINE_MAX_CRASHES, COLUMN_DETECT_SAMPLE_BYTES, ERROR_GROUP_LIMIT,
    NOISE_MIN_COUNT, SCAN_BATCH_LINES, SCAN_PROGRESS_INTERVAL_MS,
};
use crate::util::error::{EngineError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

// =============================================================================
// Layout types
// =============================================================================

/// Semantic role of a detected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Channel,
    Source,
    Level,
    Message,
    Timestamp,
    Other,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub index: usize,

    /// Header cell text, when a header row was recognised.
    pub name: Option<String>,

    pub role: ColumnRole,
}

/// Result of phase 1.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnLayout {
    pub delimiter: ColumnDelimiter,
    pub has_header: bool,
    pub columns: Vec<ColumnInfo>,
}

impl ColumnLayout {
    fn role_index(&self, role: ColumnRole) -> Option<usize> {
        self.columns
            .iter()
            .find(|c| c.role == role)
            .map(|c| c.index)
    }
}

// =============================================================================
// Phase 1 — column detection
// =============================================================================

const DELIMITER_CANDIDATES: &[char] = &['\t', ',', '|', ';', ':', '='];

/// Detect delimiter, header, and column roles from the first 8 KiB of the
/// view.
pub fn detect_columns(view: &FileView) -> ColumnLayout {
    let mut sample_lines: Vec<String> = Vec::new();
    let mut sampled_bytes = 0usize;
    let mut i = 0u64;
    while sampled_bytes < COLUMN_DETECT_SAMPLE_BYTES {
        let text = match view.line_text(i) {
            Some(t) => t,
            None => break,
        };
        i += 1;
        sampled_bytes += text.len() + 1;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        sample_lines.push(text);
    }
    detect_columns_from_sample(&sample_lines)
}

fn detect_columns_from_sample(lines: &[String]) -> ColumnLayout {
    if lines.is_empty() {
        return ColumnLayout {
            delimiter: ColumnDelimiter::Whitespace,
            has_header: false,
            columns: Vec::new(),
        };
    }

    let has_clock = lines
        .iter()
        .any(|l| clock_regex().is_match(l));

    let mut best: Option<(char, f64)> = None;
    for &candidate in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| l.matches(candidate).count())
            .collect();
        let present = counts.iter().filter(|&&c| c > 0).count();
        if present == 0 {
            continue;
        }
        let presence = present as f64 / counts.len() as f64;
        let avg = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        let consistent = counts
            .iter()
            .filter(|&&c| (c as f64 - avg).abs() <= 1.0)
            .count();
        let consistency = consistent as f64 / counts.len() as f64;

        let mut score = avg * consistency * presence;
        // Clock timestamps make ':' look like a delimiter; damp it.
        if candidate == ':' && has_clock {
            score *= 0.3;
        }
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((candidate, score));
        }
    }

    let delimiter = match best {
        Some((c, score)) if score > 1.0 => ColumnDelimiter::Char(c),
        _ => ColumnDelimiter::Whitespace,
    };

    let first_cells = split_cells(&lines[0], delimiter);
    let has_header = is_header_row(&first_cells, delimiter);

    let columns = if has_header {
        first_cells
            .iter()
            .enumerate()
            .map(|(index, name)| ColumnInfo {
                index,
                name: Some(name.clone()),
                role: classify_column_name(name),
            })
            .collect()
    } else {
        classify_by_content(lines, delimiter)
    };

    tracing::debug!(
        delimiter = %delimiter,
        has_header,
        columns = columns.len(),
        "Column layout detected"
    );
    ColumnLayout {
        delimiter,
        has_header,
        columns,
    }
}

fn clock_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,2}:\d{2}:\d{2}").expect("clock_regex: invalid regex"))
}

fn split_cells(line: &str, delimiter: ColumnDelimiter) -> Vec<String> {
    column_ranges(line, delimiter)
        .into_iter()
        .map(|(s, e)| line[s..e].trim().to_string())
        .collect()
}

/// A header row has at least 2 cells, all non-empty, all non-numeric, all
/// unique, and none of them timestamp-shaped. Whitespace-delimited files
/// additionally need at least one known column name — any plain sentence
/// splits into unique words and would otherwise pass.
fn is_header_row(cells: &[String], delimiter: ColumnDelimiter) -> bool {
    if cells.len() < 2 {
        return false;
    }
    if cells.iter().any(|c| c.is_empty()) {
        return false;
    }
    if cells.iter().any(|c| c.parse::<f64>().is_ok()) {
        return false;
    }
    if cells.iter().any(|c| clock_regex().is_match(c)) {
        return false;
    }
    let mut seen: Vec<String> = Vec::with_capacity(cells.len());
    for cell in cells {
        let lower = cell.to_lowercase();
        if seen.contains(&lower) {
            return false;
        }
        seen.push(lower);
    }
    if delimiter == ColumnDelimiter::Whitespace
        && !cells
            .iter()
            .any(|c| classify_column_name(c) != ColumnRole::Other)
    {
        return false;
    }
    true
}

/// Known-name dictionary for header cells.
fn classify_column_name(name: &str) -> ColumnRole {
    match name.to_lowercase().as_str() {
        "channel" | "category" | "module" | "facility" | "tag" => ColumnRole::Channel,
        "source" | "component" | "logger" | "origin" | "process" | "service" => {
            ColumnRole::Source
        }
        "level" | "severity" | "priority" | "lvl" | "loglevel" => ColumnRole::Level,
        "message" | "msg" | "text" | "description" | "body" | "detail" => ColumnRole::Message,
        "time" | "timestamp" | "date" | "datetime" | "ts" | "when" => ColumnRole::Timestamp,
        _ => ColumnRole::Other,
    }
}

/// Without a header, sample cell content: timestamp-shaped and level-shaped
/// columns are recognised, the last column is the message.
fn classify_by_content(lines: &[String], delimiter: ColumnDelimiter) -> Vec<ColumnInfo> {
    let sample: Vec<Vec<String>> = lines
        .iter()
        .take(5)
        .map(|l| split_cells(l, delimiter))
        .collect();
    let width = sample.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut columns = Vec::with_capacity(width);
    for index in 0..width {
        let values: Vec<&str> = sample
            .iter()
            .filter_map(|cells| cells.get(index))
            .map(|s| s.as_str())
            .collect();
        let role = if !values.is_empty()
            && values
                .iter()
                .all(|v| parse_leading_timestamp(v).is_some())
        {
            ColumnRole::Timestamp
        } else if !values.is_empty() && values.iter().all(|v| Level::parse(v).is_some()) {
            ColumnRole::Level
        } else if index + 1 == width {
            ColumnRole::Message
        } else {
            ColumnRole::Other
        };
        columns.push(ColumnInfo {
            index,
            name: None,
            role,
        });
    }
    columns
}

// =============================================================================
// Phase 2 — analysis pass
// =============================================================================

/// One canonical message pattern accumulated during the pass.
#[derive(Debug, Clone, Serialize)]
pub struct PatternSummary {
    pub pattern: String,
    pub count: u64,
    pub first_line: u64,
    pub last_line: u64,

    /// One 200-byte sample of a matching line.
    pub sample: String,

    pub level: Option<Level>,
    pub channel: Option<String>,
}

/// Full analyzer output: the layout, the accumulated patterns, and the
/// unified result shape.
#[derive(Debug, Clone)]
pub struct ColumnReport {
    pub layout: ColumnLayout,

    /// All tracked patterns, count-descending.
    pub patterns: Vec<PatternSummary>,

    /// Patterns at error/warning level, count-descending, top 15.
    pub error_groups: Vec<PatternSummary>,

    pub channel_counts: HashMap<String, u64>,

    pub result: AnalysisResult,
}

struct PatternStat {
    count: u64,
    first_line: u64,
    last_line: u64,
    sample: String,
    level: Option<Level>,
    channel: Option<String>,
}

/// Run the column-aware analyzer over the whole file.
pub fn analyze_with_columns(
    view: &FileView,
    cancel: &CancelToken,
    mut progress: Option<ProgressFn<'_>>,
) -> Result<ColumnReport> {
    let layout = detect_columns(view);
    let total = view.total_lines();

    let channel_col = layout.role_index(ColumnRole::Channel);
    let source_col = layout.role_index(ColumnRole::Source);
    let level_col = layout.role_index(ColumnRole::Level);
    let message_col = layout.role_index(ColumnRole::Message);
    let timestamp_col = layout.role_index(ColumnRole::Timestamp);

    let mut throttle = ProgressThrottle::new(SCAN_PROGRESS_INTERVAL_MS);
    let mut patterns: HashMap<String, PatternStat> = HashMap::new();
    let mut level_counts: BTreeMap<Level, u64> = BTreeMap::new();
    let mut channel_counts: HashMap<String, u64> = HashMap::new();
    let mut channel_errors: HashMap<String, u64> = HashMap::new();
    let mut source_errors: HashMap<String, (u64, String)> = HashMap::new();
    let mut first_ts: Option<i64> = None;
    let mut last_ts: Option<i64> = None;
    let mut analyzed = 0u64;
    let mut header_skipped = false;

    for i in 0..total {
        if i % SCAN_BATCH_LINES == 0 {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if total > 0 {
                throttle.report(&mut progress, i as f64 / total as f64);
            }
        }
        let full = match view.line_text(i) {
            Some(t) => t,
            None => continue,
        };
        let text = byte_prefix(&full, ANALYSIS_LINE_BYTES);
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if layout.has_header && !header_skipped {
            header_skipped = true;
            continue;
        }
        analyzed += 1;

        let ranges = if layout.columns.is_empty() {
            Vec::new()
        } else {
            column_ranges(text, layout.delimiter)
        };
        let cell = |idx: Option<usize>| -> Option<&str> {
            idx.and_then(|i| ranges.get(i))
                .map(|&(s, e)| text[s..e].trim())
        };

        // Level: explicit column first, keyword scan second.
        let level = cell(level_col)
            .and_then(Level::parse)
            .or_else(|| detect_level(text));
        if let Some(level) = level {
            *level_counts.entry(level).or_insert(0) += 1;
        }

        // Channel: explicit column or a leading [Channel] mention.
        let channel = cell(channel_col)
            .map(|s| s.to_string())
            .or_else(|| bracket_channel(text));
        if let Some(ref channel) = channel {
            *channel_counts.entry(channel.clone()).or_insert(0) += 1;
            if matches!(level, Some(Level::Error) | Some(Level::Warning)) {
                *channel_errors.entry(channel.clone()).or_insert(0) += 1;
            }
        }

        // Source, simplified by removing text after the first '.'.
        if let Some(source) = cell(source_col) {
            if matches!(level, Some(Level::Error) | Some(Level::Warning)) {
                let name = source.split('.').next().unwrap_or(source).to_string();
                let entry = source_errors
                    .entry(name)
                    .or_insert_with(|| (0, text.to_string()));
                entry.0 += 1;
            }
        }

        // Timestamps: explicit column first, line prefix second.
        let ts = cell(timestamp_col)
            .and_then(parse_leading_timestamp)
            .or_else(|| parse_leading_timestamp(text));
        if let Some(ts) = ts {
            if first_ts.is_none() {
                first_ts = Some(ts.epoch_ms);
            }
            last_ts = Some(ts.epoch_ms);
        }

        // Canonical pattern from the message column (whole line otherwise).
        // Whitespace splitting has no closing delimiter, so the message
        // column extends to the end of the line.
        let message = match (message_col, layout.delimiter) {
            (Some(idx), ColumnDelimiter::Whitespace) => ranges
                .get(idx)
                .map(|&(s, _)| text[s..].trim())
                .unwrap_or(text),
            _ => cell(message_col).unwrap_or(text),
        };
        let pattern = canonical_pattern(message);
        if patterns.contains_key(&pattern) {
            let stat = patterns.get_mut(&pattern).unwrap();
            stat.count += 1;
            stat.last_line = i;
            if stat.level.is_none() {
                stat.level = level;
            }
        } else if patterns.len() < ANALYSIS_MAX_PATTERNS {
            patterns.insert(
                pattern,
                PatternStat {
                    count: 1,
                    first_line: i,
                    last_line: i,
                    sample: text.to_string(),
                    level,
                    channel: channel.clone(),
                },
            );
        } // else: pattern table full; the line still counts
    }

    // -------------------------------------------------------------------------
    // Phase 3 — insight synthesis
    // -------------------------------------------------------------------------

    let mut summaries: Vec<PatternSummary> = patterns
        .into_iter()
        .map(|(pattern, stat)| PatternSummary {
            pattern,
            count: stat.count,
            first_line: stat.first_line,
            last_line: stat.last_line,
            sample: stat.sample,
            level: stat.level,
            channel: stat.channel,
        })
        .collect();
    summaries.sort_by(|a, b| b.count.cmp(&a.count).then(a.first_line.cmp(&b.first_line)));

    let noise_threshold = NOISE_MIN_COUNT.max(analyzed / 100);
    let noise: Vec<&PatternSummary> = summaries
        .iter()
        .filter(|p| p.count >= noise_threshold)
        .collect();

    let error_groups: Vec<PatternSummary> = summaries
        .iter()
        .filter(|p| matches!(p.level, Some(Level::Error) | Some(Level::Warning)))
        .take(ERROR_GROUP_LIMIT)
        .cloned()
        .collect();

    // Anomalies: rare patterns whose sample carries a critical keyword.
    let mut crashes: Vec<CrashInfo> = Vec::new();
    let mut anomalies: Vec<&PatternSummary> = summaries
        .iter()
        .filter(|p| p.count <= ANOMALY_MAX_COUNT)
        .collect();
    anomalies.sort_by_key(|p| p.first_line);
    for pattern in anomalies {
        if crashes.len() >= BASELINE_MAX_CRASHES {
            break;
        }
        if let Some(keyword) = critical_keyword(&pattern.sample) {
            crashes.push(CrashInfo {
                keyword: keyword.to_string(),
                line_number: pattern.first_line,
                snippet: pattern.sample.clone(),
            });
        }
    }

    let mut failing: Vec<FailingComponent> = source_errors
        .into_iter()
        .map(|(name, (error_count, snippet))| FailingComponent {
            name,
            error_count,
            snippet,
        })
        .collect();
    failing.sort_by(|a, b| b.error_count.cmp(&a.error_count).then(a.name.cmp(&b.name)));
    failing.truncate(BASELINE_MAX_COMPONENTS);

    let filter_suggestions = synthesize_suggestions(
        &noise,
        &level_counts,
        &channel_errors,
        analyzed,
    );

    throttle.finish(&mut progress);
    let result = AnalysisResult {
        stats: AnalysisStats {
            total_lines: total,
            analyzed_lines: analyzed,
        },
        level_counts,
        time_range: match (first_ts, last_ts) {
            (Some(start_ms), Some(end_ms)) => Some(TimeRange { start_ms, end_ms }),
            _ => None,
        },
        analyzer_name: "columns".to_string(),
        insights: AnalysisInsights {
            crashes,
            top_failing_components: failing,
            filter_suggestions,
        },
    };

    tracing::debug!(
        lines = analyzed,
        patterns = summaries.len(),
        errors = error_groups.len(),
        "Column analysis complete"
    );
    Ok(ColumnReport {
        layout,
        patterns: summaries,
        error_groups,
        channel_counts,
        result,
    })
}

/// Leading `[Channel]` mention: an alphabetic start, then up to 30 word-ish
/// characters.
pub(crate) fn bracket_channel(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\[([A-Za-z][A-Za-z0-9._-]{1,30})\]").expect("bracket_channel: invalid regex")
    });
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

// =============================================================================
// Pattern canonicalization
// =============================================================================

/// Replace volatile fields (timestamps, IPs, UUIDs, hex runs, large
/// integers, bracket-group prefixes) with placeholders, then cap at 100
/// characters.
pub fn canonical_pattern(message: &str) -> String {
    struct Replacement {
        re: Regex,
        placeholder: &'static str,
    }
    static REPLACEMENTS: OnceLock<Vec<Replacement>> = OnceLock::new();
    let replacements = REPLACEMENTS.get_or_init(|| {
        fn re(pat: &str) -> Regex {
            Regex::new(pat).expect("canonical_pattern: invalid regex")
        }
        vec![
            // A run of three or more [..] groups (the [time][module][level]
            // prefix shape).
            Replacement {
                re: re(r"(?:\[[^\]]*\]\s*){3,}"),
                placeholder: "<ctx> ",
            },
            Replacement {
                re: re(r"\d{4}-\d{2}-\d{2}[T ]?\d{2}:\d{2}:\d{2}(?:\.\d+)?Z?"),
                placeholder: "<ts>",
            },
            Replacement {
                re: re(r"\b\d{1,2}:\d{2}:\d{2}(?:\.\d+)?\b"),
                placeholder: "<ts>",
            },
            Replacement {
                re: re(
                    r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
                ),
                placeholder: "<uuid>",
            },
            Replacement {
                re: re(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}(?::\d+)?\b"),
                placeholder: "<ip>",
            },
            Replacement {
                re: re(r"\b(?:0x)?[0-9a-fA-F]{8,}\b"),
                placeholder: "<hex>",
            },
            Replacement {
                re: re(r"\b\d{4,}\b"),
                placeholder: "<num>",
            },
        ]
    });

    let mut pattern = message.to_string();
    for replacement in replacements {
        pattern = replacement
            .re
            .replace_all(&pattern, replacement.placeholder)
            .into_owned();
    }
    if pattern.chars().count() > ANALYSIS_PATTERN_CHARS {
        pattern = pattern.chars().take(ANALYSIS_PATTERN_CHARS).collect();
    }
    pattern
}

/// First `n` words of `text` longer than 3 characters, skipping
/// placeholders.
fn suggested_filter_words(text: &str, n: usize) -> Option<String> {
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|w| w.len() > 3 && !w.starts_with('<'))
        .take(n)
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

// =============================================================================
// Deterministic filter suggestions
// =============================================================================

fn synthesize_suggestions(
    noise: &[&PatternSummary],
    level_counts: &BTreeMap<Level, u64>,
    channel_errors: &HashMap<String, u64>,
    analyzed: u64,
) -> Vec<FilterSuggestion> {
    let mut suggestions = Vec::new();

    // 1. Hide the top noise pattern.
    if let Some(top) = noise.first() {
        if let Some(words) = suggested_filter_words(&top.pattern, 3) {
            suggestions.push(FilterSuggestion {
                title: format!("Hide repetitive noise ({}x)", top.count),
                description: format!("Exclude lines matching '{words}'"),
                pattern: Some(words),
                exclude: true,
                levels: Vec::new(),
            });
        }
    }

    // 2. Show errors only — useful only while errors are the minority.
    let errors = level_counts.get(&Level::Error).copied().unwrap_or(0);
    if errors > 0 && analyzed > 0 && errors * 2 < analyzed {
        suggestions.push(FilterSuggestion {
            title: format!("Show errors only ({errors} lines)"),
            description: "Keep only lines at error level".to_string(),
            pattern: None,
            exclude: false,
            levels: vec![Level::Error],
        });
    }

    // 3. Focus on the channel with the most error traffic.
    if let Some((channel, count)) = channel_errors
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
    {
        if *count > 1 {
            suggestions.push(FilterSuggestion {
                title: format!("Focus on channel '{channel}'"),
                description: format!("{count} error/warning lines mention [{channel}]"),
                pattern: Some(channel.clone()),
                exclude: false,
                levels: Vec::new(),
            });
        }
    }

    // 4. Hide debug/trace chatter when it dominates the file.
    let chatter = level_counts.get(&Level::Debug).copied().unwrap_or(0)
        + level_counts.get(&Level::Trace).copied().unwrap_or(0);
    if analyzed > 0 && chatter * 2 > analyzed {
        suggestions.push(FilterSuggestion {
            title: "Hide debug/trace chatter".to_string(),
            description: format!("{chatter} of {analyzed} lines are debug or trace"),
            pattern: None,
            exclude: false,
            levels: vec![Level::Error, Level::Warning, Level::Info],
        });
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn open_view(dir: &TempDir, content: &str) -> FileView {
        let path = dir.path().join("columns.log");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        FileView::open(&path, &CancelToken::new(), None).unwrap()
    }

    fn analyze(view: &FileView) -> ColumnReport {
        analyze_with_columns(view, &CancelToken::new(), None).unwrap()
    }

    #[test]
    fn test_detects_comma_delimiter_and_header() {
        let dir = TempDir::new().unwrap();
        let view = open_view(
            &dir,
            "time,level,component,message\n\
             10:00:01,info,net,link up\n\
             10:00:02,error,disk,write failed\n\
             10:00:03,info,net,link stable\n",
        );
        let report = analyze(&view);
        assert_eq!(report.layout.delimiter, ColumnDelimiter::Char(','));
        assert!(report.layout.has_header);
        assert_eq!(report.layout.columns[0].role, ColumnRole::Timestamp);
        assert_eq!(report.layout.columns[1].role, ColumnRole::Level);
        assert_eq!(report.layout.columns[2].role, ColumnRole::Source);
        assert_eq!(report.layout.columns[3].role, ColumnRole::Message);
        // Header row is excluded from analysis.
        assert_eq!(report.result.stats.analyzed_lines, 3);
        assert_eq!(report.result.level_counts[&Level::Error], 1);
        assert_eq!(report.result.level_counts[&Level::Info], 2);
    }

    #[test]
    fn test_whitespace_fallback_when_no_delimiter_scores() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "plain words here\nmore plain words\n");
        let report = analyze(&view);
        assert_eq!(report.layout.delimiter, ColumnDelimiter::Whitespace);
        assert!(!report.layout.has_header);
    }

    #[test]
    fn test_colon_penalized_when_clock_present() {
        let dir = TempDir::new().unwrap();
        // Each line has two ':' from the clock; without the penalty ':'
        // would beat the single '|' per line.
        let view = open_view(
            &dir,
            "10:00:01 | net | up\n10:00:02 | net | up\n10:00:03 | net | up\n",
        );
        let report = analyze(&view);
        assert_eq!(report.layout.delimiter, ColumnDelimiter::Char('|'));
    }

    #[test]
    fn test_comment_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "# a comment\nreal line one\n# another\nreal line two\n");
        let report = analyze(&view);
        assert_eq!(report.result.stats.analyzed_lines, 2);
    }

    #[test]
    fn test_numeric_first_row_is_not_a_header() {
        let comma = ColumnDelimiter::Char(',');
        let cells = vec!["10".to_string(), "info".to_string()];
        assert!(!is_header_row(&cells, comma));
        let cells = vec!["time".to_string(), "time".to_string()];
        assert!(!is_header_row(&cells, comma)); // not unique
        let cells = vec!["10:00:01".to_string(), "info".to_string()];
        assert!(!is_header_row(&cells, comma)); // timestamp-shaped
        let cells = vec!["time".to_string(), "level".to_string()];
        assert!(is_header_row(&cells, comma));
        // A plain sentence is not a whitespace header.
        let cells = vec!["plain".to_string(), "words".to_string(), "here".to_string()];
        assert!(!is_header_row(&cells, ColumnDelimiter::Whitespace));
    }

    #[test]
    fn test_canonical_pattern_replacements() {
        assert_eq!(
            canonical_pattern("request from 10.0.0.1:443 took 12345 ms"),
            "request from <ip> took <num> ms"
        );
        assert_eq!(
            canonical_pattern("id 550e8400-e29b-41d4-a716-446655440000 ready"),
            "id <uuid> ready"
        );
        assert_eq!(
            canonical_pattern("at 2024-01-15 10:00:00.123 started"),
            "at <ts> started"
        );
        assert_eq!(
            canonical_pattern("[10:00:01][net][info] link up"),
            "<ctx> link up"
        );
        assert_eq!(canonical_pattern("handle 0xdeadbeef01 open"), "handle <hex> open");
    }

    #[test]
    fn test_canonical_pattern_capped_at_100_chars() {
        let long = "word ".repeat(100);
        assert_eq!(canonical_pattern(&long).chars().count(), ANALYSIS_PATTERN_CHARS);
    }

    #[test]
    fn test_patterns_aggregate_and_sort_by_count() {
        let dir = TempDir::new().unwrap();
        let mut content = String::new();
        for i in 0..5 {
            content.push_str(&format!("worker {} heartbeat ok\n", 10_000 + i));
        }
        content.push_str("singular startup message\n");
        let view = open_view(&dir, &content);
        let report = analyze(&view);
        assert_eq!(report.patterns[0].count, 5);
        assert_eq!(report.patterns[0].pattern, "worker <num> heartbeat ok");
    }

    #[test]
    fn test_error_groups_collect_error_level_patterns() {
        let dir = TempDir::new().unwrap();
        let view = open_view(
            &dir,
            "ERROR disk write failed\nERROR disk write failed\nINFO all good\n",
        );
        let report = analyze(&view);
        assert_eq!(report.error_groups.len(), 1);
        assert_eq!(report.error_groups[0].count, 2);
    }

    #[test]
    fn test_anomaly_with_critical_keyword_becomes_crash() {
        let dir = TempDir::new().unwrap();
        let mut content = String::from("INFO routine message\n").repeat(5);
        content.push_str("kernel panic: unable to continue\n");
        let view = open_view(&dir, &content);
        let report = analyze(&view);
        assert_eq!(report.result.insights.crashes.len(), 1);
        assert_eq!(report.result.insights.crashes[0].keyword, "panic");
    }

    #[test]
    fn test_failing_components_from_source_column() {
        let dir = TempDir::new().unwrap();
        let view = open_view(
            &dir,
            "level,component,message\n\
             error,disk.io,write failed\n\
             error,disk.sync,flush failed\n\
             error,net,timeout hit\n\
             info,net,fine\n",
        );
        let report = analyze(&view);
        let top = &report.result.insights.top_failing_components;
        assert_eq!(top[0].name, "disk");
        assert_eq!(top[0].error_count, 2);
        assert_eq!(top[1].name, "net");
        assert_eq!(top[1].error_count, 1);
    }

    #[test]
    fn test_bracket_channel_counting() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "x [Audio] one\ny [Audio] two\nz [Video] three\n");
        let report = analyze(&view);
        assert_eq!(report.channel_counts["Audio"], 2);
        assert_eq!(report.channel_counts["Video"], 1);
    }

    #[test]
    fn test_errors_only_suggestion_when_minority() {
        let dir = TempDir::new().unwrap();
        let mut content = String::new();
        for _ in 0..9 {
            content.push_str("INFO ok\n");
        }
        content.push_str("ERROR bad\n");
        let view = open_view(&dir, &content);
        let report = analyze(&view);
        assert!(report
            .result
            .insights
            .filter_suggestions
            .iter()
            .any(|s| s.levels == vec![Level::Error]));
    }

    #[test]
    fn test_hide_chatter_suggestion_when_debug_dominates() {
        let dir = TempDir::new().unwrap();
        let mut content = String::new();
        for _ in 0..8 {
            content.push_str("DEBUG tick\n");
        }
        content.push_str("INFO up\n");
        let view = open_view(&dir, &content);
        let report = analyze(&view);
        assert!(report
            .result
            .insights
            .filter_suggestions
            .iter()
            .any(|s| s.title.contains("debug/trace")));
    }

    #[test]
    fn test_time_range_recorded() {
        let dir = TempDir::new().unwrap();
        let view = open_view(
            &dir,
            "2024-01-15 10:00:00 start\n2024-01-15 10:05:00 end\n",
        );
        let report = analyze(&view);
        let range = report.result.time_range.unwrap();
        assert_eq!(range.end_ms - range.start_ms, 5 * 60 * 1000);
    }
}

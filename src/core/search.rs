// loglens - core/search.rs
//
// Full-file pattern search: literal, regex, and wildcard flavors with
// case/whole-word handling and optional column scoping. Matches are
// returned in ascending (line_number, column) order, capped at the match
// limit with a truncation signal.

use crate::core::model::{ColumnDelimiter, SearchMatch};
use crate::core::timestamp::byte_prefix;
use crate::core::view::FileView;
use crate::util::cancel::{CancelToken, ProgressFn, ProgressThrottle};
use crate::util::constants::{
    MAX_SEARCH_MATCHES, SCAN_PROGRESS_INTERVAL_MS, SEARCH_BATCH_LINES, SEARCH_SNIPPET_BYTES,
};
use crate::util::error::{EngineError, Result};
use memchr::memmem;
use regex::Regex;

// =============================================================================
// Options
// =============================================================================

/// Pattern interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchFlavor {
    /// Byte substring search.
    #[default]
    Literal,

    /// Perl-compatible regular expression.
    Regex,

    /// Glob-style: `*` matches any run, `?` matches one character.
    Wildcard,
}

/// Restrict matching to the byte ranges of selected columns.
#[derive(Debug, Clone)]
pub struct ColumnScope {
    pub delimiter: ColumnDelimiter,

    /// 0-based indices of the columns to search.
    pub visible_columns: Vec<usize>,
}

/// Fully typed search configuration.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub pattern: String,
    pub flavor: SearchFlavor,
    pub match_case: bool,

    /// Require a non-word character (or line boundary) on both sides of
    /// every match.
    pub whole_word: bool,

    pub column_scope: Option<ColumnScope>,

    /// When true, a regex that fails to compile degrades to a literal
    /// search with a warning instead of failing the operation.
    pub regex_literal_fallback: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            flavor: SearchFlavor::Literal,
            match_case: false,
            whole_word: false,
            column_scope: None,
            regex_literal_fallback: true,
        }
    }
}

/// Result of one search run.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub matches: Vec<SearchMatch>,

    /// True when the match cap was reached and further matches were
    /// dropped.
    pub truncated: bool,

    pub lines_scanned: u64,
}

// =============================================================================
// Compiled matcher
// =============================================================================

enum Matcher {
    /// `needle` is ASCII-lowercased when the search is case-insensitive;
    /// the haystack is lowercased the same way so byte offsets are stable.
    Literal { needle: Vec<u8> },
    Regex(Regex),
}

impl Matcher {
    fn compile(options: &SearchOptions) -> Result<Self> {
        match options.flavor {
            SearchFlavor::Literal => Ok(Self::literal(&options.pattern, options.match_case)),
            SearchFlavor::Regex => Self::regex(&options.pattern, options),
            SearchFlavor::Wildcard => {
                let mut translated = String::with_capacity(options.pattern.len() * 2);
                for ch in options.pattern.chars() {
                    match ch {
                        '*' => translated.push_str(".*"),
                        '?' => translated.push('.'),
                        other => translated.push_str(&regex::escape(&other.to_string())),
                    }
                }
                Self::regex(&translated, options)
            }
        }
    }

    fn literal(pattern: &str, match_case: bool) -> Self {
        let mut needle = pattern.as_bytes().to_vec();
        if !match_case {
            needle.make_ascii_lowercase();
        }
        Self::Literal { needle }
    }

    fn regex(pattern: &str, options: &SearchOptions) -> Result<Self> {
        let full = if options.match_case {
            pattern.to_string()
        } else {
            format!("(?i){pattern}")
        };
        match Regex::new(&full) {
            Ok(re) => Ok(Self::Regex(re)),
            Err(source) => {
                if options.regex_literal_fallback {
                    tracing::warn!(
                        pattern = %options.pattern,
                        error = %source,
                        "Regex failed to compile; falling back to literal search"
                    );
                    Ok(Self::literal(&options.pattern, options.match_case))
                } else {
                    Err(EngineError::InvalidRegex {
                        pattern: options.pattern.clone(),
                        source,
                    })
                }
            }
        }
    }

    /// All `(start, len)` byte spans matching within `text`.
    fn find_all(&self, text: &str, match_case: bool) -> Vec<(usize, usize)> {
        match self {
            Self::Literal { needle } => {
                if needle.is_empty() {
                    return Vec::new();
                }
                let haystack: std::borrow::Cow<'_, [u8]> = if match_case {
                    std::borrow::Cow::Borrowed(text.as_bytes())
                } else {
                    let mut lowered = text.as_bytes().to_vec();
                    lowered.make_ascii_lowercase();
                    std::borrow::Cow::Owned(lowered)
                };
                memmem::find_iter(&haystack, needle.as_slice())
                    .map(|start| (start, needle.len()))
                    .collect()
            }
            Self::Regex(re) => re
                .find_iter(text)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.len()))
                .collect(),
        }
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Whole-word check: the bytes adjacent to the span must be non-word
/// characters or line boundaries.
fn is_whole_word(text: &str, start: usize, len: usize) -> bool {
    let bytes = text.as_bytes();
    let before_ok = start == 0 || !is_word_byte(bytes[start - 1]);
    let after = start + len;
    let after_ok = after >= bytes.len() || !is_word_byte(bytes[after]);
    before_ok && after_ok
}

// =============================================================================
// Column splitting
// =============================================================================

/// Byte ranges `(start, end)` of each column of `text`.
pub fn column_ranges(text: &str, delimiter: ColumnDelimiter) -> Vec<(usize, usize)> {
    match delimiter {
        ColumnDelimiter::Char(c) => {
            let mut ranges = Vec::new();
            let mut start = 0;
            for (at, _) in text.match_indices(c) {
                ranges.push((start, at));
                start = at + c.len_utf8();
            }
            ranges.push((start, text.len()));
            ranges
        }
        ColumnDelimiter::Whitespace => {
            let bytes = text.as_bytes();
            let mut ranges = Vec::new();
            let mut i = 0;
            while i < bytes.len() {
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                let start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                if i > start {
                    ranges.push((start, i));
                }
            }
            ranges
        }
    }
}

// =============================================================================
// Search execution
// =============================================================================

/// Scan `view` for `options.pattern`.
///
/// `restrict` limits the scan to the given sorted line numbers (the active
/// filter projection). Cancellation is checked between 1k-line batches;
/// progress is the fraction of lines scanned, rate-limited.
pub fn search_file(
    view: &FileView,
    options: &SearchOptions,
    restrict: Option<&[u64]>,
    cancel: &CancelToken,
    mut progress: Option<ProgressFn<'_>>,
) -> Result<SearchOutcome> {
    if options.pattern.is_empty() {
        return Ok(SearchOutcome::default());
    }
    let matcher = Matcher::compile(options)?;

    let total = match restrict {
        Some(lines) => lines.len() as u64,
        None => view.total_lines(),
    };
    let mut throttle = ProgressThrottle::new(SCAN_PROGRESS_INTERVAL_MS);
    let mut outcome = SearchOutcome::default();
    let mut line_hits: Vec<(usize, usize)> = Vec::new();

    let mut scan = |i: u64, outcome: &mut SearchOutcome| -> bool {
        let text = match view.line_text(i) {
            Some(t) => t,
            None => return true,
        };
        line_hits.clear();
        match &options.column_scope {
            None => line_hits.extend(matcher.find_all(&text, options.match_case)),
            Some(scope) => {
                let ranges = column_ranges(&text, scope.delimiter);
                for &column_index in &scope.visible_columns {
                    if let Some(&(start, end)) = ranges.get(column_index) {
                        for (at, len) in matcher.find_all(&text[start..end], options.match_case) {
                            line_hits.push((start + at, len));
                        }
                    }
                }
                line_hits.sort_unstable();
            }
        }
        for &(start, len) in line_hits.iter() {
            if options.whole_word && !is_whole_word(&text, start, len) {
                continue;
            }
            if outcome.matches.len() >= MAX_SEARCH_MATCHES {
                outcome.truncated = true;
                return false;
            }
            outcome.matches.push(SearchMatch {
                line_number: i,
                column: start as u64,
                length: len as u64,
                line_text_snippet: byte_prefix(&text, SEARCH_SNIPPET_BYTES).to_string(),
            });
        }
        true
    };

    let mut run = |lines: &mut dyn Iterator<Item = u64>| -> Result<()> {
        for (scanned, i) in lines.enumerate() {
            if scanned as u64 % SEARCH_BATCH_LINES == 0 {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                if total > 0 {
                    throttle.report(&mut progress, scanned as f64 / total as f64);
                }
            }
            outcome.lines_scanned += 1;
            if !scan(i, &mut outcome) {
                break;
            }
        }
        Ok(())
    };

    match restrict {
        Some(lines) => run(&mut lines.iter().copied())?,
        None => run(&mut (0..view.total_lines()))?,
    }

    throttle.finish(&mut progress);
    tracing::debug!(
        pattern = %options.pattern,
        matches = outcome.matches.len(),
        truncated = outcome.truncated,
        scanned = outcome.lines_scanned,
        "Search complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn open_view(dir: &TempDir, content: &str) -> FileView {
        let path = dir.path().join("search.log");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        FileView::open(&path, &CancelToken::new(), None).unwrap()
    }

    fn search(view: &FileView, options: &SearchOptions) -> SearchOutcome {
        search_file(view, options, None, &CancelToken::new(), None).unwrap()
    }

    #[test]
    fn test_empty_pattern_returns_empty_without_error() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "anything\n");
        let outcome = search(&view, &SearchOptions::default());
        assert!(outcome.matches.is_empty());
        assert!(!outcome.truncated);
    }

    #[test]
    fn test_literal_case_insensitive_matches_contains() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "Connection FAILED\nconnection ok\nunrelated\n");
        let options = SearchOptions {
            pattern: "failed".to_string(),
            ..Default::default()
        };
        let outcome = search(&view, &options);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].line_number, 0);
        assert_eq!(outcome.matches[0].column, 11);
        assert_eq!(outcome.matches[0].length, 6);
    }

    #[test]
    fn test_literal_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "Error\nerror\n");
        let options = SearchOptions {
            pattern: "Error".to_string(),
            match_case: true,
            ..Default::default()
        };
        let outcome = search(&view, &options);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].line_number, 0);
    }

    #[test]
    fn test_multiple_matches_per_line_in_column_order() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "ab ab ab\n");
        let options = SearchOptions {
            pattern: "ab".to_string(),
            ..Default::default()
        };
        let outcome = search(&view, &options);
        let columns: Vec<u64> = outcome.matches.iter().map(|m| m.column).collect();
        assert_eq!(columns, vec![0, 3, 6]);
    }

    #[test]
    fn test_regex_flavor() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "code: 404\ncode: 500\nstatus ok\n");
        let options = SearchOptions {
            pattern: r"code:\s*5\d{2}".to_string(),
            flavor: SearchFlavor::Regex,
            ..Default::default()
        };
        let outcome = search(&view, &options);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].line_number, 1);
    }

    #[test]
    fn test_invalid_regex_without_fallback_is_error() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "anything\n");
        let options = SearchOptions {
            pattern: "[invalid".to_string(),
            flavor: SearchFlavor::Regex,
            regex_literal_fallback: false,
            ..Default::default()
        };
        let result = search_file(&view, &options, None, &CancelToken::new(), None);
        assert!(matches!(result, Err(EngineError::InvalidRegex { .. })));
    }

    #[test]
    fn test_invalid_regex_with_fallback_searches_literally() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "found [invalid here\nnothing\n");
        let options = SearchOptions {
            pattern: "[invalid".to_string(),
            flavor: SearchFlavor::Regex,
            ..Default::default()
        };
        let outcome = search(&view, &options);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].line_number, 0);
    }

    #[test]
    fn test_wildcard_flavor() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "task-17 done\ntask-9 running\nother\n");
        let options = SearchOptions {
            pattern: "task-*don?".to_string(),
            flavor: SearchFlavor::Wildcard,
            ..Default::default()
        };
        let outcome = search(&view, &options);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].line_number, 0);
    }

    #[test]
    fn test_whole_word() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "error\nerrors\npre-error.\n");
        let options = SearchOptions {
            pattern: "error".to_string(),
            whole_word: true,
            ..Default::default()
        };
        let outcome = search(&view, &options);
        let lines: Vec<u64> = outcome.matches.iter().map(|m| m.line_number).collect();
        assert_eq!(lines, vec![0, 2]);
    }

    #[test]
    fn test_restricted_to_projection() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "hit\nhit\nhit\nhit\n");
        let projection = vec![1, 3];
        let options = SearchOptions {
            pattern: "hit".to_string(),
            ..Default::default()
        };
        let outcome =
            search_file(&view, &options, Some(&projection), &CancelToken::new(), None).unwrap();
        let lines: Vec<u64> = outcome.matches.iter().map(|m| m.line_number).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_match_cap_sets_truncated() {
        let dir = TempDir::new().unwrap();
        let content = "hit\n".repeat(MAX_SEARCH_MATCHES + 50);
        let view = open_view(&dir, &content);
        let options = SearchOptions {
            pattern: "hit".to_string(),
            ..Default::default()
        };
        let outcome = search(&view, &options);
        assert_eq!(outcome.matches.len(), MAX_SEARCH_MATCHES);
        assert!(outcome.truncated);
    }

    #[test]
    fn test_column_scope_reports_line_relative_offsets() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "alpha,beta,gamma\nbeta,alpha,beta\n");
        let options = SearchOptions {
            pattern: "beta".to_string(),
            column_scope: Some(ColumnScope {
                delimiter: ColumnDelimiter::Char(','),
                visible_columns: vec![1],
            }),
            ..Default::default()
        };
        let outcome = search(&view, &options);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].line_number, 0);
        assert_eq!(outcome.matches[0].column, 6);
    }

    #[test]
    fn test_cancelled_search_returns_cancelled() {
        let dir = TempDir::new().unwrap();
        let view = open_view(&dir, "x\n");
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = SearchOptions {
            pattern: "x".to_string(),
            ..Default::default()
        };
        let result = search_file(&view, &options, None, &cancel, None);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn test_column_ranges_whitespace() {
        let ranges = column_ranges("  a  bb c", ColumnDelimiter::Whitespace);
        assert_eq!(ranges, vec![(2, 3), (5, 7), (8, 9)]);
    }
}

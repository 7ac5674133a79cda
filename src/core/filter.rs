// loglens - core/filter.rs
//
// Composite filter engine producing a visible-lines projection: the sorted
// list of real line numbers that remain visible. The projection is
// read-mostly and rebuilt on filter change; the owning session swaps it
// atomically so readers see either the old or the new one, never a
// partial.
//
// Evaluation order for the basic config:
//   1. keep = passes level AND passes any include (and the advanced
//      groups, when present)
//   2. exclude hits are computed separately
//   3. context lines are added around every kept line (clamped)
//   4. exclude hits are removed — exact lines only, context is never
//      removed
//   5. sorted unique line numbers are emitted

use crate::core::model::Level;
use crate::core::view::{detect_level, FileView};
use crate::util::cancel::{CancelToken, ProgressFn, ProgressThrottle};
use crate::util::constants::{SCAN_BATCH_LINES, SCAN_PROGRESS_INTERVAL_MS};
use crate::util::error::{EngineError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// =============================================================================
// Configuration
// =============================================================================

/// A plain filter pattern, matched as a substring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterPattern {
    pub pattern: String,

    #[serde(default)]
    pub case_sensitive: bool,
}

impl FilterPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            case_sensitive: false,
        }
    }
}

/// How the rules of an advanced group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupOperator {
    And,
    Or,
}

/// One advanced rule. Regex patterns are pre-compiled; an invalid regex in
/// a positive role evaluates false, in a negated role evaluates true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub pattern: String,

    #[serde(default)]
    pub is_regex: bool,

    #[serde(default)]
    pub case_sensitive: bool,

    /// Invert the rule: the line must NOT match.
    #[serde(default)]
    pub negate: bool,
}

/// A group of rules joined by `operator`; groups are AND-combined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterGroup {
    pub operator: GroupOperator,
    pub rules: Vec<FilterRule>,
}

/// Rule groups evaluated on top of the basic config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedFilter {
    pub groups: Vec<FilterGroup>,
}

/// Complete filter configuration for one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Levels to keep. Empty = any level passes.
    #[serde(default)]
    pub levels: HashSet<Level>,

    /// A line passes if it matches any include. Empty = pass-through.
    #[serde(default)]
    pub include_patterns: Vec<FilterPattern>,

    /// Matching lines are removed from the projection (exact lines only).
    #[serde(default)]
    pub exclude_patterns: Vec<FilterPattern>,

    /// Context lines added around every kept line.
    #[serde(default)]
    pub context_lines: u64,

    #[serde(default)]
    pub advanced: Option<AdvancedFilter>,
}

impl FilterConfig {
    /// True if no filters are active (projection = identity).
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
            && self.include_patterns.is_empty()
            && self.exclude_patterns.is_empty()
            && self
                .advanced
                .as_ref()
                .map_or(true, |a| a.groups.is_empty())
    }
}

// =============================================================================
// Compiled form
// =============================================================================

enum TextMatcher {
    Substring {
        needle: String,
        case_sensitive: bool,
    },
    Regex(Regex),
}

impl TextMatcher {
    fn substring(pattern: &FilterPattern) -> Self {
        let needle = if pattern.case_sensitive {
            pattern.pattern.clone()
        } else {
            pattern.pattern.to_lowercase()
        };
        Self::Substring {
            needle,
            case_sensitive: pattern.case_sensitive,
        }
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Self::Substring {
                needle,
                case_sensitive,
            } => {
                if *case_sensitive {
                    text.contains(needle.as_str())
                } else {
                    text.to_lowercase().contains(needle.as_str())
                }
            }
            Self::Regex(re) => re.is_match(text),
        }
    }
}

struct CompiledRule {
    /// `None` when the regex failed to compile; the rule then evaluates to
    /// its role default (false for positive, true for negated).
    matcher: Option<TextMatcher>,
    negate: bool,
}

impl CompiledRule {
    fn compile(rule: &FilterRule) -> Self {
        let matcher = if rule.is_regex {
            let pattern = if rule.case_sensitive {
                rule.pattern.clone()
            } else {
                format!("(?i){}", rule.pattern)
            };
            match Regex::new(&pattern) {
                Ok(re) => Some(TextMatcher::Regex(re)),
                Err(e) => {
                    tracing::warn!(
                        pattern = %rule.pattern,
                        error = %e,
                        "Invalid advanced-filter regex; rule degraded"
                    );
                    None
                }
            }
        } else {
            Some(TextMatcher::substring(&FilterPattern {
                pattern: rule.pattern.clone(),
                case_sensitive: rule.case_sensitive,
            }))
        };
        Self {
            matcher,
            negate: rule.negate,
        }
    }

    fn eval(&self, text: &str) -> bool {
        match &self.matcher {
            Some(m) => {
                let hit = m.matches(text);
                if self.negate {
                    !hit
                } else {
                    hit
                }
            }
            None => self.negate,
        }
    }
}

struct CompiledGroup {
    operator: GroupOperator,
    rules: Vec<CompiledRule>,
}

impl CompiledGroup {
    fn eval(&self, text: &str) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        match self.operator {
            GroupOperator::And => self.rules.iter().all(|r| r.eval(text)),
            GroupOperator::Or => self.rules.iter().any(|r| r.eval(text)),
        }
    }
}

// =============================================================================
// Projection build
// =============================================================================

/// Evaluate `config` over every line of `view` and return the sorted
/// unique visible-line projection.
///
/// Processes 10k-line batches with a cancellation check and rate-limited
/// progress between batches. On cancel the caller retains its previous
/// projection.
pub fn build_projection(
    view: &FileView,
    config: &FilterConfig,
    cancel: &CancelToken,
    mut progress: Option<ProgressFn<'_>>,
) -> Result<Vec<u64>> {
    let total = view.total_lines();
    if config.is_empty() {
        return Ok((0..total).collect());
    }

    let includes: Vec<TextMatcher> = config
        .include_patterns
        .iter()
        .map(TextMatcher::substring)
        .collect();
    let excludes: Vec<TextMatcher> = config
        .exclude_patterns
        .iter()
        .map(TextMatcher::substring)
        .collect();
    let groups: Vec<CompiledGroup> = config
        .advanced
        .iter()
        .flat_map(|a| a.groups.iter())
        .map(|g| CompiledGroup {
            operator: g.operator,
            rules: g.rules.iter().map(CompiledRule::compile).collect(),
        })
        .collect();

    let mut throttle = ProgressThrottle::new(SCAN_PROGRESS_INTERVAL_MS);
    let mut included: Vec<u64> = Vec::new();
    let mut excluded: Vec<u64> = Vec::new();

    for i in 0..total {
        if i % SCAN_BATCH_LINES == 0 {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if total > 0 {
                throttle.report(&mut progress, i as f64 / total as f64);
            }
        }

        let text = match view.line_text(i) {
            Some(t) => t,
            None => continue,
        };

        let level_pass = config.levels.is_empty()
            || detect_level(&text).is_some_and(|l| config.levels.contains(&l));
        let include_pass =
            includes.is_empty() || includes.iter().any(|m| m.matches(&text));
        let advanced_pass = groups.iter().all(|g| g.eval(&text));

        if level_pass && include_pass && advanced_pass {
            included.push(i);
        }
        if !excludes.is_empty() && excludes.iter().any(|m| m.matches(&text)) {
            excluded.push(i);
        }
    }

    // Context expansion over the sorted included lines, producing a sorted
    // unique candidate list in one sweep.
    let k = config.context_lines;
    let mut candidates: Vec<u64> = Vec::with_capacity(included.len());
    let mut next_free = 0u64;
    for &i in &included {
        let lo = i.saturating_sub(k).max(next_free);
        let hi = i.saturating_add(k).saturating_add(1).min(total);
        for j in lo..hi {
            candidates.push(j);
        }
        next_free = next_free.max(hi);
    }

    // Remove exclude hits — exact lines only; context lines always stay.
    let projection = if excluded.is_empty() {
        candidates
    } else {
        let mut out = Vec::with_capacity(candidates.len());
        let mut ex = excluded.iter().copied().peekable();
        for j in candidates {
            while ex.peek().is_some_and(|&e| e < j) {
                ex.next();
            }
            if ex.peek().copied() == Some(j) {
                continue;
            }
            out.push(j);
        }
        out
    };

    throttle.finish(&mut progress);
    tracing::debug!(
        total,
        visible = projection.len(),
        context = config.context_lines,
        "Filter projection built"
    );
    Ok(projection)
}

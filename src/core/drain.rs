// loglens - core/drain.rs
//
// Online log-template discovery via a fixed-depth prefix tree (Drain
// style). Each line either merges into an existing cluster — wildcarding
// the positions where tokens differ — or spawns a new cluster.
//
// Tree shape: the root buckets by token count; below it a prefix tree of
// fixed depth keyed by the leading tokens (variables keyed as `<*>`).
// Nodes collapse further distinct tokens into a single `<*>` child once
// they reach the child cap.

use crate::core::model::{
    AnalysisInsights, AnalysisResult, AnalysisStats, CrashInfo, FilterSuggestion, Level,
    PatternCluster, TimeRange, Token,
};
use crate::core::timestamp::{byte_prefix, parse_leading_timestamp};
use crate::core::view::{detect_level, FileView};
use crate::util::cancel::{CancelToken, ProgressFn, ProgressThrottle};
use crate::util::constants::{
    ANALYSIS_LINE_BYTES, BASELINE_MAX_CRASHES, CRITICAL_KEYWORDS, DRAIN_MAX_CHILDREN,
    DRAIN_MAX_CLUSTERS, DRAIN_MAX_OUTPUT, DRAIN_MAX_SAMPLES, DRAIN_SIMILARITY_THRESHOLD,
    DRAIN_TREE_DEPTH, NOISE_MIN_COUNT, SCAN_BATCH_LINES, SCAN_PROGRESS_INTERVAL_MS,
};
use crate::util::error::{EngineError, Result};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Tunables for the clusterer; the defaults are the recommended values.
#[derive(Debug, Clone)]
pub struct DrainConfig {
    pub depth: usize,
    pub similarity_threshold: f64,
    pub max_children: usize,
    pub max_clusters: usize,
    pub max_output: usize,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            depth: DRAIN_TREE_DEPTH,
            similarity_threshold: DRAIN_SIMILARITY_THRESHOLD,
            max_children: DRAIN_MAX_CHILDREN,
            max_clusters: DRAIN_MAX_CLUSTERS,
            max_output: DRAIN_MAX_OUTPUT,
        }
    }
}

#[derive(Default)]
struct TreeNode {
    children: HashMap<String, TreeNode>,
    cluster_ids: Vec<usize>,
}

struct ClusterState {
    template: Vec<Token>,
    count: u64,
    samples: Vec<u64>,
    level: Option<Level>,
}

/// Incremental clusterer; feed lines in order, then `finalize`.
pub struct DrainClusterer {
    config: DrainConfig,
    roots: HashMap<usize, TreeNode>,
    clusters: Vec<ClusterState>,
    dropped: u64,
}

impl DrainClusterer {
    pub fn new(config: DrainConfig) -> Self {
        Self {
            config,
            roots: HashMap::new(),
            clusters: Vec::new(),
            dropped: 0,
        }
    }

    /// Merge one line into the tree.
    pub fn add_line(&mut self, line_number: u64, text: &str, level: Option<Level>) {
        let raw = tokenize(text);
        if raw.is_empty() {
            return;
        }
        let keyed: Vec<&str> = raw
            .iter()
            .map(|t| if is_variable(t) { "<*>" } else { *t })
            .collect();
        let len = raw.len();

        // Descend the fixed-depth prefix tree under the length bucket.
        let mut node = self.roots.entry(len).or_default();
        for key in keyed.iter().take(self.config.depth) {
            let key = if node.children.contains_key(*key) {
                (*key).to_string()
            } else if node.children.len() >= self.config.max_children {
                "<*>".to_string()
            } else {
                (*key).to_string()
            };
            node = node.children.entry(key).or_default();
        }

        // Best-matching cluster of the same length at this leaf. The score
        // uses the original tokens so a literal position still matches its
        // own recurring value.
        let mut best: Option<(usize, f64)> = None;
        for &cid in &node.cluster_ids {
            let cluster = &self.clusters[cid];
            if cluster.template.len() != len {
                continue;
            }
            let score = similarity(&cluster.template, &raw);
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((cid, score));
            }
        }

        match best.filter(|&(_, score)| score >= self.config.similarity_threshold) {
            Some((cid, _)) => {
                let cluster = &mut self.clusters[cid];
                for (slot, token) in cluster.template.iter_mut().zip(raw.iter()) {
                    if let Token::Literal(lit) = slot {
                        if lit != token {
                            *slot = Token::Wildcard;
                        }
                    }
                }
                cluster.count += 1;
                if cluster.samples.len() < DRAIN_MAX_SAMPLES {
                    cluster.samples.push(line_number);
                }
                if cluster.level.is_none() {
                    cluster.level = level;
                }
            }
            None => {
                if self.clusters.len() >= self.config.max_clusters {
                    // Rare in practice; dropped silently by design intent,
                    // counted for the trace log only.
                    self.dropped += 1;
                    return;
                }
                let template = keyed
                    .iter()
                    .map(|k| {
                        if *k == "<*>" {
                            Token::Wildcard
                        } else {
                            Token::Literal((*k).to_string())
                        }
                    })
                    .collect();
                let cid = self.clusters.len();
                self.clusters.push(ClusterState {
                    template,
                    count: 1,
                    samples: vec![line_number],
                    level,
                });
                node.cluster_ids.push(cid);
            }
        }
    }

    /// Clusters seen more than once, sorted by count descending, capped at
    /// the configured output limit.
    pub fn finalize(&self) -> Vec<PatternCluster> {
        let mut out: Vec<PatternCluster> = self
            .clusters
            .iter()
            .filter(|c| c.count > 1)
            .map(|c| PatternCluster {
                template: c.template.clone(),
                count: c.count,
                sample_line_numbers: c.samples.clone(),
                detected_level: c.level,
            })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count));
        out.truncate(self.config.max_output);
        if self.dropped > 0 {
            tracing::trace!(dropped = self.dropped, "Cluster cap overflow");
        }
        out
    }
}

// =============================================================================
// Tokenization & variable detection
// =============================================================================

/// Split on whitespace and the punctuation class `=:,[](){}`.
fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| {
        c.is_whitespace() || matches!(c, '=' | ':' | ',' | '[' | ']' | '(' | ')' | '{' | '}')
    })
    .filter(|t| !t.is_empty())
    .collect()
}

/// True for tokens that are parameter-like: numbers, decimals, long hex,
/// UUIDs, IPv4 addresses, e-mail addresses, URLs, filesystem paths.
fn is_variable(token: &str) -> bool {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        fn re(pat: &str) -> Regex {
            Regex::new(pat).expect("is_variable: invalid regex")
        }
        vec![
            re(r"^\d+$"),
            re(r"^\d+\.\d+$"),
            re(r"^(?:0x)?[0-9a-fA-F]{8,}$"),
            re(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"),
            re(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}(?::\d+)?$"),
            re(r"^[^\s@]+@[^\s@]+\.[^\s@]+$"),
            re(r"^https?://"),
            re(r"^(?:/[^/\s]+){2,}/?$|^[A-Za-z]:\\"),
        ]
    });
    patterns.iter().any(|re| re.is_match(token))
}

/// Fraction of positions where the template is `<*>` or equals the token.
fn similarity(template: &[Token], tokens: &[&str]) -> f64 {
    if template.is_empty() {
        return 0.0;
    }
    let hits = template
        .iter()
        .zip(tokens.iter())
        .filter(|(slot, token)| match slot {
            Token::Wildcard => true,
            Token::Literal(lit) => lit == *token,
        })
        .count();
    hits as f64 / template.len() as f64
}

// =============================================================================
// Analysis driver
// =============================================================================

/// Clusters plus the unified analysis result shape.
#[derive(Debug, Clone)]
pub struct DrainReport {
    pub clusters: Vec<PatternCluster>,
    pub result: AnalysisResult,
}

/// Run the clusterer over the whole file, producing pattern groups and an
/// `AnalysisResult` the baseline store can consume.
pub fn analyze_with_drain(
    view: &FileView,
    config: DrainConfig,
    cancel: &CancelToken,
    mut progress: Option<ProgressFn<'_>>,
) -> Result<DrainReport> {
    let total = view.total_lines();
    let mut clusterer = DrainClusterer::new(config);
    let mut throttle = ProgressThrottle::new(SCAN_PROGRESS_INTERVAL_MS);

    let mut level_counts: BTreeMap<Level, u64> = BTreeMap::new();
    let mut first_ts: Option<i64> = None;
    let mut last_ts: Option<i64> = None;
    let mut crashes: Vec<CrashInfo> = Vec::new();
    let mut seen_keywords: Vec<&'static str> = Vec::new();
    let mut analyzed = 0u64;

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
        analyzed += 1;

        let level = detect_level(&text);
        if let Some(level) = level {
            *level_counts.entry(level).or_insert(0) += 1;
        }
        if let Some(ts) = parse_leading_timestamp(&text) {
            if first_ts.is_none() {
                first_ts = Some(ts.epoch_ms);
            }
            last_ts = Some(ts.epoch_ms);
        }
        if crashes.len() < BASELINE_MAX_CRASHES {
            if let Some(keyword) = critical_keyword(&text) {
                if !seen_keywords.contains(&keyword) {
                    seen_keywords.push(keyword);
                    crashes.push(CrashInfo {
                        keyword: keyword.to_string(),
                        line_number: i,
                        snippet: byte_prefix(&text, ANALYSIS_LINE_BYTES).to_string(),
                    });
                }
            }
        }

        clusterer.add_line(i, &text, level);
    }

    let clusters = clusterer.finalize();
    let filter_suggestions = suggest_from_clusters(&clusters, analyzed);

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
        analyzer_name: "drain".to_string(),
        insights: AnalysisInsights {
            crashes,
            top_failing_components: Vec::new(),
            filter_suggestions,
        },
    };

    tracing::debug!(
        lines = analyzed,
        clusters = clusters.len(),
        "Drain analysis complete"
    );
    Ok(DrainReport { clusters, result })
}

/// First critical keyword contained in `text`, case-insensitive.
pub(crate) fn critical_keyword(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    CRITICAL_KEYWORDS
        .iter()
        .find(|k| lower.contains(*k))
        .copied()
}

/// Deterministic suggestions: hide the dominant clusters that qualify as
/// noise.
fn suggest_from_clusters(clusters: &[PatternCluster], analyzed: u64) -> Vec<FilterSuggestion> {
    let threshold = NOISE_MIN_COUNT.max(analyzed / 100);
    clusters
        .iter()
        .take(3)
        .filter(|c| c.count >= threshold)
        .map(|c| {
            let text = c.template_text();
            FilterSuggestion {
                title: format!("Hide repetitive pattern ({}x)", c.count),
                description: format!("Exclude lines matching '{text}'"),
                pattern: first_literal_words(&c.template, 3),
                exclude: true,
                levels: Vec::new(),
            }
        })
        .collect()
}

/// Join the first `n` literal tokens into a filter pattern.
fn first_literal_words(template: &[Token], n: usize) -> Option<String> {
    let words: Vec<&str> = template
        .iter()
        .filter_map(|t| match t {
            Token::Literal(s) if s.len() > 1 => Some(s.as_str()),
            _ => None,
        })
        .take(n)
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_texts(clusterer: &DrainClusterer) -> Vec<(String, u64)> {
        clusterer
            .finalize()
            .iter()
            .map(|c| (c.template_text(), c.count))
            .collect()
    }

    #[test]
    fn test_numeric_field_becomes_wildcard() {
        let mut clusterer = DrainClusterer::new(DrainConfig::default());
        clusterer.add_line(0, "connected to peer 17", None);
        clusterer.add_line(1, "connected to peer 99", None);
        let clusters = clusterer.finalize();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count, 2);
        assert_eq!(clusters[0].template_text(), "connected to peer <*>");
    }

    #[test]
    fn test_differing_literal_becomes_wildcard_on_merge() {
        let mut clusterer = DrainClusterer::new(DrainConfig::default());
        clusterer.add_line(0, "job alpha finished ok now", None);
        clusterer.add_line(1, "job alpha finished ok late", None);
        let texts = cluster_texts(&clusterer);
        assert_eq!(texts, vec![("job alpha finished ok <*>".to_string(), 2)]);
    }

    #[test]
    fn test_dissimilar_lines_form_separate_clusters() {
        let mut clusterer = DrainClusterer::new(DrainConfig::default());
        clusterer.add_line(0, "alpha beta gamma delta", None);
        clusterer.add_line(1, "one two three four", None);
        clusterer.add_line(2, "alpha beta gamma delta", None);
        clusterer.add_line(3, "one two three four", None);
        assert_eq!(clusterer.finalize().len(), 2);
    }

    #[test]
    fn test_singleton_clusters_not_emitted() {
        let mut clusterer = DrainClusterer::new(DrainConfig::default());
        clusterer.add_line(0, "only once ever seen", None);
        assert!(clusterer.finalize().is_empty());
    }

    #[test]
    fn test_samples_bounded_and_subset() {
        let mut clusterer = DrainClusterer::new(DrainConfig::default());
        for i in 0..25 {
            clusterer.add_line(i, "worker started cleanly today", None);
        }
        let clusters = clusterer.finalize();
        assert_eq!(clusters[0].count, 25);
        assert_eq!(clusters[0].sample_line_numbers.len(), DRAIN_MAX_SAMPLES);
        assert!(clusters[0]
            .sample_line_numbers
            .iter()
            .all(|&n| n < 25));
    }

    #[test]
    fn test_tokenizer_strips_punctuation_class() {
        assert_eq!(
            tokenize("a=1, b:[2] (c){d}"),
            vec!["a", "1", "b", "2", "c", "d"]
        );
    }

    #[test]
    fn test_variable_detection() {
        assert!(is_variable("12345"));
        assert!(is_variable("3.14"));
        assert!(is_variable("deadbeef01"));
        assert!(is_variable("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_variable("10.0.0.1"));
        assert!(is_variable("10.0.0.1:8080"));
        assert!(is_variable("user@example.com"));
        assert!(is_variable("https://example.com/x"));
        assert!(is_variable("/var/log/app.log"));
        assert!(!is_variable("connected"));
        assert!(!is_variable("ERROR"));
    }

    #[test]
    fn test_variables_keyed_as_wildcard_in_new_template() {
        let mut clusterer = DrainClusterer::new(DrainConfig::default());
        clusterer.add_line(0, "request from 10.0.0.1 accepted now", None);
        clusterer.add_line(1, "request from 10.0.0.2 accepted now", None);
        let clusters = clusterer.finalize();
        assert_eq!(clusters[0].template_text(), "request from <*> accepted now");
    }

    #[test]
    fn test_cluster_cap_drops_overflow_silently() {
        let config = DrainConfig {
            max_clusters: 2,
            ..Default::default()
        };
        let mut clusterer = DrainClusterer::new(config);
        clusterer.add_line(0, "aa bb cc dd", None);
        clusterer.add_line(1, "ee ff gg hh", None);
        clusterer.add_line(2, "ii jj kk ll", None); // dropped
        assert_eq!(clusterer.clusters.len(), 2);
    }

    #[test]
    fn test_output_sorted_by_count_descending() {
        let mut clusterer = DrainClusterer::new(DrainConfig::default());
        for i in 0..2 {
            clusterer.add_line(i, "rare event kind one", None);
        }
        for i in 2..7 {
            clusterer.add_line(i, "frequent heartbeat tick msg", None);
        }
        let clusters = clusterer.finalize();
        assert_eq!(clusters[0].count, 5);
        assert_eq!(clusters[1].count, 2);
    }

    #[test]
    fn test_detected_level_from_first_classified_line() {
        let mut clusterer = DrainClusterer::new(DrainConfig::default());
        clusterer.add_line(0, "disk write failed badly", Some(Level::Error));
        clusterer.add_line(1, "disk write failed badly", None);
        let clusters = clusterer.finalize();
        assert_eq!(clusters[0].detected_level, Some(Level::Error));
    }

    #[test]
    fn test_critical_keyword_lookup() {
        assert_eq!(critical_keyword("FATAL: boom"), Some("fatal"));
        assert_eq!(critical_keyword("request timed out? no: Timeout"), Some("timeout"));
        assert_eq!(critical_keyword("all fine"), None);
    }
}

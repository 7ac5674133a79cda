// loglens - core/baseline.rs
//
// Baseline fingerprints and comparison. A fingerprint is a compact
// statistical summary of one log run — level distribution, timestamp
// density, failing components, crash keywords, sample lines — sufficient
// to detect regressions between two runs. Comparison is deterministic and
// classifies divergences into severity-ordered findings.

use crate::core::columns::bracket_channel;
use crate::core::model::{AnalysisResult, CrashInfo, FailingComponent, Level, TimeRange};
use crate::core::timestamp::{byte_prefix, parse_leading_timestamp};
use crate::core::view::{detect_level, FileView};
use crate::util::cancel::{CancelToken, ProgressFn, ProgressThrottle};
use crate::util::constants::{
    BASELINE_MAX_COMPARE_LINES, BASELINE_MAX_COMPONENTS, BASELINE_MAX_CRASHES,
    BASELINE_MAX_DENSITY_BUCKETS, BASELINE_MAX_STRING_BYTES, BASELINE_MISSING_CHANNEL_MIN_LINES,
    BASELINE_RATIO_CRITICAL, BASELINE_RATIO_WARNING, BASELINE_SAMPLES_PER_COMPONENT,
    BASELINE_SAMPLES_PER_LEVEL, BASELINE_SHIFT_CRITICAL_PP, BASELINE_SHIFT_WARNING_PP,
    BASELINE_VARIANCE_RATIO, SCAN_BATCH_LINES, SCAN_PROGRESS_INTERVAL_MS,
};
use crate::util::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Fingerprint
// =============================================================================

/// Compact statistical summary of one log run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineFingerprint {
    pub source_file: String,
    pub file_size: u64,
    pub total_lines: u64,
    pub analyzer_name: String,

    #[serde(default)]
    pub time_range: Option<TimeRange>,

    /// Lines per minute offset from the first seen timestamp, at most 1440
    /// buckets (24 h).
    #[serde(default)]
    pub timestamp_density: Vec<u32>,

    #[serde(default)]
    pub level_counts: BTreeMap<Level, u64>,

    #[serde(default)]
    pub level_percentages: BTreeMap<Level, f64>,

    #[serde(default)]
    pub crashes: Vec<CrashInfo>,

    #[serde(default)]
    pub failing_components: Vec<FailingComponent>,

    #[serde(default)]
    pub channel_counts: BTreeMap<String, u64>,

    /// Up to 10 evenly spaced sample lines per level present.
    #[serde(default)]
    pub sample_lines: BTreeMap<Level, Vec<String>>,

    /// Up to 5 error/warning sample lines per failing component.
    #[serde(default)]
    pub component_samples: BTreeMap<String, Vec<String>>,
}

/// Clamp a fingerprint string to the 200-byte cap.
fn capped(text: &str) -> String {
    byte_prefix(text, BASELINE_MAX_STRING_BYTES).to_string()
}

/// Build a fingerprint for `view` from its analysis result.
///
/// Runs a single pass over the file in 10k-line batches: timestamp
/// density, channel mentions, evenly spaced per-level samples, and
/// per-component samples are all collected in that one pass.
pub fn build_fingerprint(
    view: &FileView,
    analysis: &AnalysisResult,
    cancel: &CancelToken,
    mut progress: Option<ProgressFn<'_>>,
) -> Result<BaselineFingerprint> {
    let info = view.info();
    let total = info.total_lines;

    let counted: u64 = analysis.level_counts.values().sum();
    let level_percentages: BTreeMap<Level, f64> = analysis
        .level_counts
        .iter()
        .map(|(level, count)| {
            let pct = if counted > 0 {
                *count as f64 * 100.0 / counted as f64
            } else {
                0.0
            };
            (*level, pct)
        })
        .collect();

    let crashes: Vec<CrashInfo> = analysis
        .insights
        .crashes
        .iter()
        .take(BASELINE_MAX_CRASHES)
        .map(|c| CrashInfo {
            keyword: capped(&c.keyword),
            line_number: c.line_number,
            snippet: capped(&c.snippet),
        })
        .collect();

    let failing_components: Vec<FailingComponent> = analysis
        .insights
        .top_failing_components
        .iter()
        .take(BASELINE_MAX_COMPONENTS)
        .map(|c| FailingComponent {
            name: capped(&c.name),
            error_count: c.error_count,
            snippet: capped(&c.snippet),
        })
        .collect();

    let sample_interval = (total / BASELINE_SAMPLES_PER_LEVEL as u64).max(1);
    let mut sample_lines: BTreeMap<Level, Vec<String>> = BTreeMap::new();
    let mut next_sample_at: BTreeMap<Level, u64> = BTreeMap::new();
    let mut component_samples: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut channel_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut density: Vec<u32> = Vec::new();
    let mut first_ts: Option<i64> = None;

    let mut throttle = ProgressThrottle::new(SCAN_PROGRESS_INTERVAL_MS);
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

        // Timestamp minute-density histogram from the first seen timestamp.
        if let Some(ts) = parse_leading_timestamp(&text) {
            let first = *first_ts.get_or_insert(ts.epoch_ms);
            let offset_ms = ts.epoch_ms.saturating_sub(first);
            let bucket = (offset_ms / 60_000) as usize;
            if bucket < BASELINE_MAX_DENSITY_BUCKETS {
                if density.len() <= bucket {
                    density.resize(bucket + 1, 0);
                }
                density[bucket] = density[bucket].saturating_add(1);
            }
        }

        // Channel mention, once per line.
        if let Some(channel) = bracket_channel(&text) {
            *channel_counts.entry(channel).or_insert(0) += 1;
        }

        let level = detect_level(&text);

        // Evenly spaced samples per level.
        if let Some(level) = level {
            let due = next_sample_at.entry(level).or_insert(0);
            let taken = sample_lines.entry(level).or_default();
            if taken.len() < BASELINE_SAMPLES_PER_LEVEL && i >= *due {
                taken.push(capped(&text));
                *due = i + sample_interval;
            }
        }

        // Component samples on error/warning lines.
        if matches!(level, Some(Level::Error) | Some(Level::Warning)) {
            for component in &failing_components {
                if text.contains(component.name.as_str()) {
                    let samples = component_samples
                        .entry(component.name.clone())
                        .or_default();
                    if samples.len() < BASELINE_SAMPLES_PER_COMPONENT {
                        samples.push(capped(&text));
                    }
                    break;
                }
            }
        }
    }
    throttle.finish(&mut progress);

    Ok(BaselineFingerprint {
        source_file: info.path.display().to_string(),
        file_size: info.size_bytes,
        total_lines: total,
        analyzer_name: analysis.analyzer_name.clone(),
        time_range: analysis.time_range,
        timestamp_density: density,
        level_counts: analysis.level_counts.clone(),
        level_percentages,
        crashes,
        failing_components,
        channel_counts,
        sample_lines,
        component_samples,
    })
}

// =============================================================================
// Comparison
// =============================================================================

/// Finding severity, most severe first; report ordering follows this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingCategory {
    LevelShift,
    NewCrash,
    NewComponent,
    MissingComponent,
    ErrorRate,
    TimePattern,
}

/// One divergence between the current run and the baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: FindingSeverity,
    pub category: FindingCategory,
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub findings: Vec<Finding>,
    pub summary: ComparisonSummary,
}

/// Population variance of a density histogram.
fn variance(buckets: &[u32]) -> f64 {
    if buckets.is_empty() {
        return 0.0;
    }
    let n = buckets.len() as f64;
    let mean = buckets.iter().map(|&b| b as f64).sum::<f64>() / n;
    buckets
        .iter()
        .map(|&b| {
            let d = b as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// Compare `current` against `baseline` and classify divergences.
///
/// Refuses with `TooLarge` when either side exceeds the comparison cap.
/// The minute-bucket variance check is deliberately unnormalized by total
/// line count, so it is sensitive to large file-size ratios.
pub fn compare_fingerprints(
    current: &BaselineFingerprint,
    baseline: &BaselineFingerprint,
) -> Result<ComparisonReport> {
    for side in [current, baseline] {
        if side.total_lines > BASELINE_MAX_COMPARE_LINES {
            return Err(EngineError::TooLarge {
                lines: side.total_lines,
                max: BASELINE_MAX_COMPARE_LINES,
            });
        }
    }

    let mut findings: Vec<Finding> = Vec::new();

    // --- Level percentage shifts -------------------------------------------
    for level in Level::all() {
        let cur = current.level_percentages.get(level).copied().unwrap_or(0.0);
        let base = baseline
            .level_percentages
            .get(level)
            .copied()
            .unwrap_or(0.0);
        let shift = (cur - base).abs();
        let severity = if shift > BASELINE_SHIFT_CRITICAL_PP {
            FindingSeverity::Critical
        } else if shift >= BASELINE_SHIFT_WARNING_PP {
            FindingSeverity::Warning
        } else {
            continue;
        };
        findings.push(Finding {
            severity,
            category: FindingCategory::LevelShift,
            title: format!("{level} share shifted from {base:.1}% to {cur:.1}%"),
            detail: format!(
                "{level} lines moved by {shift:.1} percentage points against the baseline"
            ),
        });
    }

    // --- New crash keywords -------------------------------------------------
    let baseline_keywords: Vec<String> = baseline
        .crashes
        .iter()
        .map(|c| c.keyword.to_lowercase())
        .collect();
    for crash in &current.crashes {
        if !baseline_keywords.contains(&crash.keyword.to_lowercase()) {
            findings.push(Finding {
                severity: FindingSeverity::Critical,
                category: FindingCategory::NewCrash,
                title: format!("New crash keyword '{}'", crash.keyword),
                detail: format!(
                    "Line {}: {}",
                    crash.line_number, crash.snippet
                ),
            });
        }
    }

    // --- Component changes --------------------------------------------------
    let baseline_component = |name: &str| {
        baseline
            .failing_components
            .iter()
            .find(|c| c.name == name)
    };
    for component in &current.failing_components {
        match baseline_component(&component.name) {
            None => findings.push(Finding {
                severity: FindingSeverity::Warning,
                category: FindingCategory::NewComponent,
                title: format!("Component '{}' started failing", component.name),
                detail: format!(
                    "{} error/warning lines; not failing in the baseline",
                    component.error_count
                ),
            }),
            Some(before) if before.error_count > 0 => {
                let ratio = component.error_count as f64 / before.error_count as f64;
                let severity = if ratio > BASELINE_RATIO_CRITICAL {
                    FindingSeverity::Critical
                } else if ratio >= BASELINE_RATIO_WARNING {
                    FindingSeverity::Warning
                } else {
                    continue;
                };
                findings.push(Finding {
                    severity,
                    category: FindingCategory::ErrorRate,
                    title: format!(
                        "Component '{}' error rate {:.1}x baseline",
                        component.name, ratio
                    ),
                    detail: format!(
                        "{} error/warning lines now vs {} in the baseline",
                        component.error_count, before.error_count
                    ),
                });
            }
            Some(_) => {}
        }
    }

    // --- Channels that disappeared ------------------------------------------
    for (channel, count) in &baseline.channel_counts {
        if *count > BASELINE_MISSING_CHANNEL_MIN_LINES
            && !current.channel_counts.contains_key(channel)
        {
            findings.push(Finding {
                severity: FindingSeverity::Info,
                category: FindingCategory::MissingComponent,
                title: format!("Channel '{channel}' is silent"),
                detail: format!(
                    "{count} lines in the baseline, none in the current run"
                ),
            });
        }
    }

    // --- Timestamp density variance -----------------------------------------
    let cur_var = variance(&current.timestamp_density);
    let base_var = variance(&baseline.timestamp_density);
    let burstier = if base_var > 0.0 {
        cur_var > base_var * BASELINE_VARIANCE_RATIO
    } else {
        cur_var > 0.0 && !current.timestamp_density.is_empty() && !baseline.timestamp_density.is_empty()
    };
    if burstier {
        findings.push(Finding {
            severity: FindingSeverity::Info,
            category: FindingCategory::TimePattern,
            title: "Log volume is burstier than the baseline".to_string(),
            detail: format!(
                "Minute-bucket variance {cur_var:.1} vs {base_var:.1} in the baseline"
            ),
        });
    }

    findings.sort_by_key(|f| f.severity);
    let summary = ComparisonSummary {
        critical: findings
            .iter()
            .filter(|f| f.severity == FindingSeverity::Critical)
            .count(),
        warning: findings
            .iter()
            .filter(|f| f.severity == FindingSeverity::Warning)
            .count(),
        info: findings
            .iter()
            .filter(|f| f.severity == FindingSeverity::Info)
            .count(),
    };

    tracing::debug!(
        critical = summary.critical,
        warning = summary.warning,
        info = summary.info,
        "Baseline comparison complete"
    );
    Ok(ComparisonReport { findings, summary })
}

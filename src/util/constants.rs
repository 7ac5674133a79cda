// loglens - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "loglens";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "loglens";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Line index limits
// =============================================================================

/// Chunk size in bytes for the sequential index-build scan.
pub const INDEX_CHUNK_SIZE: usize = 1024 * 1024; // 1 MiB

/// Minimum interval between index-build progress notifications (ms).
pub const INDEX_PROGRESS_INTERVAL_MS: u64 = 200;

/// Hard cap on the bytes of a single line returned by the file view.
/// Longer lines are still counted and indexed; the view clamps the text.
pub const MAX_LINE_BYTES: usize = 5_000;

// =============================================================================
// File view limits
// =============================================================================

/// Number of leading bytes of a line scanned for a severity keyword.
pub const LEVEL_SCAN_PREFIX_BYTES: usize = 200;

/// Number of leading bytes of a line scanned for a timestamp form.
pub const TIMESTAMP_SCAN_PREFIX_BYTES: usize = 60;

/// Marker that opens a split-part header line written by the file splitter.
pub const SPLIT_HEADER_PREFIX: &str = "#SPLIT:";

// =============================================================================
// Search limits
// =============================================================================

/// Maximum matches returned by a single search; the remainder is dropped
/// and the caller is informed via the `truncated` flag.
pub const MAX_SEARCH_MATCHES: usize = 10_000;

/// Lines scanned between cancellation checks during a search.
pub const SEARCH_BATCH_LINES: u64 = 1_000;

/// Maximum bytes of line text copied into a match snippet.
pub const SEARCH_SNIPPET_BYTES: usize = 200;

// =============================================================================
// Long-scan batching (filter, analysis, fingerprint)
// =============================================================================

/// Lines processed between cancellation checks in filter/analysis scans.
pub const SCAN_BATCH_LINES: u64 = 10_000;

/// Minimum interval between progress notifications for line-batch scans (ms).
pub const SCAN_PROGRESS_INTERVAL_MS: u64 = 50;

// =============================================================================
// Drain clusterer
// =============================================================================

/// Depth of the Drain prefix tree below the length bucket.
pub const DRAIN_TREE_DEPTH: usize = 4;

/// Maximum distinct children per tree node before collapsing into `<*>`.
pub const DRAIN_MAX_CHILDREN: usize = 100;

/// Similarity threshold for merging a line into an existing cluster.
pub const DRAIN_SIMILARITY_THRESHOLD: f64 = 0.4;

/// Hard cap on the total number of clusters; overflow is silently dropped.
pub const DRAIN_MAX_CLUSTERS: usize = 2_000;

/// Default cap on pattern groups returned to the caller.
pub const DRAIN_MAX_OUTPUT: usize = 500;

/// Maximum sample line numbers retained per cluster.
pub const DRAIN_MAX_SAMPLES: usize = 10;

// =============================================================================
// Column-aware analyzer
// =============================================================================

/// Bytes sampled from the start of the file for column detection.
pub const COLUMN_DETECT_SAMPLE_BYTES: usize = 8 * 1024; // 8 KiB

/// Per-line truncation applied during the analysis pass.
pub const ANALYSIS_LINE_BYTES: usize = 200;

/// Maximum unique message patterns tracked during analysis.
pub const ANALYSIS_MAX_PATTERNS: usize = 50_000;

/// Maximum characters of a canonical message pattern.
pub const ANALYSIS_PATTERN_CHARS: usize = 100;

/// A pattern is a noise candidate when its count reaches
/// `max(NOISE_MIN_COUNT, total_lines / 100)`.
pub const NOISE_MIN_COUNT: u64 = 100;

/// Maximum error-group insights emitted.
pub const ERROR_GROUP_LIMIT: usize = 15;

/// A pattern is an anomaly candidate when its count is at most this.
pub const ANOMALY_MAX_COUNT: u64 = 2;

/// Keywords that mark a rare pattern as a critical anomaly and a crash line.
pub const CRITICAL_KEYWORDS: &[&str] = &[
    "fatal",
    "crash",
    "exception",
    "panic",
    "segfault",
    "unauthorized",
    "timeout",
    "corrupt",
    "abort",
    "out of memory",
];

// =============================================================================
// Baseline store
// =============================================================================

/// Structured baseline document file name (config dir).
pub const BASELINES_FILE_NAME: &str = "baselines.json";

/// Legacy baseline blob file name; migrated once and renamed `.migrated`.
pub const BASELINES_LEGACY_FILE_NAME: &str = "baselines.db";

/// Current baseline document schema version.
pub const BASELINES_DOC_VERSION: u32 = 1;

/// Maximum minute buckets in a timestamp-density histogram (24 h).
pub const BASELINE_MAX_DENSITY_BUCKETS: usize = 1_440;

/// Maximum crash keywords retained in a fingerprint.
pub const BASELINE_MAX_CRASHES: usize = 50;

/// Maximum failing components retained in a fingerprint.
pub const BASELINE_MAX_COMPONENTS: usize = 20;

/// Maximum bytes of any string stored in a fingerprint.
pub const BASELINE_MAX_STRING_BYTES: usize = 200;

/// Evenly spaced sample lines retained per level.
pub const BASELINE_SAMPLES_PER_LEVEL: usize = 10;

/// Sample lines retained per failing component.
pub const BASELINE_SAMPLES_PER_COMPONENT: usize = 5;

/// Maximum lines per side for a baseline comparison; beyond this the
/// compare refuses with `TooLarge`.
pub const BASELINE_MAX_COMPARE_LINES: u64 = 100_000;

/// Level percentage-point shift that raises a critical finding.
pub const BASELINE_SHIFT_CRITICAL_PP: f64 = 15.0;

/// Level percentage-point shift that raises a warning finding.
pub const BASELINE_SHIFT_WARNING_PP: f64 = 5.0;

/// Component error-count ratio that raises a critical finding.
pub const BASELINE_RATIO_CRITICAL: f64 = 5.0;

/// Component error-count ratio that raises a warning finding.
pub const BASELINE_RATIO_WARNING: f64 = 2.0;

/// A baseline channel absent from the current run is reported only when
/// the baseline saw more than this many lines on it.
pub const BASELINE_MISSING_CHANNEL_MIN_LINES: u64 = 10;

/// Minute-bucket variance ratio that raises a time-pattern finding.
pub const BASELINE_VARIANCE_RATIO: f64 = 3.0;

// =============================================================================
// Live ingest
// =============================================================================

/// Process-wide cap on concurrent live connections.
pub const MAX_LIVE_CONNECTIONS: usize = 4;

/// Bound on the residual (incomplete-line) buffer of a live connection.
/// A producer that never emits a line terminator would otherwise grow the
/// buffer without limit; when hit, the fragment is flushed as a line.
pub const MAX_LIVE_RESIDUAL_BYTES: usize = 512 * 1024; // 512 KiB

/// Wall-clock prefix format written before every ingested line.
pub const LIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// =============================================================================
// Sidecar
// =============================================================================

/// Hidden directory holding per-file sidecars, next to the log file.
pub const SIDECAR_DIR_NAME: &str = ".loglens";

/// Current sidecar document schema version.
pub const SIDECAR_DOC_VERSION: u32 = 1;

/// Activity history entries that trigger a trim.
pub const SIDECAR_ACTIVITY_CAP: usize = 500;

/// Activity history entries retained after a trim (oldest dropped).
pub const SIDECAR_ACTIVITY_KEEP: usize = 400;

// =============================================================================
// Folder search
// =============================================================================

/// Default include glob patterns for folder search.
pub const FOLDER_SEARCH_INCLUDE_PATTERNS: &[&str] = &["*.log", "*.log.[0-9]*", "*.txt"];

/// Maximum files visited by a single folder search.
pub const FOLDER_SEARCH_MAX_FILES: usize = 500;

/// Maximum directory recursion depth for folder search.
pub const FOLDER_SEARCH_MAX_DEPTH: usize = 10;

/// Candidate binary names for the external fast scanner, probed on PATH.
pub const EXTERNAL_SCANNER_NAMES: &[&str] = &["rg"];

// =============================================================================
// Export
// =============================================================================

/// Maximum number of lines that can be exported in a single operation.
pub const MAX_EXPORT_LINES: usize = 5_000_000;

// =============================================================================
// Logging & configuration
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration file name (config dir).
pub const CONFIG_FILE_NAME: &str = "config.toml";

// loglens - tests/e2e_engine.rs
//
// End-to-end tests for the engine pipeline: index -> view -> search ->
// filter -> analyzers -> fingerprint -> baseline comparison.
//
// These tests exercise the real filesystem, real indexing, real regex
// matching, and real chrono timestamp parsing — no mocks, no stubs. Each
// test builds its fixture log in a temp directory and drives the public
// session/engine API the way a UI collaborator would.

use loglens::app::session::Session;
use loglens::core::baseline::{build_fingerprint, compare_fingerprints, FindingCategory};
use loglens::core::columns::analyze_with_columns;
use loglens::core::drain::{analyze_with_drain, DrainConfig};
use loglens::core::filter::{FilterConfig, FilterPattern};
use loglens::core::model::Level;
use loglens::core::search::{SearchFlavor, SearchOptions};
use loglens::util::cancel::CancelToken;
use std::collections::HashSet;
use std::path::PathBuf;
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

/// A healthy-looking run: mostly info heartbeats, a few errors on [Disk].
fn healthy_log() -> String {
    let mut out = String::new();
    for minute in 0..5 {
        for second in [3u32, 17, 42] {
            out.push_str(&format!(
                "2024-03-01 09:{minute:02}:{second:02} INFO [Core] heartbeat tick ok\n"
            ));
        }
        out.push_str(&format!(
            "2024-03-01 09:{minute:02}:55 INFO [Disk] cache flushed\n"
        ));
    }
    out.push_str("2024-03-01 09:05:00 ERROR [Disk] write failed on sector 81920\n");
    out.push_str("2024-03-01 09:05:01 ERROR [Disk] write failed on sector 81928\n");
    out
}

/// A degraded run: the same shape plus crashes, a silent channel, and a
/// burst of disk errors.
fn degraded_log() -> String {
    let mut out = String::new();
    for minute in 0..5 {
        out.push_str(&format!(
            "2024-03-01 10:{minute:02}:03 INFO [Core] heartbeat tick ok\n"
        ));
    }
    for i in 0..12 {
        out.push_str(&format!(
            "2024-03-01 10:05:{:02} ERROR [Disk] write failed on sector {}\n",
            i,
            81920 + i * 8
        ));
    }
    out.push_str("2024-03-01 10:06:00 FATAL [Disk] segfault in flush worker\n");
    out
}

fn write_log(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// =============================================================================
// Index + view + search + filter pipeline
// =============================================================================

/// Opening a file publishes a stable line index with exact line identity.
#[test]
fn e2e_open_and_read_lines() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "app.log", &healthy_log());

    let mut session = Session::new();
    let info = session.open_file(&path, &CancelToken::new(), None).unwrap();
    assert_eq!(info.total_lines, 22);
    assert!(!info.truncated_lines);

    // Line identity: get_lines(i, 1).line_number == i for all i.
    for i in 0..info.total_lines {
        let records = session.get_lines(&path, i, 1).unwrap();
        assert_eq!(records.len(), 1, "line {i}");
        assert_eq!(records[0].line_number, i);
    }

    // Full-range read returns exactly L lines.
    assert_eq!(
        session.get_lines(&path, 0, info.total_lines).unwrap().len(),
        info.total_lines as usize
    );

    // Metadata is attached: timestamps parse, levels classify.
    let first = &session.get_lines(&path, 0, 1).unwrap()[0];
    assert_eq!(first.level, Some(Level::Info));
    assert!(first.timestamp_ms.is_some());
}

/// Search inside an active filter projection only returns visible lines.
#[test]
fn e2e_filtered_search_stays_inside_projection() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "app.log", &healthy_log());
    let mut session = Session::new();
    session.open_file(&path, &CancelToken::new(), None).unwrap();

    let filter = FilterConfig {
        levels: HashSet::from([Level::Error]),
        ..Default::default()
    };
    let projection = session
        .apply_filter(&path, filter, &CancelToken::new(), None)
        .unwrap();
    assert_eq!(projection.len(), 2);

    let options = SearchOptions {
        pattern: "write failed".to_string(),
        ..Default::default()
    };
    let outcome = session
        .search(&path, &options, &CancelToken::new(), None)
        .unwrap();
    assert_eq!(outcome.matches.len(), 2);
    for m in &outcome.matches {
        assert!(
            projection.contains(&m.line_number),
            "match at line {} outside projection",
            m.line_number
        );
    }
}

/// Regex and wildcard flavors agree with their literal equivalents.
#[test]
fn e2e_search_flavors() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "app.log", &healthy_log());
    let mut session = Session::new();
    session.open_file(&path, &CancelToken::new(), None).unwrap();

    let literal = session
        .search(
            &path,
            &SearchOptions {
                pattern: "sector".to_string(),
                ..Default::default()
            },
            &CancelToken::new(),
            None,
        )
        .unwrap();
    let regex = session
        .search(
            &path,
            &SearchOptions {
                pattern: r"sector \d+".to_string(),
                flavor: SearchFlavor::Regex,
                ..Default::default()
            },
            &CancelToken::new(),
            None,
        )
        .unwrap();
    let wildcard = session
        .search(
            &path,
            &SearchOptions {
                pattern: "sector 8192?".to_string(),
                flavor: SearchFlavor::Wildcard,
                ..Default::default()
            },
            &CancelToken::new(),
            None,
        )
        .unwrap();

    assert_eq!(literal.matches.len(), 2);
    assert_eq!(regex.matches.len(), 2);
    assert_eq!(wildcard.matches.len(), 2);
}

/// Context lines wrap each filtered hit and excludes remove exact lines.
#[test]
fn e2e_filter_context_and_exclude() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "app.log", "a\nb\nHIT\nc\nnoise\nHIT\nd\n");
    let mut session = Session::new();
    session.open_file(&path, &CancelToken::new(), None).unwrap();

    let filter = FilterConfig {
        include_patterns: vec![FilterPattern::new("HIT")],
        exclude_patterns: vec![FilterPattern::new("noise")],
        context_lines: 1,
        ..Default::default()
    };
    let projection = session
        .apply_filter(&path, filter, &CancelToken::new(), None)
        .unwrap();
    // Context around lines 2 and 5, minus the excluded line 4.
    assert_eq!(projection.as_slice(), &[1, 2, 3, 5, 6]);
}

// =============================================================================
// Analyzers
// =============================================================================

/// Both analyzers produce the unified result shape over the same file.
#[test]
fn e2e_analyzers_produce_unified_shape() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "app.log", &healthy_log());
    let mut session = Session::new();
    session.open_file(&path, &CancelToken::new(), None).unwrap();
    let view = session.view(&path).unwrap();

    let columns = analyze_with_columns(view, &CancelToken::new(), None).unwrap();
    assert_eq!(columns.result.analyzer_name, "columns");
    assert_eq!(columns.result.stats.analyzed_lines, 22);
    assert_eq!(columns.result.level_counts[&Level::Error], 2);
    assert_eq!(columns.result.level_counts[&Level::Info], 20);
    assert!(columns.result.time_range.is_some());
    assert_eq!(columns.channel_counts["Core"], 15);
    assert_eq!(columns.channel_counts["Disk"], 7);

    let drain = analyze_with_drain(view, DrainConfig::default(), &CancelToken::new(), None)
        .unwrap();
    assert_eq!(drain.result.analyzer_name, "drain");
    assert_eq!(drain.result.stats.analyzed_lines, 22);
    // The heartbeat template dominates with the timestamp wildcarded.
    assert!(drain.clusters[0].count >= 15);
    assert!(drain.clusters[0].template_text().contains("heartbeat"));
}

// =============================================================================
// Baselines
// =============================================================================

/// Comparing a degraded run against a healthy baseline surfaces the
/// regression as severity-ordered findings.
#[test]
fn e2e_baseline_round_trip_detects_regression() {
    let dir = TempDir::new().unwrap();
    let healthy = write_log(&dir, "healthy.log", &healthy_log());
    let degraded = write_log(&dir, "degraded.log", &degraded_log());
    let cancel = CancelToken::new();

    let mut session = Session::new();
    session.open_file(&healthy, &cancel, None).unwrap();
    session.open_file(&degraded, &cancel, None).unwrap();

    let healthy_view = session.view(&healthy).unwrap();
    let healthy_analysis = analyze_with_columns(healthy_view, &cancel, None).unwrap();
    let baseline =
        build_fingerprint(healthy_view, &healthy_analysis.result, &cancel, None).unwrap();

    let degraded_view = session.view(&degraded).unwrap();
    let degraded_analysis = analyze_with_columns(degraded_view, &cancel, None).unwrap();
    let current =
        build_fingerprint(degraded_view, &degraded_analysis.result, &cancel, None).unwrap();

    // Persist through the store and read the fingerprint back.
    let store_dir = TempDir::new().unwrap();
    let mut store =
        loglens::app::baseline_store::BaselineStore::open(store_dir.path()).unwrap();
    let id = store
        .save("healthy-run", "known good", vec!["e2e".to_string()], baseline)
        .unwrap();
    let record = store.get(&id).unwrap();

    let report = compare_fingerprints(&current, &record.fingerprint).unwrap();
    assert!(report.summary.critical >= 1, "report: {report:?}");

    // The error-share regression is a level-shift finding naming "error".
    assert!(report
        .findings
        .iter()
        .any(|f| f.category == FindingCategory::LevelShift && f.title.contains("error")));

    // Findings arrive critical -> warning -> info.
    let severities: Vec<_> = report.findings.iter().map(|f| f.severity).collect();
    let sorted = {
        let mut s = severities.clone();
        s.sort();
        s
    };
    assert_eq!(severities, sorted);

    // An identical comparison is clean.
    let clean = compare_fingerprints(&record.fingerprint, &record.fingerprint).unwrap();
    assert!(clean.findings.is_empty());
    assert_eq!(clean.summary.critical, 0);
    assert_eq!(clean.summary.warning, 0);
    assert_eq!(clean.summary.info, 0);
}

/// The fingerprint's density histogram buckets lines by minute offset.
#[test]
fn e2e_fingerprint_density() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "app.log", &healthy_log());
    let cancel = CancelToken::new();
    let mut session = Session::new();
    session.open_file(&path, &cancel, None).unwrap();
    let view = session.view(&path).unwrap();

    let analysis = analyze_with_columns(view, &cancel, None).unwrap();
    let fp = build_fingerprint(view, &analysis.result, &cancel, None).unwrap();

    // Buckets are minute offsets from the first timestamp (09:00:03), so
    // the two 09:05:0x errors fall into bucket 4 alongside the last
    // heartbeat minute.
    assert_eq!(fp.timestamp_density, vec![4, 4, 4, 4, 6]);
    assert_eq!(fp.channel_counts["Core"], 15);
    assert!(fp.level_percentages[&Level::Error] > 0.0);
    // Sampling is evenly spaced (interval = total/10 = 2), so the two
    // adjacent error lines yield one sample.
    assert_eq!(fp.sample_lines[&Level::Error].len(), 1);
}

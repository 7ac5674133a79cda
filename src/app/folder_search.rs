// loglens - app/folder_search.rs
//
// Multi-file folder search. When a fast external scanner (ripgrep) is on
// PATH it is spawned for the scan and its `filename:line:column:text`
// output is parsed; its absence is not fatal — the fallback walks the
// folder and runs the in-process search engine per file, in parallel.

use crate::core::search::{search_file, SearchFlavor, SearchOptions};
use crate::core::view::FileView;
use crate::util::cancel::CancelToken;
use crate::util::constants::{
    EXTERNAL_SCANNER_NAMES, FOLDER_SEARCH_INCLUDE_PATTERNS, FOLDER_SEARCH_MAX_DEPTH,
    FOLDER_SEARCH_MAX_FILES,
};
use crate::util::error::{EngineError, Result};
use rayon::prelude::*;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One hit from a folder-wide scan. `line_number` and `column` are
/// 0-based, matching the single-file engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMatch {
    pub file: PathBuf,
    pub line_number: u64,
    pub column: u64,
    pub text: String,
}

/// Traversal limits for a folder search.
#[derive(Debug, Clone)]
pub struct FolderSearchConfig {
    /// Filename globs a file must match to be scanned.
    pub include_patterns: Vec<String>,

    pub max_files: usize,
    pub max_depth: usize,
}

impl Default for FolderSearchConfig {
    fn default() -> Self {
        Self {
            include_patterns: FOLDER_SEARCH_INCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            max_files: FOLDER_SEARCH_MAX_FILES,
            max_depth: FOLDER_SEARCH_MAX_DEPTH,
        }
    }
}

/// Search every log file under `root` for `options.pattern`.
pub fn search_folder(
    root: &Path,
    options: &SearchOptions,
    config: &FolderSearchConfig,
    cancel: &CancelToken,
) -> Result<Vec<FolderMatch>> {
    if !root.is_dir() {
        return Err(EngineError::invalid(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }
    if options.pattern.is_empty() {
        return Ok(Vec::new());
    }

    // The external scanner covers the plain flavors; wildcard translation
    // and column scoping stay in-process.
    let external_eligible = options.column_scope.is_none()
        && matches!(options.flavor, SearchFlavor::Literal | SearchFlavor::Regex);
    if external_eligible {
        if let Some(scanner) = external_scanner() {
            match run_external_scanner(&scanner, root, options) {
                Ok(matches) => return Ok(matches),
                Err(e) => {
                    tracing::warn!(
                        scanner = %scanner.display(),
                        error = %e,
                        "External scanner failed; using in-process fallback"
                    );
                }
            }
        }
    }

    search_folder_in_process(root, options, config, cancel)
}

// =============================================================================
// External scanner adapter
// =============================================================================

/// First external scanner binary found on PATH.
pub fn external_scanner() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for name in EXTERNAL_SCANNER_NAMES {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn run_external_scanner(
    scanner: &Path,
    root: &Path,
    options: &SearchOptions,
) -> Result<Vec<FolderMatch>> {
    let mut command = Command::new(scanner);
    command
        .arg("--line-number")
        .arg("--column")
        .arg("--no-heading")
        .arg("--no-messages");
    if !options.match_case {
        command.arg("--ignore-case");
    }
    if options.whole_word {
        command.arg("--word-regexp");
    }
    if options.flavor == SearchFlavor::Literal {
        command.arg("--fixed-strings");
    }
    command.arg("--").arg(&options.pattern).arg(root);
    command.stdout(Stdio::piped()).stderr(Stdio::null());

    let mut child = command
        .spawn()
        .map_err(|e| EngineError::io(scanner, "spawn", e))?;
    let stdout = child.stdout.take().ok_or_else(|| {
        EngineError::Transport {
            source_kind: "scanner".to_string(),
            message: "no stdout handle".to_string(),
        }
    })?;

    // Consume stdout on its own thread so a large result stream cannot
    // deadlock against the child's pipe buffer.
    let reader = std::thread::spawn(move || {
        let mut matches = Vec::new();
        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) => {
                    if let Some(m) = parse_scanner_line(&line) {
                        matches.push(m);
                    }
                }
                Err(_) => break,
            }
        }
        matches
    });

    let status = child
        .wait()
        .map_err(|e| EngineError::io(scanner, "wait", e))?;
    let matches = reader.join().map_err(|_| EngineError::Transport {
        source_kind: "scanner".to_string(),
        message: "output reader panicked".to_string(),
    })?;

    // Exit code 1 means "no matches" for grep-family tools.
    if !status.success() && status.code() != Some(1) {
        return Err(EngineError::Transport {
            source_kind: "scanner".to_string(),
            message: format!("scanner exited with {status}"),
        });
    }
    tracing::debug!(matches = matches.len(), "External scanner finished");
    Ok(matches)
}

/// Parse one `filename:line:column:text` output line. Scanner line and
/// column numbers are 1-based; ours are 0-based.
pub fn parse_scanner_line(line: &str) -> Option<FolderMatch> {
    let mut parts = line.splitn(4, ':');
    let file = parts.next()?;
    let line_number: u64 = parts.next()?.parse().ok()?;
    let column: u64 = parts.next()?.parse().ok()?;
    let text = parts.next()?;
    if file.is_empty() || line_number == 0 || column == 0 {
        return None;
    }
    Some(FolderMatch {
        file: PathBuf::from(file),
        line_number: line_number - 1,
        column: column - 1,
        text: text.to_string(),
    })
}

// =============================================================================
// In-process fallback
// =============================================================================

fn search_folder_in_process(
    root: &Path,
    options: &SearchOptions,
    config: &FolderSearchConfig,
    cancel: &CancelToken,
) -> Result<Vec<FolderMatch>> {
    let globs: Vec<glob::Pattern> = config
        .include_patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "Invalid include glob skipped");
                None
            }
        })
        .collect();

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .max_depth(config.max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if globs.iter().any(|g| g.matches(&name)) {
            files.push(entry.into_path());
            if files.len() >= config.max_files {
                tracing::warn!(max = config.max_files, "Folder search file cap reached");
                break;
            }
        }
    }
    files.sort();

    let per_file: Vec<Vec<FolderMatch>> = files
        .par_iter()
        .map(|file| {
            if cancel.is_cancelled() {
                return Vec::new();
            }
            // Unreadable files are non-fatal to a folder-wide scan.
            let view = match FileView::open(file, cancel, None) {
                Ok(view) => view,
                Err(e) => {
                    if !e.is_cancelled() {
                        tracing::warn!(file = %file.display(), error = %e, "Skipping file");
                    }
                    return Vec::new();
                }
            };
            match search_file(&view, options, None, cancel, None) {
                Ok(outcome) => outcome
                    .matches
                    .into_iter()
                    .map(|m| FolderMatch {
                        file: file.clone(),
                        line_number: m.line_number,
                        column: m.column,
                        text: m.line_text_snippet,
                    })
                    .collect(),
                Err(e) => {
                    if !e.is_cancelled() {
                        tracing::warn!(file = %file.display(), error = %e, "Search failed");
                    }
                    Vec::new()
                }
            }
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    Ok(per_file.into_iter().flatten().collect())
}

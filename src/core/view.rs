// loglens - core/view.rs
//
// File view: decodes and serves line records by number on top of a line
// index. The view exclusively owns its index and a memory map of the file
// bytes; search and filter borrow read-only access.
//
// Encoding: bytes are decoded as lossy UTF-8. Logs routinely contain mixed
// encodings, so invalid sequences become replacement characters and never
// fail a read.

use crate::core::index::LineIndex;
use crate::core::model::{FileInfo, Level, LineRecord, SplitHeader};
use crate::core::timestamp::{byte_prefix, parse_leading_timestamp};
use crate::util::cancel::{CancelToken, ProgressFn};
use crate::util::constants::{LEVEL_SCAN_PREFIX_BYTES, MAX_LINE_BYTES, SPLIT_HEADER_PREFIX};
use crate::util::error::{EngineError, Result};
use memmap2::Mmap;
use regex::Regex;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Read access to one indexed file.
pub struct FileView {
    path: PathBuf,
    index: LineIndex,
    /// `None` only while the indexed content is empty (mmap of a zero-byte
    /// file is not portable).
    map: Option<Mmap>,
    split_header: Option<SplitHeader>,
}

impl FileView {
    /// Index `path` and open a view over it.
    ///
    /// Indexing errors are fatal to the open operation; no view is created.
    pub fn open(
        path: &Path,
        cancel: &CancelToken,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Self> {
        let index = LineIndex::build(path, cancel, progress)?;
        let map = map_file(path, index.scanned_bytes())?;

        let mut view = Self {
            path: path.to_path_buf(),
            index,
            map,
            split_header: None,
        };
        view.split_header = view.detect_split_header();
        if view.split_header.is_some() {
            tracing::debug!(file = %path.display(), "Split-part header recognised");
        }
        Ok(view)
    }

    /// Re-read the index tail and remap after live growth. Returns the
    /// number of newly published lines.
    pub fn refresh(&mut self) -> Result<u64> {
        let added = self.index.extend_from(&self.path)?;
        if added > 0 {
            self.map = map_file(&self.path, self.index.scanned_bytes())?;
        }
        Ok(added)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &LineIndex {
        &self.index
    }

    /// Snapshot metadata for this view.
    pub fn info(&self) -> FileInfo {
        FileInfo {
            path: self.path.clone(),
            size_bytes: self.index.scanned_bytes(),
            total_lines: self.index.line_count(),
            max_line_length: self.index.max_line_length(),
            truncated_lines: self.index.max_line_length() > MAX_LINE_BYTES as u64,
            split_header: self.split_header.clone(),
        }
    }

    pub fn total_lines(&self) -> u64 {
        self.index.line_count()
    }

    /// Raw decoded text of line `i`, terminator stripped, clamped to the
    /// line cap. `None` past end-of-file.
    pub fn line_text(&self, i: u64) -> Option<String> {
        let bytes = self.line_bytes(i)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Line bytes with the terminator stripped and the cap applied.
    fn line_bytes(&self, i: u64) -> Option<&[u8]> {
        let (start, end) = self.index.line_span(i)?;
        let map = self.map.as_deref()?;
        let end = (end as usize).min(map.len());
        let start = (start as usize).min(end);
        let mut slice = &map[start..end];
        if slice.last() == Some(&b'\n') {
            slice = &slice[..slice.len() - 1];
        }
        if slice.last() == Some(&b'\r') {
            slice = &slice[..slice.len() - 1];
        }
        if slice.len() > MAX_LINE_BYTES {
            slice = &slice[..MAX_LINE_BYTES];
        }
        Some(slice)
    }

    /// Full record for line `i` with level and timestamp attached.
    pub fn record(&self, i: u64) -> Option<LineRecord> {
        let text = self.line_text(i)?;
        let level = detect_level(&text);
        let timestamp_ms = parse_leading_timestamp(&text).map(|t| t.epoch_ms);
        Some(LineRecord {
            line_number: i,
            text,
            level,
            timestamp_ms,
        })
    }

    /// Return up to `count` records starting at `start`; fewer only at
    /// end-of-file. A request starting at `total_lines` returns empty.
    /// A recognised split header line is hidden from the output; the scan
    /// keeps advancing past it so the hidden line never shortens the
    /// returned range.
    pub fn get_lines(&self, start: u64, count: u64) -> Vec<LineRecord> {
        let total = self.total_lines();
        if start >= total || count == 0 {
            return Vec::new();
        }
        let mut records = Vec::with_capacity(count.min(total - start) as usize);
        let mut i = start;
        while i < total && (records.len() as u64) < count {
            if !(i == 0 && self.split_header.is_some()) {
                if let Some(record) = self.record(i) {
                    records.push(record);
                }
            }
            i += 1;
        }
        records
    }

    /// Parse a `#SPLIT:part=K,total=N,prev=<name>,next=<name>` header on
    /// line 0.
    fn detect_split_header(&self) -> Option<SplitHeader> {
        let first = self.line_text(0)?;
        let rest = first.strip_prefix(SPLIT_HEADER_PREFIX)?;
        let mut part = None;
        let mut total = None;
        let mut prev = None;
        let mut next = None;
        for field in rest.split(',') {
            let (key, value) = field.split_once('=')?;
            match key.trim() {
                "part" => part = value.trim().parse().ok(),
                "total" => total = value.trim().parse().ok(),
                "prev" => prev = non_empty(value),
                "next" => next = non_empty(value),
                _ => {}
            }
        }
        Some(SplitHeader {
            part: part?,
            total: total?,
            prev,
            next,
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == "-" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Map `len` bytes of `path`; `None` when there is nothing to map.
fn map_file(path: &Path, len: u64) -> Result<Option<Mmap>> {
    if len == 0 {
        return Ok(None);
    }
    let file = File::open(path).map_err(|e| EngineError::io(path, "open", e))?;
    // Safety: the engine treats the indexed range as an immutable snapshot;
    // live sources are append-only and never rewrite published bytes.
    let map = unsafe { Mmap::map(&file) }.map_err(|e| EngineError::io(path, "mmap", e))?;
    Ok(Some(map))
}

// =============================================================================
// Level detection
// =============================================================================

/// Word-boundary, case-insensitive level scan over the first 200 bytes of
/// a line. Checked in severity order; the first match wins.
pub fn detect_level(text: &str) -> Option<Level> {
    struct LevelPattern {
        re: Regex,
        level: Level,
    }

    static PATTERNS: OnceLock<Vec<LevelPattern>> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        fn re(pat: &str) -> Regex {
            Regex::new(pat).expect("detect_level: invalid regex")
        }
        vec![
            LevelPattern {
                re: re(r"(?i)\b(?:FATAL|CRITICAL|SEVERE|ERROR|EXCEPTION|PANIC)\b"),
                level: Level::Error,
            },
            LevelPattern {
                re: re(r"(?i)\b(?:WARN|WARNING)\b"),
                level: Level::Warning,
            },
            LevelPattern {
                re: re(r"(?i)\b(?:INFO|INFORMATION)\b"),
                level: Level::Info,
            },
            LevelPattern {
                re: re(r"(?i)\bDEBUG\b"),
                level: Level::Debug,
            },
            LevelPattern {
                re: re(r"(?i)\b(?:TRACE|VERBOSE)\b"),
                level: Level::Trace,
            },
        ]
    });

    let prefix = byte_prefix(text, LEVEL_SCAN_PREFIX_BYTES);
    patterns
        .iter()
        .find(|p| p.re.is_match(prefix))
        .map(|p| p.level)
}

// loglens - core/index.rs
//
// Memory-bounded line index: maps line numbers to byte offsets for files
// of unbounded size. Built by a sequential chunked scan; grows
// incrementally (append-only) for live-tail sources. Previously published
// offsets never change.
//
// Line model: `starts` holds the byte offset of every line start. A
// trailing entry equal to `scanned_bytes` is a *pending* start (the file
// ended with a terminator); it becomes a real line only when more bytes
// arrive. Trailing bytes without a terminator still define a final line.

use crate::util::cancel::{CancelToken, ProgressFn, ProgressThrottle};
use crate::util::constants::{INDEX_CHUNK_SIZE, INDEX_PROGRESS_INTERVAL_MS};
use crate::util::error::{EngineError, Result};
use memchr::memchr_iter;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Line-number ↔ byte-offset map for one file.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of each line start, strictly increasing. May end with a
    /// pending start equal to `scanned_bytes`.
    starts: Vec<u64>,

    /// Bytes scanned so far; the snapshot length of the indexed content.
    scanned_bytes: u64,

    /// Longest observed line length in bytes (terminator excluded).
    max_line_length: u64,
}

impl LineIndex {
    /// Build the index for `path` by scanning it sequentially in fixed-size
    /// chunks.
    ///
    /// Progress is the fraction of bytes scanned, rate-limited to one
    /// notification per `INDEX_PROGRESS_INTERVAL_MS`. Cancellation is
    /// checked between chunks; on cancel the partial index is discarded and
    /// `Cancelled` is returned.
    pub fn build(
        path: &Path,
        cancel: &CancelToken,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| EngineError::io(path, "open", e))?;
        let size = file
            .metadata()
            .map_err(|e| EngineError::io(path, "stat", e))?
            .len();

        let mut index = Self {
            starts: Vec::new(),
            scanned_bytes: 0,
            max_line_length: 0,
        };
        let mut throttle = ProgressThrottle::new(INDEX_PROGRESS_INTERVAL_MS);

        index.scan_from(&mut file, path, cancel, &mut progress, &mut throttle, size)?;
        throttle.finish(&mut progress);

        tracing::debug!(
            file = %path.display(),
            bytes = index.scanned_bytes,
            lines = index.line_count(),
            max_line = index.max_line_length,
            "Line index built"
        );
        Ok(index)
    }

    /// Extend the index with bytes appended after the last scan.
    ///
    /// Resumes from the remembered end offset; new terminators publish new
    /// entries. Append-only: earlier entries are never modified. Returns
    /// the number of newly published lines.
    pub fn extend_from(&mut self, path: &Path) -> Result<u64> {
        let before = self.line_count();

        let mut file = File::open(path).map_err(|e| EngineError::io(path, "open", e))?;
        let size = file
            .metadata()
            .map_err(|e| EngineError::io(path, "stat", e))?
            .len();
        if size <= self.scanned_bytes {
            return Ok(0);
        }
        file.seek(SeekFrom::Start(self.scanned_bytes))
            .map_err(|e| EngineError::io(path, "seek", e))?;

        let cancel = CancelToken::new();
        let mut progress: Option<ProgressFn<'_>> = None;
        let mut throttle = ProgressThrottle::new(INDEX_PROGRESS_INTERVAL_MS);
        self.scan_from(&mut file, path, &cancel, &mut progress, &mut throttle, size)?;

        let added = self.line_count() - before;
        if added > 0 {
            tracing::trace!(file = %path.display(), added, "Line index extended");
        }
        Ok(added)
    }

    /// Chunked scan loop shared by build and extend.
    fn scan_from(
        &mut self,
        file: &mut File,
        path: &Path,
        cancel: &CancelToken,
        progress: &mut Option<ProgressFn<'_>>,
        throttle: &mut ProgressThrottle,
        expected_size: u64,
    ) -> Result<()> {
        let mut buf = vec![0u8; INDEX_CHUNK_SIZE];
        let mut prev_last_byte: Option<u8> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let n = file
                .read(&mut buf)
                .map_err(|e| EngineError::io(path, "read", e))?;
            if n == 0 {
                break;
            }
            let chunk = &buf[..n];
            let base = self.scanned_bytes;

            // First content byte of the file opens line 0. A pending start
            // from an earlier scan already covers resumed content.
            if self.starts.is_empty() {
                self.starts.push(0);
            }

            for pos in memchr_iter(b'\n', chunk) {
                let nl_at = base + pos as u64;
                let line_start = *self.starts.last().expect("non-empty after first push");
                // Terminated line length, \r of a \r\n pair excluded.
                let before_nl = if pos > 0 {
                    Some(chunk[pos - 1])
                } else {
                    prev_last_byte
                };
                let mut len = nl_at - line_start;
                if len > 0 && before_nl == Some(b'\r') {
                    len -= 1;
                }
                self.max_line_length = self.max_line_length.max(len);
                self.starts.push(nl_at + 1);
            }

            prev_last_byte = chunk.last().copied();
            self.scanned_bytes += n as u64;

            if expected_size > 0 {
                throttle.report(progress, self.scanned_bytes as f64 / expected_size as f64);
            }
        }

        // Trailing bytes without a terminator define a final line; fold its
        // current length into the observed maximum (a trailing \r is taken
        // as half of a split \r\n and excluded).
        if let Some(&last_start) = self.starts.last() {
            if last_start < self.scanned_bytes {
                let mut len = self.scanned_bytes - last_start;
                if prev_last_byte == Some(b'\r') {
                    len -= 1;
                }
                self.max_line_length = self.max_line_length.max(len);
            }
        }
        Ok(())
    }

    /// Total published lines. A pending trailing start (file ends with a
    /// terminator) is not a line.
    pub fn line_count(&self) -> u64 {
        match self.starts.last() {
            None => 0,
            Some(&last) if last == self.scanned_bytes => self.starts.len() as u64 - 1,
            Some(_) => self.starts.len() as u64,
        }
    }

    /// Byte span `[start, end)` of line `i`, terminator included.
    pub fn line_span(&self, i: u64) -> Option<(u64, u64)> {
        if i >= self.line_count() {
            return None;
        }
        let i = i as usize;
        let start = self.starts[i];
        let end = self
            .starts
            .get(i + 1)
            .copied()
            .unwrap_or(self.scanned_bytes);
        Some((start, end))
    }

    /// Snapshot length of the indexed content in bytes.
    pub fn scanned_bytes(&self) -> u64 {
        self.scanned_bytes
    }

    /// Longest observed line length in bytes, pre-truncation.
    pub fn max_line_length(&self) -> u64 {
        self.max_line_length
    }

    /// The `L+1` offset table `[0, off₁, …, N]`: entry `i` is the start
    /// byte of line `i`, the final entry is the snapshot length.
    pub fn offset_table(&self) -> Vec<u64> {
        let count = self.line_count() as usize;
        let mut table = Vec::with_capacity(count + 1);
        table.extend_from_slice(&self.starts[..count.min(self.starts.len())]);
        if table.len() < count {
            // Unreachable by construction; keep the table well-formed.
            table.resize(count, self.scanned_bytes);
        }
        table.push(self.scanned_bytes);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content).unwrap();
        path
    }

    fn build(path: &Path) -> LineIndex {
        LineIndex::build(path, &CancelToken::new(), None).unwrap()
    }

    #[test]
    fn test_empty_file_has_zero_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.log", b"");
        let index = build(&path);
        assert_eq!(index.line_count(), 0);
        assert_eq!(index.offset_table(), vec![0]);
    }

    #[test]
    fn test_terminated_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", b"alpha\nbeta\n");
        let index = build(&path);
        assert_eq!(index.line_count(), 2);
        assert_eq!(index.offset_table(), vec![0, 6, 11]);
        assert_eq!(index.line_span(0), Some((0, 6)));
        assert_eq!(index.line_span(1), Some((6, 11)));
        assert_eq!(index.line_span(2), None);
        assert_eq!(index.max_line_length(), 5);
    }

    #[test]
    fn test_trailing_bytes_define_final_line() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", b"alpha\nbeta");
        let index = build(&path);
        assert_eq!(index.line_count(), 2);
        assert_eq!(index.line_span(1), Some((6, 10)));
    }

    #[test]
    fn test_crlf_is_single_terminator() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", b"ab\r\ncd\r\n");
        let index = build(&path);
        assert_eq!(index.line_count(), 2);
        // Spans include terminators; the view strips them.
        assert_eq!(index.line_span(0), Some((0, 4)));
        assert_eq!(index.max_line_length(), 2);
    }

    #[test]
    fn test_offsets_strictly_non_decreasing() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", b"\n\nx\n\n");
        let index = build(&path);
        let table = index.offset_table();
        assert!(table.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.line_span(2), Some((2, 4)));
    }

    #[test]
    fn test_extend_is_append_only() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "grow.log", b"one\n");
        let mut index = build(&path);
        assert_eq!(index.line_count(), 1);
        let table_before = index.offset_table();

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"two\nthree\n").unwrap();
        drop(f);

        let added = index.extend_from(&path).unwrap();
        assert_eq!(added, 2);
        assert_eq!(index.line_count(), 3);

        // Previously published offsets are unchanged.
        let table_after = index.offset_table();
        assert_eq!(&table_after[..table_before.len() - 1], &table_before[..table_before.len() - 1]);
        assert_eq!(index.line_span(1), Some((4, 8)));
        assert_eq!(index.line_span(2), Some((8, 14)));
    }

    #[test]
    fn test_extend_without_new_bytes_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "grow.log", b"one\n");
        let mut index = build(&path);
        assert_eq!(index.extend_from(&path).unwrap(), 0);
        assert_eq!(index.line_count(), 1);
    }

    #[test]
    fn test_cancel_discards_partial_index() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", b"alpha\nbeta\n");
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = LineIndex::build(&path, &cancel, None);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn test_chunk_boundary_crlf() {
        // A \r\n pair split across the 1 MiB chunk boundary must still
        // count as one terminator with the \r excluded from line length.
        let dir = TempDir::new().unwrap();
        let mut content = vec![b'x'; INDEX_CHUNK_SIZE - 1];
        content.push(b'\r');
        content.push(b'\n');
        content.extend_from_slice(b"tail\n");
        let path = write_file(&dir, "big.log", &content);
        let index = build(&path);
        assert_eq!(index.line_count(), 2);
        assert_eq!(index.max_line_length(), (INDEX_CHUNK_SIZE - 1) as u64);
    }

    #[test]
    fn test_line_numbers_monotonic_after_growth() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "grow.log", b"a\nb\n");
        let mut index = build(&path);
        let span_before = index.line_span(1).unwrap();

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"c\n").unwrap();
        drop(f);
        index.extend_from(&path).unwrap();

        // Line 1 keeps its span after growth.
        assert_eq!(index.line_span(1).unwrap(), span_before);
        assert_eq!(index.line_count(), 3);
    }
}

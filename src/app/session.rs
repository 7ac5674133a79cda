// loglens - app/session.rs
//
// The session aggregate: owns the open file views and the per-path filter
// projections. What a looser design would keep in module-level caches
// lives here, so every operation takes one session reference and there
// are no global singletons.
//
// Concurrency: a view and its index are owned by one session, so
// concurrent mutation is impossible by construction. The projection is an
// `Arc<Vec<u64>>` replaced in a single store on completion — readers
// holding the old one keep a consistent snapshot; a cancelled rebuild
// retains the previous projection.

use crate::core::filter::{build_projection, FilterConfig};
use crate::core::model::{FileInfo, LineRecord};
use crate::core::search::{search_file, SearchOptions, SearchOutcome};
use crate::core::view::FileView;
use crate::util::cancel::{CancelToken, ProgressFn};
use crate::util::error::{EngineError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct FileHandle {
    view: FileView,
    filter: Option<FilterConfig>,
    projection: Option<Arc<Vec<u64>>>,
}

/// One user session: open files, their filters, and their projections.
#[derive(Default)]
pub struct Session {
    files: HashMap<PathBuf, FileHandle>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `path` and add it to the session. Indexing errors are fatal
    /// to the open; no view is created.
    pub fn open_file(
        &mut self,
        path: &Path,
        cancel: &CancelToken,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<FileInfo> {
        let view = FileView::open(path, cancel, progress)?;
        let info = view.info();
        self.files.insert(
            path.to_path_buf(),
            FileHandle {
                view,
                filter: None,
                projection: None,
            },
        );
        tracing::info!(file = %path.display(), lines = info.total_lines, "File opened");
        Ok(info)
    }

    /// Close `path`, discarding its view, filter, and projection.
    pub fn close_file(&mut self, path: &Path) -> Result<()> {
        self.files
            .remove(path)
            .map(|_| tracing::info!(file = %path.display(), "File closed"))
            .ok_or_else(|| not_open(path))
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn open_files(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn handle(&self, path: &Path) -> Result<&FileHandle> {
        self.files.get(path).ok_or_else(|| not_open(path))
    }

    fn handle_mut(&mut self, path: &Path) -> Result<&mut FileHandle> {
        self.files.get_mut(path).ok_or_else(|| not_open(path))
    }

    /// Borrow the view of an open file.
    pub fn view(&self, path: &Path) -> Result<&FileView> {
        Ok(&self.handle(path)?.view)
    }

    pub fn info(&self, path: &Path) -> Result<FileInfo> {
        Ok(self.handle(path)?.view.info())
    }

    /// Serve a line range. With an active filter the range indexes into
    /// the projection (virtual rows); without one it is the real range.
    pub fn get_lines(&self, path: &Path, start: u64, count: u64) -> Result<Vec<LineRecord>> {
        let handle = self.handle(path)?;
        match &handle.projection {
            None => Ok(handle.view.get_lines(start, count)),
            Some(projection) => {
                let end = start
                    .saturating_add(count)
                    .min(projection.len() as u64);
                let mut records = Vec::new();
                for virtual_row in start..end {
                    let real = projection[virtual_row as usize];
                    if let Some(record) = handle.view.record(real) {
                        records.push(record);
                    }
                }
                Ok(records)
            }
        }
    }

    /// Rebuild the projection for `path`. The swap is atomic: on success
    /// a fresh `Arc` replaces the old one; on cancellation or error the
    /// previous projection is retained.
    pub fn apply_filter(
        &mut self,
        path: &Path,
        config: FilterConfig,
        cancel: &CancelToken,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Arc<Vec<u64>>> {
        let handle = self.handle_mut(path)?;
        let projection = Arc::new(build_projection(&handle.view, &config, cancel, progress)?);
        handle.filter = Some(config);
        handle.projection = Some(Arc::clone(&projection));
        Ok(projection)
    }

    /// Drop the filter; all lines become visible again.
    pub fn clear_filter(&mut self, path: &Path) -> Result<()> {
        let handle = self.handle_mut(path)?;
        handle.filter = None;
        handle.projection = None;
        Ok(())
    }

    /// The active projection, if a filter is applied.
    pub fn visible_lines(&self, path: &Path) -> Result<Option<Arc<Vec<u64>>>> {
        Ok(self.handle(path)?.projection.clone())
    }

    pub fn active_filter(&self, path: &Path) -> Result<Option<&FilterConfig>> {
        Ok(self.handle(path)?.filter.as_ref())
    }

    /// Search `path`, restricted to the active projection when a filter is
    /// set.
    pub fn search(
        &self,
        path: &Path,
        options: &SearchOptions,
        cancel: &CancelToken,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<SearchOutcome> {
        let handle = self.handle(path)?;
        let restrict = handle.projection.as_ref().map(|p| p.as_slice());
        search_file(&handle.view, options, restrict, cancel, progress)
    }

    /// Grow the index after a live source appended bytes. Returns the
    /// newly published line count.
    pub fn refresh(&mut self, path: &Path) -> Result<u64> {
        self.handle_mut(path)?.view.refresh()
    }
}

fn not_open(path: &Path) -> EngineError {
    EngineError::NotFound {
        what: "open file",
        key: path.display().to_string(),
    }
}

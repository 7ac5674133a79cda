// loglens - app/sidecar.rs
//
// Per-file sidecar: a JSON document stored next to the log file (under a
// hidden directory) holding bookmarks, file-specific highlights, the
// activity history, and the last-opened timestamp.
//
// Design principles:
// - Saved atomically (write -> temp, rename -> final) so a crash during
//   save never corrupts the previous good document.
// - Load errors are never fatal: a corrupt or missing sidecar degrades to
//   in-memory defaults.
// - Activity history is bounded: at 500 entries the oldest are trimmed so
//   400 remain.

use crate::util::constants::{
    SIDECAR_ACTIVITY_CAP, SIDECAR_ACTIVITY_KEEP, SIDECAR_DIR_NAME, SIDECAR_DOC_VERSION,
};
use crate::util::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Document structures
// =============================================================================

/// A bookmarked line with an optional user label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub line_number: u64,

    #[serde(default)]
    pub label: String,

    pub created_at: DateTime<Utc>,
}

/// A file-specific highlight rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub pattern: String,

    /// Display colour as `#rrggbb`.
    pub color: String,

    #[serde(default)]
    pub case_sensitive: bool,
}

/// One user action recorded in the activity history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub action: String,

    #[serde(default)]
    pub detail: String,
}

/// Complete per-file sidecar document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarDocument {
    /// Schema version; mismatches degrade to defaults.
    pub version: u32,

    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,

    #[serde(default)]
    pub highlights: Vec<Highlight>,

    #[serde(default)]
    pub activity: Vec<ActivityEntry>,

    #[serde(default)]
    pub last_opened: Option<DateTime<Utc>>,
}

impl Default for SidecarDocument {
    fn default() -> Self {
        Self {
            version: SIDECAR_DOC_VERSION,
            bookmarks: Vec::new(),
            highlights: Vec::new(),
            activity: Vec::new(),
            last_opened: None,
        }
    }
}

impl SidecarDocument {
    /// Append an activity entry, trimming the oldest entries once the cap
    /// is exceeded.
    pub fn record_activity(&mut self, action: impl Into<String>, detail: impl Into<String>) {
        self.activity.push(ActivityEntry {
            at: Utc::now(),
            action: action.into(),
            detail: detail.into(),
        });
        if self.activity.len() > SIDECAR_ACTIVITY_CAP {
            let drop = self.activity.len() - SIDECAR_ACTIVITY_KEEP;
            self.activity.drain(..drop);
        }
    }
}

// =============================================================================
// I/O
// =============================================================================

/// Sidecar path for a log file: `<dir>/.loglens/<filename>.json`.
pub fn sidecar_path(log_file: &Path) -> PathBuf {
    let dir = log_file.parent().unwrap_or_else(|| Path::new("."));
    let name = log_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    dir.join(SIDECAR_DIR_NAME).join(format!("{name}.json"))
}

/// Load the sidecar for `log_file`, degrading to defaults on any failure.
pub fn load(log_file: &Path) -> SidecarDocument {
    let path = sidecar_path(log_file);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "Cannot read sidecar");
            }
            return SidecarDocument::default();
        }
    };
    match serde_json::from_str::<SidecarDocument>(&content) {
        Ok(doc) if doc.version == SIDECAR_DOC_VERSION => doc,
        Ok(doc) => {
            tracing::warn!(
                path = %path.display(),
                found = doc.version,
                expected = SIDECAR_DOC_VERSION,
                "Sidecar version mismatch — starting fresh"
            );
            SidecarDocument::default()
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Sidecar is malformed — starting fresh"
            );
            SidecarDocument::default()
        }
    }
}

/// Save the sidecar atomically (write temp -> rename). Creates the hidden
/// sidecar directory on demand.
pub fn save(log_file: &Path, doc: &SidecarDocument) -> Result<()> {
    let path = sidecar_path(log_file);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, "create_dir", e))?;
    }

    let json = serde_json::to_string_pretty(doc).map_err(|e| EngineError::Corrupt {
        path: path.clone(),
        detail: format!("failed to serialise sidecar: {e}"),
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json.as_bytes()).map_err(|e| EngineError::io(&tmp, "write", e))?;
    std::fs::rename(&tmp, &path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        EngineError::io(&path, "rename", e)
    })?;

    tracing::debug!(path = %path.display(), "Sidecar saved");
    Ok(())
}

// loglens - app/baseline_store.rs
//
// Persistent baseline catalog: one structured JSON document
// `{version: 1, baselines: [...]}` in the config directory. Writes are
// atomic (write -> temp, rename -> final); the store is single-writer.
//
// Recovery policy: a corrupt document yields an empty store and a one-time
// warning, and the bad file is preserved on disk. A legacy `baselines.db`
// blob is migrated to the structured file once and renamed `.migrated`.

use crate::core::baseline::BaselineFingerprint;
use crate::util::constants::{
    BASELINES_DOC_VERSION, BASELINES_FILE_NAME, BASELINES_LEGACY_FILE_NAME,
};
use crate::util::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Records
// =============================================================================

/// A stored baseline: metadata plus the full fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineRecord {
    /// Opaque token, unique per store.
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    pub source_file: String,
    pub total_lines: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fingerprint: BaselineFingerprint,
}

/// Listing entry: the record without its fingerprint payload.
#[derive(Debug, Clone, Serialize)]
pub struct BaselineSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub source_file: String,
    pub total_lines: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable fields for `update`.
#[derive(Debug, Clone, Default)]
pub struct BaselineUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    baselines: Vec<BaselineRecord>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: BASELINES_DOC_VERSION,
            baselines: Vec::new(),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Owner of the on-disk baseline record set.
pub struct BaselineStore {
    path: PathBuf,
    doc: StoreDocument,
    next_seq: u64,
}

impl BaselineStore {
    /// Open (or create) the store under `config_dir`, migrating a legacy
    /// representation if one is found.
    pub fn open(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir)
            .map_err(|e| EngineError::io(config_dir, "create_dir", e))?;
        let path = config_dir.join(BASELINES_FILE_NAME);
        let legacy = config_dir.join(BASELINES_LEGACY_FILE_NAME);

        if !path.exists() && legacy.exists() {
            migrate_legacy(&legacy, &path)?;
        }

        let doc = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<StoreDocument>(&content) {
                Ok(doc) => doc,
                Err(e) => {
                    // One-time warning; the bad file stays on disk.
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Baseline document is corrupt — starting with an empty store"
                    );
                    StoreDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => return Err(EngineError::io(&path, "read", e)),
        };

        tracing::debug!(
            path = %path.display(),
            baselines = doc.baselines.len(),
            "Baseline store opened"
        );
        Ok(Self {
            path,
            doc,
            next_seq: 1,
        })
    }

    /// Save a new baseline record; prepends it and returns the generated
    /// id.
    pub fn save(
        &mut self,
        name: &str,
        description: &str,
        tags: Vec<String>,
        fingerprint: BaselineFingerprint,
    ) -> Result<String> {
        if name.trim().is_empty() {
            return Err(EngineError::invalid("baseline name must not be empty"));
        }
        let now = Utc::now();
        let id = self.generate_id(now);
        let record = BaselineRecord {
            id: id.clone(),
            name: name.to_string(),
            description: description.to_string(),
            tags,
            source_file: fingerprint.source_file.clone(),
            total_lines: fingerprint.total_lines,
            created_at: now,
            updated_at: now,
            fingerprint,
        };
        self.doc.baselines.insert(0, record);
        self.persist()?;
        tracing::info!(id = %id, name, "Baseline saved");
        Ok(id)
    }

    /// Records without fingerprints, newest first.
    pub fn list(&self) -> Vec<BaselineSummary> {
        let mut summaries: Vec<BaselineSummary> = self
            .doc
            .baselines
            .iter()
            .map(|r| BaselineSummary {
                id: r.id.clone(),
                name: r.name.clone(),
                description: r.description.clone(),
                tags: r.tags.clone(),
                source_file: r.source_file.clone(),
                total_lines: r.total_lines,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Full record by id.
    pub fn get(&self, id: &str) -> Result<&BaselineRecord> {
        self.doc
            .baselines
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| EngineError::NotFound {
                what: "baseline",
                key: id.to_string(),
            })
    }

    /// Mutate name/description/tags and refresh `updated_at`.
    pub fn update(&mut self, id: &str, update: BaselineUpdate) -> Result<()> {
        let record = self
            .doc
            .baselines
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| EngineError::NotFound {
                what: "baseline",
                key: id.to_string(),
            })?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(EngineError::invalid("baseline name must not be empty"));
            }
            record.name = name;
        }
        if let Some(description) = update.description {
            record.description = description;
        }
        if let Some(tags) = update.tags {
            record.tags = tags;
        }
        record.updated_at = Utc::now();
        self.persist()
    }

    /// Delete a record by id.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let before = self.doc.baselines.len();
        self.doc.baselines.retain(|r| r.id != id);
        if self.doc.baselines.len() == before {
            return Err(EngineError::NotFound {
                what: "baseline",
                key: id.to_string(),
            });
        }
        self.persist()?;
        tracing::info!(id, "Baseline deleted");
        Ok(())
    }

    /// Generated ids are opaque and unique per store: a time component
    /// plus a sequence that skips collisions.
    fn generate_id(&mut self, now: DateTime<Utc>) -> String {
        loop {
            let id = format!("bl-{:x}-{:04x}", now.timestamp_millis(), self.next_seq);
            self.next_seq += 1;
            if !self.doc.baselines.iter().any(|r| r.id == id) {
                return id;
            }
        }
    }

    /// Atomic write: temp file then rename.
    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.doc).map_err(|e| EngineError::Corrupt {
            path: self.path.clone(),
            detail: format!("failed to serialise baseline document: {e}"),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json.as_bytes()).map_err(|e| EngineError::io(&tmp, "write", e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            EngineError::io(&self.path, "rename", e)
        })?;
        Ok(())
    }
}

/// Load records from the legacy blob (a whole-document JSON or JSON-lines
/// of records), rewrite the structured file, and rename the legacy file so
/// migration runs only once.
fn migrate_legacy(legacy: &Path, path: &Path) -> Result<()> {
    let content =
        std::fs::read_to_string(legacy).map_err(|e| EngineError::io(legacy, "read", e))?;

    let baselines: Vec<BaselineRecord> =
        if let Ok(doc) = serde_json::from_str::<StoreDocument>(&content) {
            doc.baselines
        } else {
            content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .filter_map(|l| serde_json::from_str::<BaselineRecord>(l).ok())
                .collect()
        };

    let doc = StoreDocument {
        version: BASELINES_DOC_VERSION,
        baselines,
    };
    let json = serde_json::to_string_pretty(&doc).map_err(|e| EngineError::Corrupt {
        path: path.to_path_buf(),
        detail: format!("failed to serialise migrated document: {e}"),
    })?;
    std::fs::write(path, json.as_bytes()).map_err(|e| EngineError::io(path, "write", e))?;

    let mut migrated_name = legacy.as_os_str().to_owned();
    migrated_name.push(".migrated");
    let migrated = PathBuf::from(migrated_name);
    std::fs::rename(legacy, &migrated).map_err(|e| EngineError::io(legacy, "rename", e))?;

    tracing::info!(
        from = %legacy.display(),
        to = %path.display(),
        count = doc.baselines.len(),
        "Legacy baseline store migrated"
    );
    Ok(())
}

// loglens - platform/config.rs
//
// Platform-specific configuration and data directory resolution, plus the
// optional engine config file. Uses the `directories` crate for XDG
// (Linux), AppData (Windows), Library (macOS) compliance. Directories are
// created on demand with mkdir-p semantics.

use crate::util::constants::{self, CONFIG_FILE_NAME};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Resolved platform paths for loglens data and configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (baselines, config.toml, saved documents).
    pub config_dir: PathBuf,

    /// Data directory for caches.
    pub data_dir: PathBuf,

    /// Root under which live-capture backing files are created.
    pub capture_root: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be
    /// determined.
    pub fn resolve() -> Self {
        let capture_root = std::env::temp_dir();
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let data_dir = proj_dirs.data_dir().to_path_buf();
            tracing::debug!(
                config = %config_dir.display(),
                data = %data_dir.display(),
                capture = %capture_root.display(),
                "Platform paths resolved"
            );
            Self {
                config_dir,
                data_dir,
                capture_root,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                config_dir: fallback.clone(),
                data_dir: fallback,
                capture_root,
            }
        }
    }

    /// Ensure the config directory exists (mkdir -p semantics).
    pub fn ensure_config_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)
    }
}

// =============================================================================
// Engine config file
// =============================================================================

/// Tunables from `config.toml` in the config directory. Every field is
/// optional; missing values take the built-in defaults, and out-of-range
/// values are clamped to their absolute bounds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Log level when RUST_LOG and --debug are absent.
    pub log_level: Option<String>,

    /// Maximum files visited by a folder search.
    pub folder_search_max_files: Option<usize>,

    /// Default context lines for CLI filter output.
    pub context_lines: Option<u64>,
}

impl EngineConfig {
    /// Load the config file from `config_dir`; a missing file yields the
    /// defaults, a malformed one warns and yields the defaults.
    pub fn load(config_dir: &Path) -> Self {
        let path = config_dir.join(CONFIG_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), error = %e, "Cannot read config");
                }
                return Self::default();
            }
        };
        match toml::from_str::<EngineConfig>(&content) {
            Ok(config) => config.clamped(),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Config file is malformed — using defaults"
                );
                Self::default()
            }
        }
    }

    /// Clamp configured values to sane absolute bounds.
    fn clamped(mut self) -> Self {
        if let Some(max_files) = self.folder_search_max_files {
            self.folder_search_max_files =
                Some(max_files.clamp(1, constants::FOLDER_SEARCH_MAX_FILES * 20));
        }
        if let Some(context) = self.context_lines {
            self.context_lines = Some(context.min(1_000));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load(dir.path());
        assert!(config.log_level.is_none());
        assert!(config.folder_search_max_files.is_none());
    }

    #[test]
    fn test_config_parsed_and_clamped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "log_level = \"debug\"\nfolder_search_max_files = 999999\ncontext_lines = 5\n",
        )
        .unwrap();
        let config = EngineConfig::load(dir.path());
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(
            config.folder_search_max_files,
            Some(constants::FOLDER_SEARCH_MAX_FILES * 20)
        );
        assert_eq!(config.context_lines, Some(5));
    }

    #[test]
    fn test_malformed_config_yields_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "not [ valid toml").unwrap();
        let config = EngineConfig::load(dir.path());
        assert!(config.log_level.is_none());
    }
}

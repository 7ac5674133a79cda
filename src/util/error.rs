// loglens - util/error.rs
//
// Typed error surface for all engine operations. Each variant corresponds
// to one error kind callers are expected to distinguish; sources are
// preserved so diagnostic logging keeps the causal chain.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all loglens operations.
#[derive(Debug)]
pub enum EngineError {
    /// File open/read/write failed. The operation fails.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },

    /// A file, baseline, or connection was not found.
    NotFound { what: &'static str, key: String },

    /// Bad arguments: negative/overflowing line number, malformed pattern,
    /// missing required field. Returned without side effects.
    InvalidInput { message: String },

    /// Caller-triggered cancellation. Never logged as an error.
    Cancelled,

    /// File exceeds the comparison size cap; compare refuses.
    TooLarge { lines: u64, max: u64 },

    /// Concurrent live connections exceed the hard cap.
    Capacity { limit: usize },

    /// A live-ingest producer failed (serial, device log, SSH).
    Transport { source_kind: String, message: String },

    /// A persistent document on disk is malformed.
    Corrupt { path: PathBuf, detail: String },

    /// A user-supplied regex failed to compile and fallback was disabled.
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
            Self::NotFound { what, key } => write!(f, "{what} not found: '{key}'"),
            Self::InvalidInput { message } => write!(f, "Invalid input: {message}"),
            Self::Cancelled => write!(f, "Operation cancelled"),
            Self::TooLarge { lines, max } => {
                write!(f, "File has {lines} lines, exceeds comparison cap of {max}")
            }
            Self::Capacity { limit } => {
                write!(f, "Live connection limit of {limit} reached")
            }
            Self::Transport {
                source_kind,
                message,
            } => write!(f, "Transport error ({source_kind}): {message}"),
            Self::Corrupt { path, detail } => {
                write!(f, "Corrupt document '{}': {detail}", path.display())
            }
            Self::InvalidRegex { pattern, source } => {
                write!(f, "Invalid regex '{pattern}': {source}")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl EngineError {
    /// Wrap an `io::Error` with the path and operation that produced it.
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Shorthand for an `InvalidInput` with a formatted message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// True for cancellation, which callers treat as a non-error outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience type alias for loglens results.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_includes_path_and_operation() {
        let err = EngineError::io(
            "/var/log/app.log",
            "read",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let text = err.to_string();
        assert!(text.contains("read"));
        assert!(text.contains("/var/log/app.log"));
    }

    #[test]
    fn test_not_found_display() {
        let err = EngineError::NotFound {
            what: "baseline",
            key: "bl-42".to_string(),
        };
        assert_eq!(err.to_string(), "baseline not found: 'bl-42'");
    }

    #[test]
    fn test_cancelled_is_cancelled() {
        assert!(EngineError::Cancelled.is_cancelled());
        assert!(!EngineError::invalid("x").is_cancelled());
    }
}

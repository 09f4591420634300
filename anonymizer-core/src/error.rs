use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures surfaced by the anonymization pipeline.
///
/// Job-level variants abort the current file and, in batch mode, the remaining files.
/// Nothing in the pipeline retries on its own.
#[derive(Debug, Error)]
pub enum AnonymizeError {
    /// A processing parameter is out of range or could not be parsed.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No usable path or parameters were selected.
    #[error("invalid selection: {0}")]
    Selection(String),

    /// The source could not be opened or decoded.
    #[error("failed to read {}: {reason}", path.display())]
    MediaRead { path: PathBuf, reason: String },

    /// The destination could not be created or encoded.
    #[error("failed to write {}: {reason}", path.display())]
    MediaWrite { path: PathBuf, reason: String },

    /// The face detection backend failed; the cause is kept as-is.
    #[error(transparent)]
    DetectionOracle(anyhow::Error),

    /// The job was cancelled between two frames or two files.
    #[error("job cancelled")]
    Cancelled,

    /// The worker thread ended without reporting a result.
    #[error("job worker stopped: {0}")]
    Worker(String),
}

impl AnonymizeError {
    pub(crate) fn read(path: &Path, reason: impl ToString) -> Self {
        Self::MediaRead {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: &Path, reason: impl ToString) -> Self {
        Self::MediaWrite {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias used throughout the pipeline.
pub type Result<T, E = AnonymizeError> = std::result::Result<T, E>;

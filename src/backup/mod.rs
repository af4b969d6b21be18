//! Backup integrity subsystem.
//!
//! # Data Flow
//! ```text
//! create:   source file → copy into backup dir → checksum + stat
//!               → index insert → index persist → retention cleanup
//! restore:  index lookup → existence + checksum check → copy to target
//! startup:  directory scan rebuilds the in-memory index; the sidecar
//!           index.json only supplies metadata the filesystem cannot carry
//! ```
//!
//! # Design Decisions
//! - The filesystem is the durable source of truth; the index is a
//!   derived cache and may be rebuilt at any time without data loss
//! - A corrupt backup must never silently overwrite a good file: checksum
//!   verification runs before any write to the restore target
//! - Retention evicts strictly oldest-first, with no pinning

pub mod manager;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use manager::{BackupInfo, BackupManager, BackupStats};

/// Failures surfaced by the backup manager.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The id is absent from the index.
    #[error("backup not found: {0}")]
    NotFound(String),

    /// A file the operation needs does not exist.
    #[error("file does not exist: {0}")]
    FileNotFound(PathBuf),

    /// Recorded and recomputed checksums disagree.
    #[error("backup corrupted: checksum mismatch (expected {expected}, actual {actual})")]
    ChecksumMismatch { expected: String, actual: String },

    /// Recorded and observed sizes disagree.
    #[error("backup corrupted: size mismatch (expected {expected}, actual {actual})")]
    SizeMismatch { expected: u64, actual: u64 },

    /// The backup has no recorded original path and no explicit target
    /// was supplied.
    #[error("backup {0} has no recorded original path; specify a target path")]
    NoTargetPath(String),

    /// Underlying filesystem failure, wrapped with operation context.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl BackupError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable symbolic code for the wire and the audit trail.
    pub fn code(&self) -> &'static str {
        match self {
            BackupError::NotFound(_) => "BACKUP_NOT_FOUND",
            BackupError::FileNotFound(_) => "FILE_NOT_FOUND",
            BackupError::ChecksumMismatch { .. } | BackupError::SizeMismatch { .. } => {
                "BACKUP_CORRUPTED"
            }
            BackupError::NoTargetPath(_) => "VALIDATION_FAILED",
            BackupError::Io { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => "FILE_NOT_FOUND",
                io::ErrorKind::PermissionDenied => "PERMISSION_DENIED",
                _ => "BACKUP_FAILED",
            },
        }
    }
}

//! Error types for a backup invocation.
//!
//! Each variant names the stage that failed and the path involved, so a
//! failure can be diagnosed from the log line alone.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Malformed config {}: {}", path.display(), issues.join("; "))]
    ConfigMalformed { path: PathBuf, issues: Vec<String> },

    #[error("Source directory unreadable: {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Repository initialization failed for {}: {source}", repository.display())]
    RepositoryInitFailed {
        repository: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("Archive {label} could not be created: {source}")]
    BackupFailed {
        label: String,
        #[source]
        source: StoreError,
    },

    #[error("Prune of {} failed: {source}", repository.display())]
    PruneFailed {
        repository: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    /// Stage label used in log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            BackupError::ConfigNotFound(_) | BackupError::ConfigMalformed { .. } => "config",
            BackupError::SourceUnreadable { .. } => "scan",
            BackupError::RepositoryInitFailed { .. } => "init",
            BackupError::BackupFailed { .. } => "create",
            BackupError::PruneFailed { .. } => "prune",
            BackupError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_lists_every_issue() {
        let err = BackupError::ConfigMalformed {
            path: PathBuf::from("/etc/backup.toml"),
            issues: vec!["missing source".into(), "bad mode".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("/etc/backup.toml"));
        assert!(msg.contains("missing source; bad mode"));
        assert_eq!(err.stage(), "config");
    }
}

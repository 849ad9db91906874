//! Interface to the archive storage engine.
//!
//! The engine is an external program. Everything the runner asks of it is
//! expressed as a typed request; implementations turn those into argument
//! vectors themselves, so no pattern or path ever passes through a shell.

pub mod borg;

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::RetentionPolicy;
use crate::executor::excludes::ExcludeRuleSet;

pub use borg::BorgStore;

/// Archive names created by this tool all start with this tag.
pub const ARCHIVE_PREFIX: &str = "backup_";

/// Fixed chunker parameters sent when deduplication is requested.
pub const DEFAULT_CHUNKER_PARAMS: &str = "buzhash,19,23,21,4095";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} exited with {status}: {stderr}")]
    CommandFailed {
        operation: &'static str,
        status: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Chunking hint forwarded with a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupHint {
    /// Pass these chunker parameters explicitly.
    ChunkerParams(String),
    /// Send nothing; the engine uses its own default.
    StoreDefault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitRequest {
    pub repository: PathBuf,
    pub compression: String,
    pub encryption: String,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveRequest {
    pub label: String,
    pub repository: PathBuf,
    pub source_root: PathBuf,
    /// `None` archives the whole source tree.
    pub file_list: Option<Vec<PathBuf>>,
    pub excludes: ExcludeRuleSet,
    pub compression: String,
    pub dedup_hint: DedupHint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneRequest {
    pub repository: PathBuf,
    pub keep: RetentionPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    AlreadyInitialized,
    Reinitialized,
}

/// Operations the runner needs from the storage engine.
pub trait ArchiveStore {
    /// Whether `repository` already holds an initialized repository.
    fn is_initialized(&self, repository: &Path) -> bool;

    /// Create the repository. Without `force` an existing repository is
    /// left untouched.
    fn initialize(&self, request: &InitRequest) -> Result<InitOutcome, StoreError>;

    fn create(&self, request: &ArchiveRequest) -> Result<(), StoreError>;

    fn prune(&self, request: &PruneRequest) -> Result<(), StoreError>;
}

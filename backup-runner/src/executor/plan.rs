//! Archive planning: decides what the next archive contains.

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::excludes::ExcludeRuleSet;
use crate::config::{Config, Mode};
use crate::fs::change_set;
use crate::store::{ArchiveRequest, DedupHint, ARCHIVE_PREFIX, DEFAULT_CHUNKER_PARAMS};
use crate::utils::errors::{BackupError, Result};

/// The archive operation chosen for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedOperation {
    /// Incremental mode found nothing new. Not an error.
    Skip,
    CreateFromFileList(ArchiveRequest),
    CreateFromTree(ArchiveRequest),
}

impl PlannedOperation {
    /// The archive request, or `None` for a skip.
    pub fn into_request(self) -> Option<ArchiveRequest> {
        match self {
            PlannedOperation::Skip => None,
            PlannedOperation::CreateFromFileList(r) | PlannedOperation::CreateFromTree(r) => Some(r),
        }
    }
}

/// Archive name: `backup_YYYY-MM-DD_HH-MM-SS_xxxxxxxx`.
///
/// The timestamp is local time and keeps names sortable; the random
/// suffix keeps two runs in the same second apart.
pub fn archive_label(now: DateTime<Utc>) -> String {
    let stamp = now.with_timezone(&Local).format("%Y-%m-%d_%H-%M-%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}_{}", ARCHIVE_PREFIX, stamp, &suffix[..8])
}

/// Chunker hint for the configured mode.
pub fn dedup_hint(config: &Config) -> DedupHint {
    let fixed = || DedupHint::ChunkerParams(DEFAULT_CHUNKER_PARAMS.to_string());
    match config.mode {
        Mode::Incremental if config.chunk_dedup => fixed(),
        Mode::Incremental => DedupHint::StoreDefault,
        Mode::Full => fixed(),
        Mode::StoreAuto => DedupHint::StoreDefault,
    }
}

/// Plan the archive for this invocation.
///
/// Incremental mode walks the source tree for recent changes and drops the
/// ones the exclude rules cover; the other modes only check that the source
/// is a readable directory.
pub fn plan(config: &Config, excludes: &ExcludeRuleSet, now: DateTime<Utc>) -> Result<PlannedOperation> {
    let request = |file_list: Option<Vec<std::path::PathBuf>>| ArchiveRequest {
        label: archive_label(now),
        repository: config.destination.clone(),
        source_root: config.source.clone(),
        file_list,
        excludes: excludes.clone(),
        compression: config.compression.clone(),
        dedup_hint: dedup_hint(config),
    };

    let operation = match config.mode {
        Mode::Incremental => {
            let mut changes = change_set::select(&config.source, config.time_window_minutes, now)?;
            if !excludes.is_empty() {
                let matcher = excludes.matcher();
                let excluded = changes.retain(|path| !matcher.is_excluded(path));
                debug!(excluded, remaining = changes.len(), "Exclude rules applied to change set");
            }
            if changes.is_empty() {
                PlannedOperation::Skip
            } else {
                PlannedOperation::CreateFromFileList(request(Some(changes.files)))
            }
        }
        Mode::Full | Mode::StoreAuto => {
            ensure_source_dir(config)?;
            PlannedOperation::CreateFromTree(request(None))
        }
    };

    match &operation {
        PlannedOperation::Skip => info!(
            mode = %config.mode,
            window_minutes = config.time_window_minutes,
            "No changes inside window, nothing to archive"
        ),
        PlannedOperation::CreateFromFileList(r) => info!(
            label = %r.label,
            files = r.file_list.as_ref().map_or(0, Vec::len),
            excludes = r.excludes.patterns.len(),
            "Planned archive from change set"
        ),
        PlannedOperation::CreateFromTree(r) => info!(
            label = %r.label,
            mode = %config.mode,
            excludes = r.excludes.patterns.len(),
            "Planned archive of whole tree"
        ),
    }

    Ok(operation)
}

fn ensure_source_dir(config: &Config) -> Result<()> {
    match std::fs::read_dir(&config.source) {
        Ok(_) => Ok(()),
        Err(e) => Err(BackupError::SourceUnreadable {
            path: config.source.clone(),
            reason: e.to_string(),
        }),
    }
}

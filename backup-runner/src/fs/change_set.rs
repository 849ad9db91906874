//! Change-set selection for incremental archives.

use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::walker::walk_regular_files;
use crate::utils::errors::{BackupError, Result};

/// Absolute paths of recently modified regular files, in walk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub files: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Keep only the files `keep` accepts. Returns how many were dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Path) -> bool,
    {
        let before = self.files.len();
        self.files.retain(|path| keep(path));
        before - self.files.len()
    }
}

/// Select every regular file under `source_root` modified no more than
/// `window_minutes` before `now`. The boundary is inclusive.
pub fn select(source_root: &Path, window_minutes: u32, now: DateTime<Utc>) -> Result<ChangeSet> {
    let unreadable = |e: std::io::Error| BackupError::SourceUnreadable {
        path: source_root.to_path_buf(),
        reason: e.to_string(),
    };

    let root = std::fs::canonicalize(source_root).map_err(unreadable)?;
    if !root.is_dir() {
        return Err(BackupError::SourceUnreadable {
            path: source_root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let window = Duration::minutes(i64::from(window_minutes));
    let mut files = Vec::new();
    let mut scanned = 0usize;

    walk_regular_files(
        &root,
        |file| {
            scanned += 1;
            let modified: DateTime<Utc> = file.modified.into();
            if now - modified <= window {
                debug!(path = %file.path.display(), "Changed within window");
                files.push(file.path);
            }
        },
        |path, e| warn!(path = %path.display(), error = %e, "Skipping unreadable entry"),
    )
    .map_err(unreadable)?;

    info!(
        source = %root.display(),
        scanned,
        changed = files.len(),
        window_minutes,
        "Change set selected"
    );

    Ok(ChangeSet { files })
}

//! Retention pruning after a successful archive.
//!
//! The five keep-counts go to the store as-is; the store owns the cascade
//! between tiers.

use std::path::Path;
use tracing::{info, warn};

use crate::config::RetentionPolicy;
use crate::store::{ArchiveStore, PruneRequest};
use crate::utils::errors::BackupError;

/// Outcome of a prune. A failure here never fails the invocation.
#[derive(Debug)]
pub enum PruneResult {
    Pruned,
    Failed(BackupError),
}

impl PruneResult {
    pub fn is_pruned(&self) -> bool {
        matches!(self, PruneResult::Pruned)
    }
}

pub fn prune_request(policy: &RetentionPolicy, destination: &Path) -> PruneRequest {
    PruneRequest {
        repository: destination.to_path_buf(),
        keep: *policy,
    }
}

pub fn prune(store: &dyn ArchiveStore, policy: &RetentionPolicy, destination: &Path) -> PruneResult {
    let request = prune_request(policy, destination);

    match store.prune(&request) {
        Ok(()) => {
            info!(
                repository = %destination.display(),
                hourly = policy.hourly,
                daily = policy.daily,
                weekly = policy.weekly,
                monthly = policy.monthly,
                yearly = policy.yearly,
                "Prune complete"
            );
            PruneResult::Pruned
        }
        Err(source) => {
            let err = BackupError::PruneFailed {
                repository: destination.to_path_buf(),
                source,
            };
            warn!(stage = err.stage(), error = %err, "Prune failed; archive is kept, space reclaimed next cycle");
            PruneResult::Failed(err)
        }
    }
}

//! Backup executor - runs one invocation end to end.
//!
//! Order of operations:
//! - Plan the archive (change set or whole tree)
//! - Initialize the repository if it does not exist yet
//! - Create the archive
//! - Prune according to the retention policy
//!
//! A skipped plan stops after the first step. A dry run stops after
//! planning and reports the store steps it would have taken.

pub mod excludes;
pub mod plan;
pub mod retention;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::store::{ArchiveRequest, ArchiveStore, InitOutcome, InitRequest, PruneRequest};
use crate::utils::errors::{BackupError, Result};
use plan::PlannedOperation;
use retention::PruneResult;

/// Per-invocation switches from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub force_init: bool,
}

/// A store call a real run would make, as reported by a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StoreStep {
    Skip { reason: String },
    Initialize(InitRequest),
    Create(ArchiveRequest),
    Prune(PruneRequest),
}

/// How an invocation ended. Every variant counts as success.
#[derive(Debug)]
pub enum RunOutcome {
    /// Nothing changed inside the window; no store call was made.
    Skipped,
    Created {
        label: String,
        /// Number of listed files, `None` for whole-tree archives.
        files: Option<usize>,
        prune: PruneResult,
    },
    DryRun { steps: Vec<StoreStep> },
}

/// Main backup executor
pub struct Executor<'a> {
    store: &'a dyn ArchiveStore,
    options: RunOptions,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a dyn ArchiveStore, options: RunOptions) -> Self {
        Self { store, options }
    }

    /// Execute one backup invocation
    pub fn run(&self, config: &Config, now: DateTime<Utc>) -> Result<RunOutcome> {
        info!(
            source = %config.source.display(),
            destination = %config.destination.display(),
            mode = %config.mode,
            dry_run = self.options.dry_run,
            "Starting backup run"
        );

        let excludes = excludes::build(config);
        let planned = plan::plan(config, &excludes, now)?;

        if self.options.dry_run {
            let steps = self.describe(config, planned);
            for step in &steps {
                info!(?step, "Dry run: would perform");
            }
            return Ok(RunOutcome::DryRun { steps });
        }

        let Some(request) = planned.into_request() else {
            return Ok(RunOutcome::Skipped);
        };

        self.ensure_repository(config)?;

        self.store
            .create(&request)
            .map_err(|source| BackupError::BackupFailed {
                label: request.label.clone(),
                source,
            })?;
        info!(label = %request.label, repository = %request.repository.display(), "Archive created");

        let prune = retention::prune(self.store, &config.retention, &config.destination);

        Ok(RunOutcome::Created {
            files: request.file_list.as_ref().map(Vec::len),
            label: request.label,
            prune,
        })
    }

    fn init_request(&self, config: &Config) -> InitRequest {
        InitRequest {
            repository: config.destination.clone(),
            compression: config.compression.clone(),
            encryption: config.encryption.clone(),
            force: self.options.force_init,
        }
    }

    fn needs_init(&self, config: &Config) -> bool {
        self.options.force_init || !self.store.is_initialized(&config.destination)
    }

    fn ensure_repository(&self, config: &Config) -> Result<()> {
        if !self.needs_init(config) {
            return Ok(());
        }

        let request = self.init_request(config);
        let outcome = self
            .store
            .initialize(&request)
            .map_err(|source| BackupError::RepositoryInitFailed {
                repository: request.repository.clone(),
                source,
            })?;

        match outcome {
            InitOutcome::Created => info!(repository = %request.repository.display(), "Repository initialized"),
            InitOutcome::Reinitialized => warn!(repository = %request.repository.display(), "Repository re-initialized, previous archives discarded"),
            InitOutcome::AlreadyInitialized => {}
        }
        Ok(())
    }

    fn describe(&self, config: &Config, planned: PlannedOperation) -> Vec<StoreStep> {
        let Some(request) = planned.into_request() else {
            return vec![StoreStep::Skip {
                reason: format!(
                    "no files to archive modified in the last {} minutes",
                    config.time_window_minutes
                ),
            }];
        };

        let mut steps = Vec::with_capacity(3);
        if self.needs_init(config) {
            steps.push(StoreStep::Initialize(self.init_request(config)));
        }
        steps.push(StoreStep::Create(request));
        steps.push(StoreStep::Prune(retention::prune_request(
            &config.retention,
            &config.destination,
        )));
        steps
    }
}

//! Command-line client for a borg-compatible storage engine.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use super::{
    ArchiveRequest, ArchiveStore, DedupHint, InitOutcome, InitRequest, PruneRequest, StoreError,
    ARCHIVE_PREFIX,
};
use crate::config::Config;

/// Environment variable the engine reads the repository passphrase from.
pub const PASSPHRASE_ENV: &str = "BORG_PASSPHRASE";

#[derive(Debug, Clone)]
pub struct BorgStore {
    binary: PathBuf,
    passphrase: Option<String>,
}

impl BorgStore {
    pub fn new(binary: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            passphrase,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.store_binary.clone(), config.passphrase.clone())
    }

    pub fn init_args(request: &InitRequest) -> Vec<OsString> {
        vec![
            "init".into(),
            "--encryption".into(),
            request.encryption.clone().into(),
            "--make-parent-dirs".into(),
            request.repository.clone().into(),
        ]
    }

    pub fn create_args(request: &ArchiveRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "create".into(),
            "--stats".into(),
            "--compression".into(),
            request.compression.clone().into(),
        ];

        if let DedupHint::ChunkerParams(params) = &request.dedup_hint {
            args.push("--chunker-params".into());
            args.push(params.into());
        }

        for pattern in &request.excludes.patterns {
            args.push("--exclude".into());
            args.push(pattern.into());
        }

        if request.file_list.is_some() {
            args.push("--paths-from-stdin".into());
        }

        let mut target = request.repository.clone().into_os_string();
        target.push("::");
        target.push(&request.label);
        args.push(target);

        if request.file_list.is_none() {
            args.push(request.source_root.clone().into());
        }

        args
    }

    pub fn prune_args(request: &PruneRequest) -> Vec<OsString> {
        let keep = &request.keep;
        let mut args: Vec<OsString> = vec![
            "prune".into(),
            "--list".into(),
            "--glob-archives".into(),
            format!("{}*", ARCHIVE_PREFIX).into(),
        ];
        for (flag, count) in [
            ("--keep-hourly", keep.hourly),
            ("--keep-daily", keep.daily),
            ("--keep-weekly", keep.weekly),
            ("--keep-monthly", keep.monthly),
            ("--keep-yearly", keep.yearly),
        ] {
            args.push(flag.into());
            args.push(count.to_string().into());
        }
        args.push(request.repository.clone().into());
        args
    }

    fn command(&self, args: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        if let Some(passphrase) = &self.passphrase {
            cmd.env(PASSPHRASE_ENV, passphrase);
        }
        cmd
    }

    fn run(
        &self,
        operation: &'static str,
        args: Vec<OsString>,
        stdin: Option<String>,
    ) -> Result<(), StoreError> {
        debug!(program = %self.binary.display(), ?args, "Running store command");

        let mut cmd = self.command(&args);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|source| StoreError::Spawn {
            program: self.binary.display().to_string(),
            source,
        })?;

        // Feed stdin from a separate thread so a chatty child cannot
        // deadlock on a full stdout pipe.
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(std::thread::spawn(move || {
                pipe.write_all(input.as_bytes())
            })),
            _ => None,
        };

        let output = child.wait_with_output()?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(result) => result?,
                Err(_) => return Err(StoreError::Other("stdin writer panicked".into())),
            }
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(StoreError::CommandFailed {
                operation,
                status: output.status.to_string(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            debug!(operation, output = %stderr, "Store command output");
        }

        Ok(())
    }
}

impl ArchiveStore for BorgStore {
    fn is_initialized(&self, repository: &Path) -> bool {
        repository.join("config").is_file()
    }

    fn initialize(&self, request: &InitRequest) -> Result<InitOutcome, StoreError> {
        let existing = self.is_initialized(&request.repository);
        if existing && !request.force {
            debug!(repository = %request.repository.display(), "Repository already initialized");
            return Ok(InitOutcome::AlreadyInitialized);
        }
        if existing {
            info!(repository = %request.repository.display(), "Removing repository for forced re-initialization");
            std::fs::remove_dir_all(&request.repository)?;
        }

        // borg applies compression per archive, so the setting recorded here
        // is sent again with every create.
        debug!(compression = %request.compression, "Repository compression");
        self.run("init", Self::init_args(request), None)?;

        Ok(if existing {
            InitOutcome::Reinitialized
        } else {
            InitOutcome::Created
        })
    }

    fn create(&self, request: &ArchiveRequest) -> Result<(), StoreError> {
        let stdin = request.file_list.as_ref().map(|files| {
            let mut list = String::new();
            for file in files {
                list.push_str(&file.to_string_lossy());
                list.push('\n');
            }
            list
        });
        self.run("create", Self::create_args(request), stdin)
    }

    fn prune(&self, request: &PruneRequest) -> Result<(), StoreError> {
        self.run("prune", Self::prune_args(request), None)
    }
}

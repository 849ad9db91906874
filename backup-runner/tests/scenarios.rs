use backup_runner::config::{Config, Mode, RetentionPolicy};
use backup_runner::executor::excludes;
use backup_runner::executor::plan::{plan, PlannedOperation};
use backup_runner::executor::retention::PruneResult;
use backup_runner::fs::change_set;
use backup_runner::store::{
    ArchiveRequest, ArchiveStore, InitOutcome, InitRequest, PruneRequest, StoreError,
};
use backup_runner::{Executor, RunOptions, RunOutcome};
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum Call {
    Init(InitRequest),
    Create(ArchiveRequest),
    Prune(PruneRequest),
}

/// In-memory store that records every request it receives.
#[derive(Default)]
struct RecordingStore {
    initialized: RefCell<bool>,
    fail_prune: bool,
    calls: RefCell<Vec<Call>>,
}

impl RecordingStore {
    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn creates(&self) -> Vec<ArchiveRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn prunes(&self) -> Vec<PruneRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Prune(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

impl ArchiveStore for RecordingStore {
    fn is_initialized(&self, _repository: &Path) -> bool {
        *self.initialized.borrow()
    }

    fn initialize(&self, request: &InitRequest) -> Result<InitOutcome, StoreError> {
        self.calls.borrow_mut().push(Call::Init(request.clone()));
        let mut initialized = self.initialized.borrow_mut();
        let outcome = match (*initialized, request.force) {
            (true, false) => InitOutcome::AlreadyInitialized,
            (true, true) => InitOutcome::Reinitialized,
            (false, _) => InitOutcome::Created,
        };
        *initialized = true;
        Ok(outcome)
    }

    fn create(&self, request: &ArchiveRequest) -> Result<(), StoreError> {
        self.calls.borrow_mut().push(Call::Create(request.clone()));
        Ok(())
    }

    fn prune(&self, request: &PruneRequest) -> Result<(), StoreError> {
        self.calls.borrow_mut().push(Call::Prune(request.clone()));
        if self.fail_prune {
            return Err(StoreError::Other("simulated prune failure".into()));
        }
        Ok(())
    }
}

fn write_aged(dir: &Path, name: &str, now: SystemTime, age_minutes: u64) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, name.as_bytes()).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(now - Duration::from_secs(age_minutes * 60))
        .unwrap();
    fs::canonicalize(&path).unwrap()
}

fn incremental_config(source: &Path, repo: &Path) -> Config {
    Config {
        mode: Mode::Incremental,
        time_window_minutes: 5,
        ..Config::with_paths(source, repo)
    }
}

#[test]
fn scenario_a_only_recent_files_are_archived() {
    let dir = TempDir::new().unwrap();
    let now = SystemTime::now();
    let recent = vec![
        write_aged(dir.path(), "recent_1.txt", now, 1),
        write_aged(dir.path(), "recent_2.txt", now, 1),
    ];
    for name in ["old_1.txt", "old_2.txt", "old_3.txt"] {
        write_aged(dir.path(), name, now, 10);
    }

    let config = incremental_config(dir.path(), &dir.path().join("repo"));
    let now: DateTime<Utc> = now.into();

    let changes = change_set::select(&config.source, config.time_window_minutes, now).unwrap();
    assert_eq!(changes.files, recent);

    match plan(&config, &excludes::build(&config), now).unwrap() {
        PlannedOperation::CreateFromFileList(request) => {
            assert_eq!(request.file_list, Some(recent));
            assert!(request.label.starts_with("backup_"));
        }
        other => panic!("expected file-list archive, got {:?}", other),
    }
}

#[test]
fn scenario_b_nothing_recent_skips_create_and_prune() {
    let dir = TempDir::new().unwrap();
    let now = SystemTime::now();
    for i in 0..5 {
        write_aged(dir.path(), &format!("old_{}.txt", i), now, 10);
    }

    let config = incremental_config(dir.path(), &dir.path().join("repo"));
    let store = RecordingStore::default();

    let outcome = Executor::new(&store, RunOptions::default())
        .run(&config, now.into())
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Skipped));
    assert!(store.calls().is_empty());
}

#[test]
fn excluded_changes_alone_skip_the_cycle() {
    let dir = TempDir::new().unwrap();
    let now = SystemTime::now();
    fs::create_dir(dir.path().join(".cache")).unwrap();
    write_aged(&dir.path().join(".cache"), "blob", now, 1);
    write_aged(dir.path(), "old.txt", now, 10);

    let config = Config {
        exclude_dirs: vec!["*/.cache".into()],
        ..incremental_config(dir.path(), &dir.path().join("repo"))
    };
    let store = RecordingStore::default();

    let outcome = Executor::new(&store, RunOptions::default())
        .run(&config, now.into())
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Skipped));
    assert!(store.calls().is_empty());
}

#[test]
fn excluded_changes_never_reach_the_file_list() {
    let dir = TempDir::new().unwrap();
    let now = SystemTime::now();
    fs::create_dir(dir.path().join("node_modules")).unwrap();
    write_aged(&dir.path().join("node_modules"), "dep.js", now, 1);
    write_aged(dir.path(), "image.iso", now, 1);
    let kept = write_aged(dir.path(), "report.txt", now, 1);

    let config = Config {
        exclude_dirs: vec!["*/node_modules".into()],
        exclude_files: vec!["*.iso".into()],
        ..incremental_config(dir.path(), &dir.path().join("repo"))
    };
    let store = RecordingStore::default();

    Executor::new(&store, RunOptions::default())
        .run(&config, now.into())
        .unwrap();

    let creates = store.creates();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].file_list, Some(vec![kept]));
}

#[test]
fn scenario_c_full_mode_archives_whole_tree_with_excludes() {
    let dir = TempDir::new().unwrap();
    let now = SystemTime::now();
    write_aged(dir.path(), "ancient.txt", now, 60 * 24 * 365);

    let config = Config {
        mode: Mode::Full,
        exclude_dirs: vec!["*/.cache".into()],
        exclude_files: vec!["*.iso".into()],
        ..Config::with_paths(dir.path(), dir.path().join("repo"))
    };
    let store = RecordingStore::default();

    Executor::new(&store, RunOptions::default())
        .run(&config, now.into())
        .unwrap();

    let creates = store.creates();
    assert_eq!(creates.len(), 1);
    assert!(creates[0].file_list.is_none());
    assert_eq!(creates[0].source_root, dir.path());
    assert_eq!(creates[0].excludes.patterns, vec!["*/.cache", "*.iso"]);
}

#[test]
fn scenario_d_prune_failure_keeps_run_successful() {
    let dir = TempDir::new().unwrap();
    let now = SystemTime::now();
    write_aged(dir.path(), "new.txt", now, 0);

    let config = incremental_config(dir.path(), &dir.path().join("repo"));
    let store = RecordingStore {
        fail_prune: true,
        ..RecordingStore::default()
    };

    let outcome = Executor::new(&store, RunOptions::default())
        .run(&config, now.into())
        .unwrap();

    match outcome {
        RunOutcome::Created { files, prune, .. } => {
            assert_eq!(files, Some(1));
            assert!(matches!(prune, PruneResult::Failed(_)));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(store.creates().len(), 1);
    assert_eq!(store.prunes().len(), 1);
}

#[test]
fn scenario_e_retention_counts_forwarded_unchanged() {
    let dir = TempDir::new().unwrap();
    let policy = RetentionPolicy {
        hourly: 12,
        daily: 14,
        weekly: 4,
        monthly: 12,
        yearly: 5,
    };
    let config = Config {
        mode: Mode::Full,
        retention: policy,
        ..Config::with_paths(dir.path(), dir.path().join("repo"))
    };
    let store = RecordingStore::default();

    Executor::new(&store, RunOptions::default())
        .run(&config, Utc::now())
        .unwrap();

    let prunes = store.prunes();
    assert_eq!(prunes.len(), 1);
    assert_eq!(prunes[0].keep, policy);
    assert_eq!(prunes[0].repository, dir.path().join("repo"));
}

#[test]
fn repeated_runs_initialize_once_and_use_distinct_labels() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        mode: Mode::StoreAuto,
        ..Config::with_paths(dir.path(), dir.path().join("repo"))
    };
    let store = RecordingStore::default();
    let executor = Executor::new(&store, RunOptions::default());
    let now = Utc::now();

    executor.run(&config, now).unwrap();
    executor.run(&config, now).unwrap();

    let inits = store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Init(_)))
        .count();
    assert_eq!(inits, 1);

    let creates = store.creates();
    assert_eq!(creates.len(), 2);
    assert_ne!(creates[0].label, creates[1].label);
}

#[test]
fn init_carries_compression_setting() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        mode: Mode::Full,
        compression: "lz4".into(),
        ..Config::with_paths(dir.path(), dir.path().join("repo"))
    };
    let store = RecordingStore::default();

    Executor::new(&store, RunOptions::default())
        .run(&config, Utc::now())
        .unwrap();

    match &store.calls()[0] {
        Call::Init(request) => {
            assert_eq!(request.compression, "lz4");
            assert!(!request.force);
        }
        other => panic!("expected init first, got {:?}", other),
    }
}

//! Configuration management for the backup runner.
//!
//! The config file is read into a [`RawConfig`] (string values with defaults
//! filled in), command-line overrides are applied, and [`RawConfig::validate`]
//! collects every problem at once. Only a clean raw config resolves into the
//! immutable [`Config`] that the rest of the crate receives by reference.

pub mod document;

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::utils::errors::{BackupError, Result};
use document::Document;

const DEFAULT_MODE: &str = "incremental";
const DEFAULT_TIME_WINDOW: &str = "5";
const DEFAULT_COMPRESSION: &str = "zstd,9";
const DEFAULT_ENCRYPTION: &str = "repokey-blake2";
const DEFAULT_STORE_BINARY: &str = "borg";
const DEFAULT_LOG_LEVEL: &str = "info";

/// How the next archive is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Only files modified inside the time window.
    Incremental,
    /// The whole source tree, with fixed chunker parameters.
    Full,
    /// The whole source tree; change detection left to the store.
    StoreAuto,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(Mode::Incremental),
            "full" => Ok(Mode::Full),
            "storeauto" => Ok(Mode::StoreAuto),
            other => Err(format!(
                "mode `{}` is not one of incremental, full, storeauto",
                other
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Incremental => "incremental",
            Mode::Full => "full",
            Mode::StoreAuto => "storeauto",
        };
        f.write_str(name)
    }
}

/// Keep-counts for the five retention tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionPolicy {
    pub hourly: u32,
    pub daily: u32,
    pub weekly: u32,
    pub monthly: u32,
    pub yearly: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            hourly: 12,
            daily: 14,
            weekly: 4,
            monthly: 12,
            yearly: 5,
        }
    }
}

/// Resolved configuration. Built once per invocation, never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub mode: Mode,
    pub time_window_minutes: u32,
    /// Forwarded to the store unmodified, e.g. `zstd,9` or `none`.
    pub compression: String,
    pub chunk_dedup: bool,
    pub passphrase: Option<String>,
    pub encryption: String,
    pub store_binary: PathBuf,
    pub retention: RetentionPolicy,
    pub exclude_dirs: Vec<String>,
    pub exclude_files: Vec<String>,
    pub log_level: String,
}

/// Values as written in the config file (or overridden on the command
/// line), before domain checks.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub origin: PathBuf,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub mode: String,
    pub time_window_minutes: String,
    pub compression: String,
    pub chunk_dedup: String,
    pub passphrase: Option<String>,
    pub encryption: String,
    pub store_binary: String,
    pub keep_hourly: String,
    pub keep_daily: String,
    pub keep_weekly: String,
    pub keep_monthly: String,
    pub keep_yearly: String,
    pub exclude_dirs: Vec<String>,
    pub exclude_files: Vec<String>,
    pub log_level: String,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    pub mode: Option<String>,
    pub time_window_minutes: Option<String>,
}

impl RawConfig {
    /// Read a config file. Fails only if the file is missing, unreadable
    /// or structurally broken; missing keys fall back to defaults here
    /// and are reported by [`RawConfig::validate`].
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BackupError::ConfigNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let doc = Document::parse(&text).map_err(|e| BackupError::ConfigMalformed {
            path: path.to_path_buf(),
            issues: vec![e.to_string()],
        })?;
        Ok(Self::from_document(&doc, path))
    }

    pub fn from_document(doc: &Document, origin: &Path) -> Self {
        let owned = |section: &str, key: &str| doc.scalar(section, key).map(str::to_string);
        let retention = RetentionPolicy::default();
        let count = |key: &str, default: u32| {
            owned("retention", key).unwrap_or_else(|| default.to_string())
        };

        Self {
            origin: origin.to_path_buf(),
            source: owned("backup", "source").filter(|s| !s.trim().is_empty()),
            destination: owned("backup", "destination").filter(|s| !s.trim().is_empty()),
            mode: doc.scalar_or("backup", "mode", DEFAULT_MODE).to_string(),
            time_window_minutes: doc
                .scalar_or("backup", "time_window_minutes", DEFAULT_TIME_WINDOW)
                .to_string(),
            compression: doc
                .scalar_or("backup", "compression", DEFAULT_COMPRESSION)
                .to_string(),
            chunk_dedup: doc.scalar_or("backup", "chunk_dedup", "true").to_string(),
            passphrase: owned("backup", "passphrase").filter(|s| !s.is_empty()),
            encryption: doc
                .scalar_or("backup", "encryption", DEFAULT_ENCRYPTION)
                .to_string(),
            store_binary: doc
                .scalar_or("backup", "store_binary", DEFAULT_STORE_BINARY)
                .to_string(),
            keep_hourly: count("keep_hourly", retention.hourly),
            keep_daily: count("keep_daily", retention.daily),
            keep_weekly: count("keep_weekly", retention.weekly),
            keep_monthly: count("keep_monthly", retention.monthly),
            keep_yearly: count("keep_yearly", retention.yearly),
            exclude_dirs: doc.list("exclude", "dirs"),
            exclude_files: doc.list("exclude", "files"),
            log_level: doc.scalar_or("log", "level", DEFAULT_LOG_LEVEL).to_string(),
        }
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(source) = &overrides.source {
            self.source = Some(source.display().to_string());
        }
        if let Some(destination) = &overrides.destination {
            self.destination = Some(destination.display().to_string());
        }
        if let Some(mode) = &overrides.mode {
            self.mode = mode.clone();
        }
        if let Some(window) = &overrides.time_window_minutes {
            self.time_window_minutes = window.clone();
        }
    }

    /// Every domain violation in the raw values. An empty list means
    /// [`RawConfig::resolve`] will succeed.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.source.is_none() {
            issues.push("[backup] source is required".to_string());
        }
        if self.destination.is_none() {
            issues.push("[backup] destination is required".to_string());
        }
        if let Err(e) = self.mode.parse::<Mode>() {
            issues.push(format!("[backup] {}", e));
        }
        if let Err(e) = parse_window(&self.time_window_minutes) {
            issues.push(format!("[backup] {}", e));
        }
        if parse_bool(&self.chunk_dedup).is_none() {
            issues.push(format!(
                "[backup] chunk_dedup `{}` is not a boolean",
                self.chunk_dedup
            ));
        }
        for (key, value) in self.retention_values() {
            if value.trim().parse::<u32>().is_err() {
                issues.push(format!(
                    "[retention] {} `{}` is not a non-negative integer",
                    key, value
                ));
            }
        }

        issues
    }

    /// Validate and convert into a [`Config`].
    pub fn resolve(self) -> Result<Config> {
        let issues = self.validate();
        if !issues.is_empty() {
            return Err(BackupError::ConfigMalformed {
                path: self.origin,
                issues,
            });
        }

        let count = |v: &str| v.trim().parse::<u32>().unwrap_or_default();
        let retention = RetentionPolicy {
            hourly: count(&self.keep_hourly),
            daily: count(&self.keep_daily),
            weekly: count(&self.keep_weekly),
            monthly: count(&self.keep_monthly),
            yearly: count(&self.keep_yearly),
        };

        // validate() has vouched for every field parsed below.
        Ok(Config {
            source: PathBuf::from(self.source.unwrap_or_default()),
            destination: PathBuf::from(self.destination.unwrap_or_default()),
            mode: self.mode.parse().unwrap_or(Mode::Incremental),
            time_window_minutes: parse_window(&self.time_window_minutes).unwrap_or(5),
            compression: self.compression,
            chunk_dedup: parse_bool(&self.chunk_dedup).unwrap_or(true),
            passphrase: self.passphrase,
            encryption: self.encryption,
            store_binary: PathBuf::from(self.store_binary),
            retention,
            exclude_dirs: self.exclude_dirs,
            exclude_files: self.exclude_files,
            log_level: self.log_level,
        })
    }

    fn retention_values(&self) -> [(&'static str, &str); 5] {
        [
            ("keep_hourly", &self.keep_hourly),
            ("keep_daily", &self.keep_daily),
            ("keep_weekly", &self.keep_weekly),
            ("keep_monthly", &self.keep_monthly),
            ("keep_yearly", &self.keep_yearly),
        ]
    }
}

impl Config {
    /// Defaults for everything except the two required paths.
    pub fn with_paths(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            mode: Mode::Incremental,
            time_window_minutes: 5,
            compression: DEFAULT_COMPRESSION.to_string(),
            chunk_dedup: true,
            passphrase: None,
            encryption: DEFAULT_ENCRYPTION.to_string(),
            store_binary: PathBuf::from(DEFAULT_STORE_BINARY),
            retention: RetentionPolicy::default(),
            exclude_dirs: Vec::new(),
            exclude_files: Vec::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Load, validate and resolve a config file with no overrides.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, &Overrides::default())
    }

    pub fn load_with(path: &Path, overrides: &Overrides) -> Result<Self> {
        let mut raw = RawConfig::from_file(path)?;
        raw.apply(overrides);
        raw.resolve()
    }
}

fn parse_window(value: &str) -> std::result::Result<u32, String> {
    match value.trim().parse::<i64>() {
        Ok(n) if n > 0 && n <= u32::MAX as i64 => Ok(n as u32),
        Ok(n) => Err(format!("time_window_minutes must be positive, got {}", n)),
        Err(_) => Err(format!(
            "time_window_minutes `{}` is not an integer",
            value
        )),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

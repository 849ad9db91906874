//! Exclude rule construction and local matching.
//!
//! Whole-tree archives hand the patterns to the store, which applies them
//! during its own walk. A file-list archive is read from stdin and the
//! store backs up exactly the listed paths, so the change set has to be
//! filtered here with the same matching rules borg uses.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::Config;

/// Ordered exclude patterns, passed verbatim to the store's glob engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExcludeRuleSet {
    pub patterns: Vec<String>,
}

impl ExcludeRuleSet {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Compile the patterns for matching paths locally.
    ///
    /// Patterns without a style prefix (or with `fm:`) are fnmatch globs
    /// where `*` also matches `/`. `sh:` keeps `*` inside one component,
    /// `pp:` is a path prefix and `pf:` a full path. Other styles, and
    /// patterns that fail to compile, are left to the store and logged.
    pub fn matcher(&self) -> ExcludeMatcher {
        let mut globs = GlobSetBuilder::new();
        let mut prefixes = Vec::new();
        let mut exact = Vec::new();

        for pattern in &self.patterns {
            let (style, body) = match pattern.split_once(':') {
                Some((style, body)) if matches!(style, "fm" | "sh" | "re" | "pp" | "pf") => (style, body),
                _ => ("fm", pattern.as_str()),
            };
            let body = body.trim_start_matches('/');

            match style {
                "fm" | "sh" => {
                    let glob = GlobBuilder::new(body.trim_end_matches('/'))
                        .literal_separator(style == "sh")
                        .backslash_escape(true)
                        .build();
                    match glob {
                        Ok(glob) => {
                            globs.add(glob);
                        }
                        Err(e) => warn!(pattern = %pattern, error = %e, "Exclude pattern not applied to file list"),
                    }
                }
                "pp" => prefixes.push(PathBuf::from(body.trim_end_matches('/'))),
                "pf" => exact.push(PathBuf::from(body)),
                _ => warn!(pattern = %pattern, "Exclude pattern style not applied to file list"),
            }
        }

        let globs = globs.build().unwrap_or_else(|e| {
            warn!(error = %e, "Exclude patterns could not be combined");
            GlobSet::empty()
        });

        ExcludeMatcher {
            globs,
            prefixes,
            exact,
        }
    }
}

/// Compiled form of an [`ExcludeRuleSet`].
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    globs: GlobSet,
    prefixes: Vec<PathBuf>,
    exact: Vec<PathBuf>,
}

impl ExcludeMatcher {
    /// Whether `path`, or any directory above it, matches a rule.
    ///
    /// Paths are compared without their leading `/`, as borg stores them.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let relative = path.strip_prefix("/").unwrap_or(path);
        if self.exact.iter().any(|p| p == relative) {
            return true;
        }
        relative
            .ancestors()
            .filter(|a| !a.as_os_str().is_empty())
            .any(|a| self.globs.is_match(a) || self.prefixes.iter().any(|p| p == a))
    }
}

/// Directory patterns first, then file patterns, each in config order.
/// Duplicates are kept.
pub fn build(config: &Config) -> ExcludeRuleSet {
    let patterns = config
        .exclude_dirs
        .iter()
        .chain(config.exclude_files.iter())
        .cloned()
        .collect();
    ExcludeRuleSet { patterns }
}

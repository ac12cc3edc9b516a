//! File discovery, reading, and eval fixture resolution.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::LinterError;
use crate::eval::EvalSet;
use crate::source::SourceFile;

pub struct FileFinder {
    include_globs: Option<GlobSet>,
    exclude_globs: Option<GlobSet>,
}

impl FileFinder {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, LinterError> {
        let include_globs = Self::build_globset(include)?;
        let exclude_globs = Self::build_globset(exclude)?;

        Ok(Self {
            include_globs,
            exclude_globs,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>, LinterError> {
        if patterns.is_empty() {
            return Ok(None);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                LinterError::config(format!("Invalid glob pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }

        let globset = builder
            .build()
            .map_err(|e| LinterError::config(format!("Failed to build globset: {}", e)))?;

        Ok(Some(globset))
    }

    /// Checks a base-relative path against the include/exclude patterns.
    /// Excludes win over includes.
    pub fn should_ignore(&self, relative: &Path) -> bool {
        if self
            .exclude_globs
            .as_ref()
            .is_some_and(|excludes| excludes.is_match(relative))
        {
            return true;
        }

        self.include_globs
            .as_ref()
            .is_some_and(|includes| !includes.is_match(relative))
    }

    /// Resolves `patterns` (plain file paths or globs) under `base_dir`.
    ///
    /// Globs are matched against paths relative to `base_dir`; hidden
    /// directories are not descended into. The result is sorted and free of
    /// duplicates.
    pub fn discover_files(
        &self,
        patterns: &[String],
        base_dir: &Path,
    ) -> Result<Vec<PathBuf>, LinterError> {
        let mut files = Vec::new();

        let mut glob_builder = GlobSetBuilder::new();
        let mut has_globs = false;

        for pattern in patterns {
            let path = base_dir.join(pattern);
            if path
                .symlink_metadata()
                .is_ok_and(|m| m.file_type().is_file())
            {
                let relative = relative_to(&path, base_dir);
                if !self.should_ignore(&relative) {
                    files.push(relative);
                }
            } else {
                let glob = Glob::new(pattern).map_err(|e| {
                    LinterError::config(format!("Invalid pattern '{}': {}", pattern, e))
                })?;
                glob_builder.add(glob);
                has_globs = true;
            }
        }

        if has_globs {
            let glob_set = glob_builder
                .build()
                .map_err(|e| LinterError::config(format!("Failed to build globset: {}", e)))?;

            let walker = WalkDir::new(base_dir)
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
                .filter_map(|e| e.ok());

            for entry in walker {
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = relative_to(entry.path(), base_dir);
                if glob_set.is_match(&relative) && !self.should_ignore(&relative) {
                    files.push(relative);
                }
            }
        }

        files.sort();
        files.dedup();

        info!("Discovered {} files to lint", files.len());
        Ok(files)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn relative_to(path: &Path, base_dir: &Path) -> PathBuf {
    path.strip_prefix(base_dir).unwrap_or(path).to_path_buf()
}

/// Renders a path with `/` separators for use as a [`SourceFile`] path.
fn display_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reads base-relative `paths` in parallel into source file snapshots.
///
/// Files that are not valid UTF-8 are skipped with a warning. Any other read
/// failure fails the whole call.
pub fn read_source_files(
    paths: &[PathBuf],
    base_dir: &Path,
) -> Result<Vec<SourceFile>, LinterError> {
    let files: Vec<Option<SourceFile>> = paths
        .par_iter()
        .map(|relative| match fs::read_to_string(base_dir.join(relative)) {
            Ok(content) => Ok(Some(SourceFile::new(display_path(relative), content))),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("Skipping {}: not valid UTF-8", relative.display());
                Ok(None)
            }
            Err(e) => Err(LinterError::file(format!(
                "Failed to read {}: {}",
                relative.display(),
                e
            ))),
        })
        .collect::<Result<_, LinterError>>()?;

    Ok(files.into_iter().flatten().collect())
}

/// Reads the labeled fixtures of one rule from
/// `<evals_dir>/<rule>/correct/*` and `<evals_dir>/<rule>/incorrect/*`.
///
/// Missing directories yield empty sets. Paths are relative to `evals_dir`.
pub fn resolve_eval_set(evals_dir: &Path, rule_name: &str) -> Result<EvalSet, LinterError> {
    let rule_dir = evals_dir.join(rule_name);
    let correct = read_fixture_dir(evals_dir, &rule_dir.join("correct"))?;
    let incorrect = read_fixture_dir(evals_dir, &rule_dir.join("incorrect"))?;

    debug!(
        "Rule {}: {} correct and {} incorrect fixture(s)",
        rule_name,
        correct.len(),
        incorrect.len()
    );
    Ok(EvalSet { correct, incorrect })
}

fn read_fixture_dir(evals_dir: &Path, dir: &Path) -> Result<Vec<SourceFile>, LinterError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && !entry.file_name().to_string_lossy().starts_with('.') {
            paths.push(relative_to(&entry.path(), evals_dir));
        }
    }
    paths.sort();

    read_source_files(&paths, evals_dir)
}

//! Post-extraction directory layout.
//!
//! Archives unpack their audio under `dev/aac` (or `aac`); the dataset dir
//! expected by the transcoder gets a copy of it. Originals are left in place.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{LayoutConfig, ToolPaths};
use crate::error::{PrepError, Result};
use crate::runner::{CommandRunner, CommandSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reorganized {
    Copied { from: PathBuf, to: PathBuf },
    /// None of the candidate source directories exist.
    NoSource,
}

/// First candidate directory under `save_dir` that exists.
pub fn find_source(save_dir: &Path, layout: &LayoutConfig) -> Option<PathBuf> {
    layout
        .source_candidates
        .iter()
        .map(|c| save_dir.join(c))
        .find(|p| p.is_dir())
}

/// `rsync -a <from>/ <to>/` (trailing slashes copy contents, not the dir).
pub fn rsync_command(tools: &ToolPaths, from: &Path, to: &Path) -> CommandSpec {
    CommandSpec::new(&tools.rsync)
        .arg("-a")
        .arg(with_trailing_slash(from))
        .arg(with_trailing_slash(to))
}

/// Copy the extracted audio into the dataset dir. Uses rsync when
/// `use_rsync` is set, a native recursive copy otherwise.
pub fn reorganize(
    runner: &dyn CommandRunner,
    tools: &ToolPaths,
    save_dir: &Path,
    layout: &LayoutConfig,
    use_rsync: bool,
) -> Result<Reorganized> {
    let Some(from) = find_source(save_dir, layout) else {
        return Ok(Reorganized::NoSource);
    };
    let to = save_dir.join(&layout.dataset_dir);
    fs::create_dir_all(&to).map_err(|e| PrepError::io(&to, e))?;

    tracing::info!(rsync = use_rsync, "copying {} to {}", from.display(), to.display());
    if use_rsync {
        runner.run_checked(&rsync_command(tools, &from, &to))?;
    } else {
        copy_tree(&from, &to)?;
    }
    Ok(Reorganized::Copied { from, to })
}

/// Recursively copy the contents of `from` into `to`, overwriting files.
pub fn copy_tree(from: &Path, to: &Path) -> Result<u64> {
    let mut copied = 0u64;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            PrepError::io(&path, e.into())
        })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        if relative.as_os_str().is_empty() {
            continue;
        }
        let dest = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| PrepError::io(&dest, e))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| PrepError::io(parent, e))?;
            }
            fs::copy(entry.path(), &dest).map_err(|e| PrepError::io(entry.path(), e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn with_trailing_slash(p: &Path) -> String {
    let mut s = p.to_string_lossy().into_owned();
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

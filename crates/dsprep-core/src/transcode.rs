//! Audio normalization with ffmpeg: mono, 16-bit PCM, 16 kHz by default.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{ToolPaths, TranscodeConfig};
use crate::error::{PrepError, Result};
use crate::manifest::WorkItem;
use crate::pool::Completion;
use crate::runner::{CommandRunner, CommandSpec};

/// Source files exactly `cfg.depth` levels below `dataset_dir` with the
/// source extension, sorted.
pub fn find_sources(dataset_dir: &Path, cfg: &TranscodeConfig) -> Vec<PathBuf> {
    let depth = cfg.depth.max(1);
    let mut files: Vec<PathBuf> = WalkDir::new(dataset_dir)
        .min_depth(depth)
        .max_depth(depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_extension(p, &cfg.source_ext))
        .collect();
    files.sort();
    files
}

/// One work item per source file; the target swaps the extension.
pub fn work_items(sources: &[PathBuf], cfg: &TranscodeConfig) -> Vec<WorkItem> {
    sources
        .iter()
        .map(|src| {
            let target = src.with_extension(&cfg.target_ext);
            WorkItem::new(
                src.to_string_lossy().into_owned(),
                target.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

pub fn ffmpeg_command(
    tools: &ToolPaths,
    cfg: &TranscodeConfig,
    input: &Path,
    output: &Path,
    use_hwaccel: bool,
) -> CommandSpec {
    let mut spec = CommandSpec::new(&tools.ffmpeg).arg("-y");
    if use_hwaccel {
        spec = spec.args(["-hwaccel", "auto"]);
    }
    spec.arg("-i")
        .arg(input)
        .arg("-ac")
        .arg(cfg.channels.to_string())
        .arg("-vn")
        .arg("-acodec")
        .arg(&cfg.codec)
        .arg("-ar")
        .arg(cfg.sample_rate.to_string())
        .arg(output)
        .args(["-loglevel", "error"])
}

/// Convert one file. An existing output counts as done, so ffmpeg writes
/// to a `.partial` sibling that is renamed into place only on success.
pub fn transcode_item(
    runner: &dyn CommandRunner,
    tools: &ToolPaths,
    cfg: &TranscodeConfig,
    item: &WorkItem,
    use_hwaccel: bool,
) -> Result<Completion> {
    let output = Path::new(&item.target);
    if output.exists() {
        return Ok(Completion::Skipped);
    }
    let partial = partial_path(output, &cfg.target_ext);
    let spec = ffmpeg_command(tools, cfg, Path::new(&item.source), &partial, use_hwaccel);
    if let Err(e) = runner.run_checked(&spec) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    fs::rename(&partial, output).map_err(|e| PrepError::io(output, e))?;
    Ok(Completion::Done)
}

/// `a.wav` → `a.partial.wav`; ffmpeg picks the container from the extension.
fn partial_path(output: &Path, target_ext: &str) -> PathBuf {
    output.with_extension(format!("partial.{}", target_ext))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

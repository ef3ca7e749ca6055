//! Part concatenation with digest verification.
//!
//! A concatenation item names a part pattern (`vox2_dev_aac_parta*`), an
//! output file and the output's expected digest, all relative to the save
//! dir. Matching parts are streamed into a temporary sibling of the output in
//! lexical order and renamed into place when complete.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checksum::{self, Verification};
use crate::error::{PrepError, Result};
use crate::manifest::WorkItem;
use crate::pool::Completion;

const TEMP_SUFFIX: &str = ".partial";

/// Concatenate one item. An output that already matches its digest is
/// skipped. A digest mismatch after writing is returned as a warning; parts
/// are removed (when asked) only when the output is known good or no digest
/// was given.
pub fn concatenate_item(save_dir: &Path, item: &WorkItem, remove_parts: bool) -> Result<Completion> {
    let output = save_dir.join(&item.target);

    if let Some(expected) = item.expected_digest.as_deref() {
        if output.exists() {
            match checksum::verify(&output, expected)? {
                Verification::Match => {
                    tracing::info!("{} already present with matching checksum", item.target);
                    let parts = resolve_parts(save_dir, &item.source, &output).unwrap_or_default();
                    return finish(Completion::Skipped, remove_parts, &parts);
                }
                Verification::Mismatch { .. } => {
                    tracing::info!("{} exists but checksum differs, recreating", item.target);
                }
            }
        }
    }

    let parts = resolve_parts(save_dir, &item.source, &output)?;
    tracing::debug!(parts = parts.len(), "concatenating into {}", output.display());
    write_concatenated(&parts, &output)?;

    let completion = match item.expected_digest.as_deref() {
        Some(expected) => match checksum::verify(&output, expected)? {
            Verification::Match => {
                tracing::info!("checksum ok for {}", item.target);
                Completion::Done
            }
            Verification::Mismatch { expected, actual } => {
                let err = PrepError::ChecksumMismatch {
                    path: output.clone(),
                    expected,
                    actual,
                };
                tracing::warn!("{}", err);
                return Ok(Completion::DoneWithWarning(err));
            }
        },
        None => Completion::Done,
    };
    finish(completion, remove_parts, &parts)
}

fn finish(completion: Completion, remove_parts: bool, parts: &[PathBuf]) -> Result<Completion> {
    if !remove_parts {
        return Ok(completion);
    }
    for part in parts {
        if let Err(e) = fs::remove_file(part) {
            if e.kind() != io::ErrorKind::NotFound {
                let err = PrepError::io(part, e);
                tracing::warn!("could not remove part: {}", err);
                return Ok(Completion::DoneWithWarning(err));
            }
        } else {
            tracing::info!("removed part file {}", part.display());
        }
    }
    Ok(completion)
}

/// Files in `save_dir` matching `pattern`, sorted by name. Without a `*` the
/// pattern is a plain file name. The output and its temp file never match.
pub fn resolve_parts(save_dir: &Path, pattern: &str, output: &Path) -> Result<Vec<PathBuf>> {
    if !pattern.contains('*') && !pattern.contains('?') {
        let path = save_dir.join(pattern);
        if !path.is_file() {
            return Err(PrepError::io(
                &path,
                io::Error::new(io::ErrorKind::NotFound, "part file not found"),
            ));
        }
        return Ok(vec![path]);
    }

    let temp = temp_path(output);
    let mut parts = Vec::new();
    let entries = fs::read_dir(save_dir).map_err(|e| PrepError::io(save_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PrepError::io(save_dir, e))?;
        let path = entry.path();
        if !path.is_file() || path == output || path == temp {
            continue;
        }
        let name = entry.file_name();
        if wildcard_match(pattern, &name.to_string_lossy()) {
            parts.push(path);
        }
    }
    if parts.is_empty() {
        return Err(PrepError::io(
            save_dir.join(pattern),
            io::Error::new(io::ErrorKind::NotFound, "no part files match"),
        ));
    }
    parts.sort();
    Ok(parts)
}

fn write_concatenated(parts: &[PathBuf], output: &Path) -> Result<()> {
    let temp = temp_path(output);
    let result = (|| {
        let file = File::create(&temp).map_err(|e| PrepError::io(&temp, e))?;
        let mut writer = BufWriter::new(file);
        for part in parts {
            let mut reader = File::open(part).map_err(|e| PrepError::io(part, e))?;
            io::copy(&mut reader, &mut writer).map_err(|e| PrepError::io(part, e))?;
        }
        writer.flush().map_err(|e| PrepError::io(&temp, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| PrepError::io(&temp, e))?;
        fs::rename(&temp, output).map_err(|e| PrepError::io(output, e))
    })();
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn temp_path(output: &Path) -> PathBuf {
    let mut o = output.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Shell-style match supporting `*` (any run) and `?` (one char).
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

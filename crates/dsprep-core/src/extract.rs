//! Archive extraction.
//!
//! Tarballs go through the external `tar` (with `pigz` as decompressor when
//! available); zip archives are unpacked in-process so entries escaping the
//! destination can be rejected before anything is written.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use crate::config::ToolPaths;
use crate::error::{PrepError, Result};
use crate::pool::Completion;
use crate::runner::{CommandRunner, CommandSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Tar,
    Zip,
}

impl ArchiveKind {
    /// Detect from the file name, case-insensitively.
    pub fn detect(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if lower.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else if lower.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else {
            None
        }
    }
}

/// `tar` invocation for a tarball; `None` for kinds handled in-process.
pub fn tar_command(
    tools: &ToolPaths,
    kind: ArchiveKind,
    archive: &Path,
    dest: &Path,
    use_pigz: bool,
) -> Option<CommandSpec> {
    let spec = CommandSpec::new(&tools.tar);
    let spec = match kind {
        ArchiveKind::TarGz if use_pigz => spec
            .arg(format!("--use-compress-program={}", tools.pigz))
            .arg("-xf"),
        ArchiveKind::TarGz => spec.arg("-xzf"),
        ArchiveKind::Tar => spec.arg("-xf"),
        ArchiveKind::Zip => return None,
    };
    Some(spec.arg(archive).arg("-C").arg(dest))
}

/// Extract `archive` into `dest`.
pub fn extract_archive(
    runner: &dyn CommandRunner,
    tools: &ToolPaths,
    archive: &Path,
    dest: &Path,
    use_pigz: bool,
) -> Result<Completion> {
    if !archive.is_file() {
        return Err(PrepError::io(
            archive,
            io::Error::new(io::ErrorKind::NotFound, "archive does not exist"),
        ));
    }
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = ArchiveKind::detect(&name).ok_or_else(|| PrepError::Archive {
        path: archive.to_path_buf(),
        reason: "unsupported archive type".to_string(),
    })?;

    tracing::info!(?kind, "extracting {}", archive.display());
    match tar_command(tools, kind, archive, dest, use_pigz) {
        Some(spec) => {
            runner.run_checked(&spec)?;
        }
        None => extract_zip(archive, dest)?,
    }
    tracing::info!("extraction of {} completed", name);
    Ok(Completion::Done)
}

/// Unpack a zip archive, refusing entries whose path leaves `dest`.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let zip_err = |e: zip::result::ZipError| PrepError::Archive {
        path: archive_path.to_path_buf(),
        reason: e.to_string(),
    };
    let file = File::open(archive_path).map_err(|e| PrepError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(zip_err)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(PrepError::Archive {
                path: archive_path.to_path_buf(),
                reason: format!("entry {:?} escapes the destination", entry.name()),
            });
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| PrepError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| PrepError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| PrepError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| PrepError::io(&out_path, e))?;
    }
    Ok(())
}

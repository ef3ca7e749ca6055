//! Line-oriented work lists.
//!
//! Two formats are understood:
//!
//! - concatenation lists: `<inputPart> <outputFile> <expectedDigestHex>`
//! - download lists: `<url> <anything...>`, the file name coming from the
//!   URL's `file=` query parameter
//!
//! Malformed lines are always skipped with a warning and kept in
//! [`Manifest::skipped`]; they never abort parsing. Blank lines and lines
//! starting with `#` are ignored. A later line whose target repeats an
//! earlier one is treated as malformed so every item writes a distinct file.

mod filename;

pub use filename::{download_filename, sanitize_filename};

use std::collections::HashSet;
use std::path::Path;

use crate::checksum::DigestAlgorithm;
use crate::error::{PrepError, Result};

/// One unit of work. `source` is a URL, a part-file pattern or a local path
/// depending on the phase; `target` is what the unit produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    pub source: String,
    pub target: String,
    pub expected_digest: Option<String>,
}

impl WorkItem {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            expected_digest: None,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.expected_digest = Some(digest.into());
        self
    }
}

/// Parsed work list in file order, plus the lines that were rejected.
#[derive(Debug, Default)]
pub struct Manifest {
    pub items: Vec<WorkItem>,
    pub skipped: Vec<PrepError>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn reject(&mut self, line_no: usize, reason: String) {
        let err = PrepError::ManifestParse { line_no, reason };
        tracing::warn!("skipping {}", err);
        self.skipped.push(err);
    }
}

/// Read a whole manifest file. Manifests are small, so no streaming.
pub fn read_manifest(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(PrepError::MissingManifest(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|e| PrepError::io(path, e))
}

/// Parse a concatenation list.
pub fn parse_concat(text: &str) -> Manifest {
    let mut manifest = Manifest::default();
    let mut seen = HashSet::new();
    for (line_no, fields) in content_lines(text) {
        let [part, output, digest] = fields[..] else {
            manifest.reject(
                line_no,
                format!("expected 3 fields (part output digest), found {}", fields.len()),
            );
            continue;
        };
        if !is_safe_part_pattern(part) {
            manifest.reject(line_no, format!("part {:?} must be a name inside the save dir", part));
            continue;
        }
        if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            manifest.reject(line_no, format!("digest {:?} is not hex", digest));
            continue;
        }
        if DigestAlgorithm::from_hex_len(digest).is_none() {
            manifest.reject(
                line_no,
                format!("digest has {} hex chars, expected 32 (MD5) or 64 (SHA-256)", digest.len()),
            );
            continue;
        }
        let Some(output) = sanitize_filename(output) else {
            manifest.reject(line_no, format!("unusable output name {:?}", output));
            continue;
        };
        if !seen.insert(output.clone()) {
            manifest.reject(line_no, format!("duplicate output {}", output));
            continue;
        }
        manifest
            .items
            .push(WorkItem::new(part, output).with_digest(digest.to_ascii_lowercase()));
    }
    manifest
}

/// Parse a download list, keeping only lines that contain `filter` (when set).
pub fn parse_downloads(text: &str, filter: Option<&str>) -> Manifest {
    let mut manifest = Manifest::default();
    let mut seen = HashSet::new();
    for (line_no, fields) in content_lines(text) {
        if let Some(f) = filter {
            if !fields.iter().any(|field| field.contains(f)) {
                continue;
            }
        }
        let url = fields[0];
        let Some(name) = download_filename(url) else {
            manifest.reject(line_no, format!("cannot derive a file name from {}", url));
            continue;
        };
        if !seen.insert(name.clone()) {
            manifest.reject(line_no, format!("duplicate target {}", name));
            continue;
        }
        manifest.items.push(WorkItem::new(url, name));
    }
    manifest
}

/// Part patterns are resolved in the save dir and may be deleted afterwards,
/// so they must be a single file name (wildcards allowed).
fn is_safe_part_pattern(part: &str) -> bool {
    !part.contains(|c: char| c == '/' || c == '\\') && part != "." && part != ".."
}

/// Non-empty, non-comment lines split on whitespace, with 1-based line numbers.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines().enumerate().filter_map(|(i, line)| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        Some((i + 1, trimmed.split_whitespace().collect()))
    })
}

//! Split expected outputs into those already on disk and those still missing.

use std::path::Path;

/// Names found (and not found) under a base directory, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

/// Probe `base_dir/name` for every name. Plain existence check at call time;
/// a file appearing or vanishing right after is not our concern.
pub fn partition<S: AsRef<str>>(base_dir: &Path, names: &[S]) -> Partition {
    let mut out = Partition::default();
    for name in names {
        let name = name.as_ref();
        if base_dir.join(name).exists() {
            out.present.push(name.to_string());
        } else {
            out.missing.push(name.to_string());
        }
    }
    tracing::debug!(
        present = out.present.len(),
        missing = out.missing.len(),
        "existence check in {}",
        base_dir.display()
    );
    out
}

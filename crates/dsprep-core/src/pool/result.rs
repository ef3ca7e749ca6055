//! Per-item results and the batch summary folded from them.

use crate::error::PrepError;
use crate::manifest::WorkItem;

/// How a successful item finished.
#[derive(Debug)]
pub enum Completion {
    Done,
    /// Output was already in place; nothing was run.
    Skipped,
    /// Work finished but something non-fatal deserves a mention
    /// (e.g. a checksum mismatch).
    DoneWithWarning(PrepError),
}

/// Exactly one per submitted item.
#[derive(Debug)]
pub struct TaskResult {
    /// Position of the item in the submitted list.
    pub index: usize,
    pub item: WorkItem,
    pub outcome: Result<Completion, PrepError>,
}

impl TaskResult {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error_message(&self) -> Option<String> {
        self.outcome.as_ref().err().map(|e| e.to_string())
    }

    pub fn warning(&self) -> Option<&PrepError> {
        match &self.outcome {
            Ok(Completion::DoneWithWarning(w)) => Some(w),
            _ => None,
        }
    }
}

/// Aggregate counts. `total == succeeded + failed` always; `skipped` and
/// `warnings` are subsets of `succeeded`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub warnings: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[TaskResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            acc.record(r);
            acc
        })
    }

    pub fn record(&mut self, result: &TaskResult) {
        self.total += 1;
        match &result.outcome {
            Ok(completion) => {
                self.succeeded += 1;
                match completion {
                    Completion::Skipped => self.skipped += 1,
                    Completion::DoneWithWarning(_) => self.warnings += 1,
                    Completion::Done => {}
                }
            }
            Err(_) => self.failed += 1,
        }
    }
}

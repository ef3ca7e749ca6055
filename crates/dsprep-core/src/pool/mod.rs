//! Bounded worker pool.
//!
//! Keeps up to `workers` items in flight; as soon as one worker finishes an
//! item it takes the next pending one from a shared queue. A failing or
//! panicking item is recorded in its own [`TaskResult`] and never stops the
//! other workers. Results are handed to the caller as they arrive, so their
//! order is completion order, not input order; [`TaskResult::index`] points
//! back to the submitted position.
//!
//! Both [`ExecutionKind`]s share this dispatcher. Workers block on an
//! external child process for the heavy part of every item, so CPU-bound
//! transcoding already runs in separate processes; the kind only decides
//! the default pool size.

mod result;

pub use result::{BatchSummary, Completion, TaskResult};

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Mutex, PoisonError};
use std::thread;

use crate::error::{PrepError, Result};
use crate::manifest::WorkItem;

/// Default concurrency for network-bound work (downloads).
pub const DEFAULT_IO_WORKERS: usize = 8;

/// I/O-bound (`thread`) or CPU-bound (`process`) workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    #[default]
    Thread,
    Process,
}

impl ExecutionKind {
    /// Pool size when nothing is configured: a fixed fan-out for network
    /// work, one less than the available CPUs for CPU-bound work.
    pub fn default_workers(self) -> usize {
        match self {
            ExecutionKind::Thread => DEFAULT_IO_WORKERS,
            ExecutionKind::Process => thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1),
        }
    }
}

/// Clamp a configured worker count; zero and negative values mean one.
pub fn clamp_workers(configured: i64) -> usize {
    usize::try_from(configured.max(1)).unwrap_or(usize::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPool {
    kind: ExecutionKind,
    workers: usize,
}

impl TaskPool {
    pub fn new(kind: ExecutionKind, max_workers: i64) -> Self {
        Self {
            kind,
            workers: clamp_workers(max_workers),
        }
    }

    /// Pool with an already-resolved size (still at least one).
    pub fn sized(kind: ExecutionKind, workers: usize) -> Self {
        Self {
            kind,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every item through `worker` and return one result per item.
    pub fn run<F>(&self, items: Vec<WorkItem>, worker: F) -> Vec<TaskResult>
    where
        F: Fn(&WorkItem) -> Result<Completion> + Sync,
    {
        self.run_with(items, worker, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_result` on the caller's thread for
    /// each result the moment it arrives.
    pub fn run_with<F, R>(&self, items: Vec<WorkItem>, worker: F, mut on_result: R) -> Vec<TaskResult>
    where
        F: Fn(&WorkItem) -> Result<Completion> + Sync,
        R: FnMut(&TaskResult),
    {
        let count = items.len();
        if count == 0 {
            return Vec::new();
        }
        let num_workers = self.workers.min(count);
        tracing::debug!(kind = ?self.kind, workers = num_workers, items = count, "pool start");

        let queue: Mutex<VecDeque<(usize, WorkItem)>> =
            Mutex::new(items.into_iter().enumerate().collect());
        let (tx, rx) = mpsc::channel::<TaskResult>();
        let mut results = Vec::with_capacity(count);

        thread::scope(|s| {
            for _ in 0..num_workers {
                let tx = tx.clone();
                let queue = &queue;
                let worker = &worker;
                s.spawn(move || loop {
                    let next = queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                    let Some((index, item)) = next else {
                        break;
                    };
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker(&item)))
                        .unwrap_or_else(|payload| Err(PrepError::WorkerPanic(panic_message(&*payload))));
                    if tx.send(TaskResult { index, item, outcome }).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for result in rx {
                if let Err(e) = &result.outcome {
                    tracing::warn!(index = result.index, source = %result.item.source, "item failed: {}", e);
                }
                on_result(&result);
                results.push(result);
            }
        });

        debug_assert_eq!(results.len(), count);
        results
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

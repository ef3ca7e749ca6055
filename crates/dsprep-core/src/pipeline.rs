//! Pipeline driver.
//!
//! `download`: manifest → bounded thread pool of curl invocations.
//!
//! `prepare`: base-dir check → existence filter → concatenation (skipped when
//! the list file is absent) → optional extraction + layout → optional
//! transcoding. Only structural problems abort; everything per item ends up
//! in the phase's [`BatchSummary`].

use std::fs;
use std::path::Path;

use crate::concat;
use crate::config::PrepConfig;
use crate::download;
use crate::error::{PrepError, Result};
use crate::existence::{self, Partition};
use crate::extract;
use crate::layout::{self, Reorganized};
use crate::manifest::{self, WorkItem};
use crate::pool::{BatchSummary, ExecutionKind, TaskPool, TaskResult};
use crate::runner::CommandRunner;
use crate::transcode;

/// Which phase a streamed result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Download,
    Concatenate,
    Extract,
    Transcode,
}

/// Switches for `prepare`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareOptions {
    pub remove_parts: bool,
    pub check_only: bool,
    pub extract: bool,
    pub convert: bool,
    pub use_hwaccel: bool,
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub summary: BatchSummary,
    /// Manifest lines rejected by the parser.
    pub skipped_lines: usize,
}

#[derive(Debug, Default)]
pub struct PrepareReport {
    /// Expected archives present / missing at startup.
    pub archives: Partition,
    pub checked_only: bool,
    /// `None` when the list file was absent.
    pub concatenation: Option<BatchSummary>,
    pub skipped_lines: usize,
    pub extraction: Option<BatchSummary>,
    /// Copy into the dataset dir after extraction. A failed copy is reported
    /// here rather than aborting the run.
    pub layout: Option<Result<Reorganized>>,
    /// `None` when conversion was not requested or found nothing to convert.
    pub conversion: Option<BatchSummary>,
}

/// Called on the worker thread right before an item is processed.
pub type StartHook<'a> = &'a (dyn Fn(Phase, &WorkItem) + Sync);

pub struct Pipeline<'a> {
    cfg: &'a PrepConfig,
    runner: &'a dyn CommandRunner,
    on_start: Option<StartHook<'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(cfg: &'a PrepConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            cfg,
            runner,
            on_start: None,
        }
    }

    pub fn on_start(mut self, hook: StartHook<'a>) -> Self {
        self.on_start = Some(hook);
        self
    }

    fn started(&self, phase: Phase, item: &WorkItem) {
        if let Some(hook) = self.on_start {
            hook(phase, item);
        }
    }

    /// Download every manifest entry into the save dir (created if missing).
    /// A missing download list is structural.
    pub fn download<R>(&self, mut on_result: R) -> Result<DownloadReport>
    where
        R: FnMut(Phase, &TaskResult),
    {
        let cfg = self.cfg;
        let text = manifest::read_manifest(&cfg.download_list)?;
        fs::create_dir_all(&cfg.save_dir).map_err(|e| PrepError::io(&cfg.save_dir, e))?;

        let parsed = manifest::parse_downloads(&text, cfg.download_filter.as_deref());
        tracing::info!(
            files = parsed.len(),
            skipped = parsed.skipped.len(),
            "download manifest {}",
            cfg.download_list.display()
        );

        let pool = TaskPool::new(ExecutionKind::Thread, cfg.download_workers);
        let results = pool.run_with(
            parsed.items,
            |item| {
                self.started(Phase::Download, item);
                download::download_item(self.runner, &cfg.tools, &cfg.save_dir, item)
            },
            |r| on_result(Phase::Download, r),
        );
        Ok(DownloadReport {
            summary: BatchSummary::from_results(&results),
            skipped_lines: parsed.skipped.len(),
        })
    }

    /// Run the preparation phases selected by `opts`.
    pub fn prepare<R>(&self, opts: &PrepareOptions, mut on_result: R) -> Result<PrepareReport>
    where
        R: FnMut(Phase, &TaskResult),
    {
        let cfg = self.cfg;
        let save_dir = cfg.save_dir.as_path();
        if !save_dir.is_dir() {
            return Err(PrepError::MissingBaseDir(save_dir.to_path_buf()));
        }

        let mut report = PrepareReport {
            archives: existence::partition(save_dir, &cfg.expected_archives),
            ..Default::default()
        };
        if opts.check_only {
            report.checked_only = true;
            return Ok(report);
        }

        let cpu_pool = TaskPool::sized(ExecutionKind::Process, cfg.effective_max_workers());

        match manifest::read_manifest(&cfg.list_file) {
            Ok(text) => {
                let parsed = manifest::parse_concat(&text);
                report.skipped_lines = parsed.skipped.len();
                tracing::info!(items = parsed.len(), "concatenating parts");
                let results = cpu_pool.run_with(
                    parsed.items,
                    |item| {
                        self.started(Phase::Concatenate, item);
                        concat::concatenate_item(save_dir, item, opts.remove_parts)
                    },
                    |r| on_result(Phase::Concatenate, r),
                );
                report.concatenation = Some(BatchSummary::from_results(&results));
            }
            Err(PrepError::MissingManifest(path)) => {
                tracing::info!("list file {} does not exist, skipping concatenation", path.display());
            }
            Err(e) => return Err(e),
        }

        if opts.extract {
            // Re-probe: concatenation may have just produced the archives.
            let present = existence::partition(save_dir, &cfg.expected_archives).present;
            let items: Vec<WorkItem> = present
                .into_iter()
                .map(|name| WorkItem::new(name, save_dir.to_string_lossy()))
                .collect();
            let use_pigz = self.runner.is_available(&cfg.tools.pigz);
            let sequential = TaskPool::sized(ExecutionKind::Process, 1);
            let results = sequential.run_with(
                items,
                |item| {
                    self.started(Phase::Extract, item);
                    extract::extract_archive(
                        self.runner,
                        &cfg.tools,
                        &save_dir.join(&item.source),
                        Path::new(&item.target),
                        use_pigz,
                    )
                },
                |r| on_result(Phase::Extract, r),
            );
            report.extraction = Some(BatchSummary::from_results(&results));
            let reorganized = layout::reorganize(
                self.runner,
                &cfg.tools,
                save_dir,
                &cfg.layout,
                self.runner.is_available(&cfg.tools.rsync),
            );
            if let Err(e) = &reorganized {
                tracing::warn!("directory reorganization failed: {}", e);
            }
            report.layout = Some(reorganized);
        }

        if opts.convert {
            let dataset_dir = cfg.dataset_dir();
            let sources = transcode::find_sources(&dataset_dir, &cfg.transcode);
            if sources.is_empty() {
                tracing::warn!(
                    "no .{} files found under {}",
                    cfg.transcode.source_ext,
                    dataset_dir.display()
                );
            } else {
                tracing::info!(
                    files = sources.len(),
                    workers = cpu_pool.workers(),
                    "converting audio"
                );
                let items = transcode::work_items(&sources, &cfg.transcode);
                let results = cpu_pool.run_with(
                    items,
                    |item| {
                        self.started(Phase::Transcode, item);
                        transcode::transcode_item(
                            self.runner,
                            &cfg.tools,
                            &cfg.transcode,
                            item,
                            opts.use_hwaccel,
                        )
                    },
                    |r| on_result(Phase::Transcode, r),
                );
                report.conversion = Some(BatchSummary::from_results(&results));
            }
        }

        Ok(report)
    }
}

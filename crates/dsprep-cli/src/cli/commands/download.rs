//! `dsprep download` – fetch every file in the download list.

use anyhow::Result;
use dsprep_core::config::PrepConfig;
use dsprep_core::manifest::WorkItem;
use dsprep_core::pipeline::{Phase, Pipeline};
use dsprep_core::runner::SystemRunner;

pub fn run_download(cfg: &PrepConfig) -> Result<()> {
    let runner = SystemRunner::new(cfg.command_timeout());
    println!(
        "Downloading into {} with {} workers",
        cfg.save_dir.display(),
        cfg.effective_download_workers()
    );

    let announce = |_: Phase, item: &WorkItem| println!("{}", starting_message(item));
    let report = Pipeline::new(cfg, &runner)
        .on_start(&announce)
        .download(|_, r| match r.error_message() {
            Some(msg) => println!("Download of {} failed: {}", r.item.target, msg),
            None => println!("Downloaded {}", r.item.target),
        })?;

    if report.skipped_lines > 0 {
        println!("Skipped {} malformed line(s) in the download list", report.skipped_lines);
    }
    let s = report.summary;
    println!(
        "Download completed: {} successful, {} failed",
        s.succeeded, s.failed
    );
    Ok(())
}

pub(crate) fn starting_message(item: &WorkItem) -> String {
    format!("Starting download: {} -> {}", item.source, item.target)
}

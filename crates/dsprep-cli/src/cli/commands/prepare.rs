//! `dsprep prepare` – concatenate, extract and convert a downloaded dataset.

use anyhow::Result;
use dsprep_core::config::PrepConfig;
use dsprep_core::layout::Reorganized;
use dsprep_core::pipeline::{Phase, Pipeline, PrepareOptions, PrepareReport};
use dsprep_core::pool::{BatchSummary, TaskResult};
use dsprep_core::runner::SystemRunner;

pub fn run_prepare(cfg: &PrepConfig, opts: &PrepareOptions) -> Result<()> {
    let runner = SystemRunner::new(cfg.command_timeout());
    let report = Pipeline::new(cfg, &runner).prepare(opts, print_item)?;
    print_report(&report);
    Ok(())
}

/// Per-item problems are printed as soon as they arrive.
fn print_item(phase: Phase, r: &TaskResult) {
    if let Some(msg) = r.error_message() {
        println!("{} of {} failed: {}", phase_label(phase), r.item.source, msg);
    } else if let Some(warning) = r.warning() {
        println!("Warning: {}", warning);
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Download => "Download",
        Phase::Concatenate => "Concatenation",
        Phase::Extract => "Extraction",
        Phase::Transcode => "Conversion",
    }
}

fn print_report(report: &PrepareReport) {
    println!("Existing files: {}", report.archives.present.join(", "));
    println!("Missing files: {}", report.archives.missing.join(", "));
    if report.checked_only {
        return;
    }
    if report.skipped_lines > 0 {
        println!("Skipped {} malformed line(s) in the list file", report.skipped_lines);
    }
    if let Some(s) = &report.concatenation {
        print_summary("Concatenation", s);
    }
    if let Some(s) = &report.extraction {
        print_summary("Extraction", s);
    }
    match &report.layout {
        Some(Ok(Reorganized::Copied { from, to })) => {
            println!("Copied {} to {}", from.display(), to.display());
        }
        Some(Ok(Reorganized::NoSource)) => println!("No extracted audio directory found"),
        Some(Err(e)) => println!("Reorganizing directories failed: {}", e),
        None => {}
    }
    if let Some(s) = &report.conversion {
        print_summary("Conversion", s);
    }
    println!("Processing completed!");
}

fn print_summary(label: &str, s: &BatchSummary) {
    let mut line = format!(
        "{} completed: {} successful, {} failed",
        label, s.succeeded, s.failed
    );
    if s.skipped > 0 {
        line.push_str(&format!(", {} already done", s.skipped));
    }
    if s.warnings > 0 {
        line.push_str(&format!(", {} with warnings", s.warnings));
    }
    println!("{}", line);
}

//! Download of one manifest entry with an external HTTP client.
//!
//! curl is asked to follow redirects, resume partial files (`-C -`) and skip
//! TLS verification, as dataset mirrors frequently serve self-signed
//! certificates.

use std::path::Path;

use crate::config::ToolPaths;
use crate::error::Result;
use crate::manifest::WorkItem;
use crate::pool::Completion;
use crate::runner::{CommandRunner, CommandSpec};

pub fn download_command(tools: &ToolPaths, url: &str, output: &Path) -> CommandSpec {
    CommandSpec::new(&tools.curl)
        .args(["-k", "-L", "-C", "-"])
        .arg(url)
        .arg("-o")
        .arg(output)
}

/// Download `item.source` into `save_dir/item.target`.
pub fn download_item(
    runner: &dyn CommandRunner,
    tools: &ToolPaths,
    save_dir: &Path,
    item: &WorkItem,
) -> Result<Completion> {
    let output = save_dir.join(&item.target);
    tracing::info!("starting download: {}", item.target);
    runner.run_checked(&download_command(tools, &item.source, &output))?;
    tracing::info!("downloaded {}", item.target);
    Ok(Completion::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrepError;
    use crate::runner::fake::{always_ok, exit, ScriptedRunner};
    use std::ffi::OsString;

    #[test]
    fn command_line_matches_curl_resume_flags() {
        let spec = download_command(
            &ToolPaths::default(),
            "https://host/get?file=a.zip",
            Path::new("data/a.zip"),
        );
        assert_eq!(spec.program, OsString::from("curl"));
        let args: Vec<_> = spec.args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["-k", "-L", "-C", "-", "https://host/get?file=a.zip", "-o", "data/a.zip"]
        );
    }

    #[test]
    fn success_runs_one_command() {
        let runner = always_ok();
        let item = WorkItem::new("https://host/get?file=a.zip", "a.zip");
        let done = download_item(&runner, &ToolPaths::default(), Path::new("/tmp/x"), &item).unwrap();
        assert!(matches!(done, Completion::Done));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn non_zero_exit_is_external_failure_with_stderr() {
        let runner = ScriptedRunner::new(|_: &CommandSpec| exit(22));
        let item = WorkItem::new("https://host/get?file=a.zip", "a.zip");
        let err = download_item(&runner, &ToolPaths::default(), Path::new("/tmp/x"), &item)
            .unwrap_err();
        match err {
            PrepError::ExternalProcess { program, code, stderr } => {
                assert_eq!(program, "curl");
                assert_eq!(code, Some(22));
                assert_eq!(stderr, "exit 22");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

//! Command runner that imitates the external tools well enough for
//! end-to-end pipeline tests without any of them installed.
//!
//! - ffmpeg: writes an empty file at the output path (the argument right
//!   before `-loglevel`), or fails when the input path contains `corrupt`
//! - anything else: succeeds without side effects
//!
//! No optional helper (pigz, rsync) is reported as installed unless listed
//! through [`FakeTools::with_available`].

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use dsprep_core::runner::{CommandOutput, CommandRunner, CommandSpec};
use dsprep_core::Result;

#[derive(Default)]
pub struct FakeTools {
    calls: Mutex<Vec<CommandSpec>>,
    available: Vec<String>,
}

impl FakeTools {
    pub fn with_available(programs: &[&str]) -> Self {
        Self {
            available: programs.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.display_name() == program)
            .count()
    }
}

impl CommandRunner for FakeTools {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        let args: Vec<String> = spec
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        if spec.display_name() == "ffmpeg" {
            let input = args
                .iter()
                .position(|a| a == "-i")
                .and_then(|i| args.get(i + 1))
                .cloned()
                .unwrap_or_default();
            if input.contains("corrupt") {
                return Ok(CommandOutput {
                    code: Some(1),
                    stdout: Vec::new(),
                    stderr: b"Invalid data found when processing input".to_vec(),
                });
            }
            if let Some(pos) = args.iter().position(|a| a == "-loglevel") {
                let output = PathBuf::from(&args[pos - 1]);
                fs::write(&output, b"RIFF").unwrap();
            }
        }
        Ok(CommandOutput {
            code: Some(0),
            ..Default::default()
        })
    }

    fn is_available(&self, program: &str) -> bool {
        self.available.iter().any(|p| p == program)
    }
}

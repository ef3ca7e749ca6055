//! External command execution.
//!
//! Every tool the pipeline shells out to (curl, tar, rsync, ffmpeg) goes
//! through [`CommandRunner`], so pool and phase logic can be tested with a
//! scripted runner instead of real binaries. Output is captured for
//! diagnostics only; success is decided by the exit status alone.

use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{PrepError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Program plus arguments, no shell involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Program name for messages (`/usr/bin/curl` → `curl`).
    pub fn display_name(&self) -> String {
        std::path::Path::new(&self.program)
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Whole command line, lossily, for debug logs.
    pub fn to_command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit code and captured streams of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// `Ok(self)` on exit code 0, otherwise an `ExternalProcess` error
    /// carrying the captured stderr.
    pub fn into_result(self, spec: &CommandSpec) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(PrepError::ExternalProcess {
                program: spec.display_name(),
                code: self.code,
                stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            })
        }
    }
}

/// Runs one external command to completion.
///
/// Implementations must be shareable across pool workers.
pub trait CommandRunner: Send + Sync {
    /// Run `spec` and return its output. A non-zero exit is *not* an error
    /// here; only failing to start (or a timeout) is.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Run `spec` and treat a non-zero exit as [`PrepError::ExternalProcess`].
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.run(spec)?.into_result(spec)
    }

    /// Whether `program` (a name or a path) can be started. Optional helpers
    /// such as pigz and rsync are only used when this says yes.
    fn is_available(&self, program: &str) -> bool;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!("exec: {}", spec.to_command_line());
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            if self.timeout.is_some() {
                use std::os::unix::process::CommandExt;
                // Own process group, so a timeout also takes down helpers
                // the tool started (tar's pigz, a shell's children).
                cmd.process_group(0);
            }
        }
        let mut child = cmd.spawn().map_err(|e| PrepError::Spawn {
            program: spec.display_name(),
            source: e,
        })?;

        // Drain both pipes on their own threads so a chatty child never blocks
        // on a full pipe while we wait for it.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match self.timeout {
            Some(limit) => wait_with_deadline(&mut child, limit),
            None => child.wait().map(Some).map_err(|e| PrepError::Spawn {
                program: spec.display_name(),
                source: e,
            }),
        };

        // Only a process that exited on its own gets its output collected;
        // otherwise the drain threads are left to finish by themselves.
        match status {
            Ok(Some(status)) => Ok(CommandOutput {
                code: status.code(),
                stdout: collect(stdout),
                stderr: collect(stderr),
            }),
            Ok(None) => Err(PrepError::Timeout {
                program: spec.display_name(),
                after: self.timeout.unwrap_or_default(),
            }),
            Err(e) => Err(e),
        }
    }

    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Poll the child until it exits or `limit` passes. On timeout the child's
/// process group is killed and the child reaped, and `Ok(None)` is returned.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    let pid = child.id();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if Instant::now() >= deadline => {
                tracing::warn!(pid, "command exceeded {:?}, killing", limit);
                kill_group(child);
                return Ok(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                return Err(PrepError::Spawn {
                    program: format!("pid {}", pid),
                    source: e,
                })
            }
        }
    }
}

/// Kill a child started as a process group leader, with everything it spawned.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: plain syscall on a group id we created; failure is harmless.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut r: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = r.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Scripted runner for unit tests: records every command and answers with
/// an exit code chosen by a closure over the spec.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    pub(crate) struct ScriptedRunner<F> {
        respond: F,
        available: Vec<String>,
        pub(crate) calls: Mutex<Vec<CommandSpec>>,
    }

    impl<F> ScriptedRunner<F>
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput> + Send + Sync,
    {
        pub(crate) fn new(respond: F) -> Self {
            Self {
                respond,
                available: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Programs [`CommandRunner::is_available`] reports as installed.
        /// Nothing is, by default.
        pub(crate) fn with_available(mut self, programs: &[&str]) -> Self {
            self.available = programs.iter().map(|p| p.to_string()).collect();
            self
        }

        pub(crate) fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl<F> CommandRunner for ScriptedRunner<F>
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput> + Send + Sync,
    {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            (self.respond)(spec)
        }

        fn is_available(&self, program: &str) -> bool {
            self.available.iter().any(|p| p == program)
        }
    }

    pub(crate) fn exit(code: i32) -> Result<CommandOutput> {
        Ok(CommandOutput {
            code: Some(code),
            stdout: Vec::new(),
            stderr: if code == 0 {
                Vec::new()
            } else {
                format!("exit {}", code).into_bytes()
            },
        })
    }

    /// Runner where every command succeeds.
    pub(crate) fn always_ok(
    ) -> ScriptedRunner<impl Fn(&CommandSpec) -> Result<CommandOutput> + Send + Sync> {
        ScriptedRunner::new(|_: &CommandSpec| exit(0))
    }
}

//! External command execution.
//!
//! Every streamed invocation is framed by a start and an end banner on the
//! stdout sink, forwards the child's output live, and turns a non-zero exit
//! or a timeout into `execution.failed`. The end banner is only written for
//! successful runs, so after a failure the last banner names the culprit.

pub mod banner;
mod process;
#[cfg(unix)]
mod pty;
#[cfg(test)]
pub(crate) mod recording;
pub mod sink;

use std::cell::Cell;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{Error, ExecutionFailedDetails, Result};

pub use sink::{MemoryBuffer, OutputSinks, SharedSink};

/// What to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// Program followed by its arguments, executed without a shell.
    Args(Vec<String>),
    /// Code interpreted by the host shell.
    Shell(String),
}

/// One external execution, built and consumed within a single runner call.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub command: CommandSpec,
    pub working_dir: PathBuf,
    pub timeout: Option<Duration>,
}

impl CommandInvocation {
    pub fn args<I, S>(args: I, working_dir: &Path, timeout: Option<Duration>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: CommandSpec::Args(args.into_iter().map(Into::into).collect()),
            working_dir: working_dir.to_path_buf(),
            timeout,
        }
    }

    pub fn shell(code: impl Into<String>, working_dir: &Path, timeout: Option<Duration>) -> Self {
        Self {
            command: CommandSpec::Shell(code.into()),
            working_dir: working_dir.to_path_buf(),
            timeout,
        }
    }

    /// Text used in banners and error reports.
    pub fn display(&self) -> String {
        match &self.command {
            CommandSpec::Args(args) => args.join(" "),
            CommandSpec::Shell(code) => code.clone(),
        }
    }
}

/// Result of a successful streamed invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    pub command: String,
    pub success: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Output went straight to the sinks; none of it is retained.
    pub streamed: bool,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// When to hand the child a pseudo-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtyMode {
    /// Allocate one whenever the orchestrator's stdout is a terminal, checked per call.
    #[default]
    Auto,
    Always,
    Never,
}

impl TtyMode {
    fn enabled(self) -> bool {
        match self {
            TtyMode::Auto => std::io::stdout().is_terminal(),
            TtyMode::Always => true,
            TtyMode::Never => false,
        }
    }
}

/// Entry point of the platform's management CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedCli {
    pub interpreter: String,
    pub console: String,
}

impl Default for ManagedCli {
    fn default() -> Self {
        Self {
            interpreter: "php".to_string(),
            console: "bin/console".to_string(),
        }
    }
}

impl ManagedCli {
    /// Full argument vector for a non-interactive managed call.
    pub fn command_line(&self, args: &[&str]) -> Vec<String> {
        let mut line = vec![
            self.interpreter.clone(),
            self.console.clone(),
            "-n".to_string(),
        ];
        line.extend(args.iter().map(|a| a.to_string()));
        line
    }
}

/// The execution capability the upgrade pipeline and its collaborators rely on.
pub trait ProcessRunner {
    /// Stream `invocation` to completion.
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutcome>;

    /// Stream a snippet through the host shell.
    fn run_shell(&self, code: &str) -> Result<CommandOutcome>;

    /// Stream a non-interactive call of the management CLI.
    fn run_managed(&self, args: &[&str]) -> Result<CommandOutcome>;

    /// Run a management CLI query without streaming and return its stdout.
    fn capture_json(&self, args: &[&str]) -> Result<String>;

    /// Limit applied to every following invocation; `None` disables it.
    fn set_timeout(&self, timeout: Option<Duration>);
}

pub struct CommandRunner {
    project_dir: PathBuf,
    cli: ManagedCli,
    timeout: Cell<Option<Duration>>,
    tty: TtyMode,
    sinks: OutputSinks,
}

impl CommandRunner {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            cli: ManagedCli::default(),
            timeout: Cell::new(None),
            tty: TtyMode::Auto,
            sinks: OutputSinks::process(),
        }
    }

    pub fn with_cli(mut self, cli: ManagedCli) -> Self {
        self.cli = cli;
        self
    }

    pub fn with_tty(mut self, tty: TtyMode) -> Self {
        self.tty = tty;
        self
    }

    pub fn with_sinks(mut self, sinks: OutputSinks) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        self.timeout.set(timeout);
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.get()
    }

    pub fn sinks(&self) -> &OutputSinks {
        &self.sinks
    }

    fn print_pre_start(&self, command: &str) -> Result<Instant> {
        self.write_stdout(&banner::start_banner(command))?;
        Ok(Instant::now())
    }

    fn print_post_start(&self, command: &str, elapsed: Duration) -> Result<()> {
        self.write_stdout(&banner::end_banner(command, elapsed))
    }

    fn write_stdout(&self, text: &str) -> Result<()> {
        sink::write_to(&self.sinks.stdout, text.as_bytes())
            .map_err(|e| Error::internal_io(e.to_string(), Some("write banner".to_string())))
    }
}

impl ProcessRunner for CommandRunner {
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutcome> {
        let command = invocation.display();
        let started = self.print_pre_start(&command)?;

        let report = process::execute(invocation, &self.sinks, self.tty.enabled());
        let duration = started.elapsed();

        let report = report.map_err(|e| {
            Error::execution_failed(ExecutionFailedDetails {
                command: command.clone(),
                duration_ms: duration.as_secs_f64() * 1000.0,
                exit_code: None,
                timed_out: false,
            })
            .with_hint(format!("Process could not be started: {}", e))
        })?;

        if !report.success() {
            return Err(Error::execution_failed(ExecutionFailedDetails {
                command,
                duration_ms: duration.as_secs_f64() * 1000.0,
                exit_code: report.exit_code(),
                timed_out: report.timed_out,
            }));
        }

        self.print_post_start(&command, duration)?;

        Ok(CommandOutcome {
            command,
            success: true,
            duration,
            streamed: true,
        })
    }

    fn run_shell(&self, code: &str) -> Result<CommandOutcome> {
        let invocation = CommandInvocation::shell(code, &self.project_dir, self.timeout());
        self.run(&invocation)
    }

    fn run_managed(&self, args: &[&str]) -> Result<CommandOutcome> {
        let invocation =
            CommandInvocation::args(self.cli.command_line(args), &self.project_dir, self.timeout());
        self.run(&invocation)
    }

    fn capture_json(&self, args: &[&str]) -> Result<String> {
        let invocation =
            CommandInvocation::args(self.cli.command_line(args), &self.project_dir, self.timeout());
        let command = invocation.display();
        let (sinks, stdout, stderr) = OutputSinks::memory();

        let started = Instant::now();
        let report = process::execute(&invocation, &sinks, false);
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let report = report.map_err(|e| {
            Error::execution_failed(ExecutionFailedDetails {
                command: command.clone(),
                duration_ms,
                exit_code: None,
                timed_out: false,
            })
            .with_hint(format!("Process could not be started: {}", e))
        })?;

        if !report.success() {
            let mut err = Error::execution_failed(ExecutionFailedDetails {
                command,
                duration_ms,
                exit_code: report.exit_code(),
                timed_out: report.timed_out,
            });
            let stderr = stderr.contents();
            if !stderr.trim().is_empty() {
                err = err.with_hint(stderr.trim().to_string());
            }
            return Err(err);
        }

        Ok(stdout.contents())
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        self.timeout.set(timeout);
    }
}

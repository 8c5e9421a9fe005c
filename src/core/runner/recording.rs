//! In-memory `ProcessRunner` for unit tests of its callers.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use super::{CommandInvocation, CommandOutcome, ProcessRunner};
use crate::error::{Error, ExecutionFailedDetails, Result};

/// Records streamed commands instead of running them.
///
/// Managed calls are recorded without the CLI prefix. Queries answer from
/// canned output keyed by their joined arguments, `[]` by default.
#[derive(Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<String>>,
    captures: HashMap<String, String>,
    failing: Option<String>,
    timeout: Cell<Option<Duration>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capture(mut self, args: &str, output: &str) -> Self {
        self.captures.insert(args.to_string(), output.to_string());
        self
    }

    pub fn failing_on(mut self, command: &str) -> Self {
        self.failing = Some(command.to_string());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.get()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, command: String) -> Result<CommandOutcome> {
        self.calls.borrow_mut().push(command.clone());
        if self.failing.as_deref() == Some(command.as_str()) {
            return Err(Error::execution_failed(ExecutionFailedDetails {
                command,
                duration_ms: 0.0,
                exit_code: Some(1),
                timed_out: false,
            }));
        }
        Ok(CommandOutcome {
            command,
            success: true,
            duration: Duration::ZERO,
            streamed: true,
        })
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutcome> {
        self.record(invocation.display())
    }

    fn run_shell(&self, code: &str) -> Result<CommandOutcome> {
        self.run(&CommandInvocation::shell(code, Path::new("."), self.timeout.get()))
    }

    fn run_managed(&self, args: &[&str]) -> Result<CommandOutcome> {
        self.record(args.join(" "))
    }

    fn capture_json(&self, args: &[&str]) -> Result<String> {
        Ok(self
            .captures
            .get(&args.join(" "))
            .cloned()
            .unwrap_or_else(|| "[]".to_string()))
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        self.timeout.set(timeout);
    }
}

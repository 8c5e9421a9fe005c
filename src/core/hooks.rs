//! Operator hooks run before and after the upgrade.
//!
//! Hooks are shell snippets from the project configuration. A hook that
//! exits non-zero aborts the run like any other failed command.

use serde::Serialize;

use crate::config::HooksConfig;
use crate::error::Result;
use crate::runner::ProcessRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    PreUpdate,
    PostUpdate,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::PreUpdate => "pre-update",
            HookPhase::PostUpdate => "post-update",
        }
    }
}

pub trait HookExecutor {
    fn execute(&self, phase: HookPhase) -> Result<()>;
}

/// Runs the configured snippet for each phase through the host shell.
pub struct ShellHooks<'a> {
    hooks: HooksConfig,
    runner: &'a dyn ProcessRunner,
}

impl<'a> ShellHooks<'a> {
    pub fn new(hooks: HooksConfig, runner: &'a dyn ProcessRunner) -> Self {
        Self { hooks, runner }
    }

    fn snippet(&self, phase: HookPhase) -> Option<&str> {
        let code = match phase {
            HookPhase::PreUpdate => self.hooks.pre_update.as_deref(),
            HookPhase::PostUpdate => self.hooks.post_update.as_deref(),
        };
        code.filter(|c| !c.trim().is_empty())
    }
}

impl HookExecutor for ShellHooks<'_> {
    fn execute(&self, phase: HookPhase) -> Result<()> {
        let Some(code) = self.snippet(phase) else {
            crate::log_status!("hooks", "No {} hook configured", phase.as_str());
            return Ok(());
        };

        self.runner.run_shell(code)?;
        Ok(())
    }
}

//! Scripts that run once per installation.

use std::io::Write;

use crate::config::OneTimeTaskConfig;
use crate::error::{Error, Result};
use crate::runner::ProcessRunner;
use crate::state::LocalState;

pub trait OneTimeTasks {
    fn execute(&self, out: &mut dyn Write) -> Result<()>;
}

/// Remembers which tasks already ran.
pub trait TaskLedger {
    fn is_recorded(&self, id: &str) -> Result<bool>;
    fn record(&self, id: &str) -> Result<()>;
}

impl TaskLedger for LocalState<'_> {
    fn is_recorded(&self, id: &str) -> Result<bool> {
        Ok(self.executed_one_time_tasks()?.contains_key(id))
    }

    fn record(&self, id: &str) -> Result<()> {
        self.record_one_time_task(id)
    }
}

/// Runs configured task scripts through the host shell, in file order.
pub struct ConfiguredOneTimeTasks<'a> {
    tasks: Vec<OneTimeTaskConfig>,
    runner: &'a dyn ProcessRunner,
    ledger: &'a dyn TaskLedger,
}

impl<'a> ConfiguredOneTimeTasks<'a> {
    pub fn new(
        tasks: Vec<OneTimeTaskConfig>,
        runner: &'a dyn ProcessRunner,
        ledger: &'a dyn TaskLedger,
    ) -> Self {
        Self {
            tasks,
            runner,
            ledger,
        }
    }
}

impl OneTimeTasks for ConfiguredOneTimeTasks<'_> {
    fn execute(&self, out: &mut dyn Write) -> Result<()> {
        for task in &self.tasks {
            if self.ledger.is_recorded(&task.id)? {
                crate::log_status!("tasks", "One-time task {} already ran", task.id);
                continue;
            }

            writeln!(out, "Running one-time task {}", task.id)
                .map_err(|e| Error::internal_io(e.to_string(), Some("write progress".to_string())))?;

            self.runner.run_shell(&task.script)?;
            self.ledger.record(&task.id)?;
        }

        Ok(())
    }
}

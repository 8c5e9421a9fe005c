use clap::{Args, ValueEnum};
use std::path::Path;

use deployment_helper::runner::{CommandRunner, ManagedCli, TtyMode};
use deployment_helper::run_configuration::DEFAULT_TIMEOUT_SECONDS;

pub type CmdResult<T> = deployment_helper::Result<(T, i32)>;

/// Location of the installation being upgraded.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root (`~` and `$VAR` are expanded)
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub project_dir: String,
}

/// How external commands are executed.
#[derive(Args, Debug, Clone)]
pub struct RunnerArgs {
    /// Seconds each command may run; 0 disables the limit
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout: f64,

    /// PHP binary used to call the console
    #[arg(long, value_name = "BIN", default_value = "php")]
    pub php: String,

    /// Console entry point, relative to the project root
    #[arg(long, value_name = "PATH", default_value = "bin/console")]
    pub console: String,

    /// Pseudo-terminal allocation for child processes
    #[arg(long, value_enum, default_value_t = TtyArg::Auto)]
    pub tty: TtyArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtyArg {
    Auto,
    Always,
    Never,
}

impl From<TtyArg> for TtyMode {
    fn from(arg: TtyArg) -> Self {
        match arg {
            TtyArg::Auto => TtyMode::Auto,
            TtyArg::Always => TtyMode::Always,
            TtyArg::Never => TtyMode::Never,
        }
    }
}

impl RunnerArgs {
    pub fn build(&self, project_dir: &Path) -> CommandRunner {
        CommandRunner::new(project_dir)
            .with_cli(ManagedCli {
                interpreter: self.php.clone(),
                console: self.console.clone(),
            })
            .with_tty(self.tty.into())
    }
}

pub mod exec;
pub mod run;
pub mod state;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
) -> (deployment_helper::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Run(args) => dispatch!(args, run),
        crate::Commands::Exec(args) => dispatch!(args, exec),
        crate::Commands::State(args) => dispatch!(args, state),
    }
}

use clap::Args;

use deployment_helper::{paths, CommandOutcome, ProcessRunner, RunConfiguration};

use super::{CmdResult, ProjectArgs, RunnerArgs};

#[derive(Args)]
pub struct ExecArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub runner: RunnerArgs,

    /// Shell code to run, after `--`
    #[arg(last = true, required = true, value_name = "CODE")]
    pub code: Vec<String>,
}

pub fn run(args: ExecArgs) -> CmdResult<CommandOutcome> {
    let project_dir = paths::project_dir(&args.project.project_dir)?;
    let limits = RunConfiguration::new(args.runner.timeout, false, false)?;

    let runner = args.runner.build(&project_dir).with_timeout(limits.timeout());
    let outcome = runner.run_shell(&args.code.join(" "))?;

    Ok((outcome, 0))
}

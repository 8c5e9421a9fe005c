use clap::Args;
use serde::Serialize;

use deployment_helper::state::StateSnapshot;
use deployment_helper::{paths, CommandRunner, InstallationState, LocalState};

use super::{CmdResult, ProjectArgs};

#[derive(Args)]
pub struct StateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateOutput {
    pub state_file: String,
    #[serde(flatten)]
    pub snapshot: StateSnapshot,
    /// Version locked in composer.lock, if it can be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
}

pub fn run(args: StateArgs) -> CmdResult<StateOutput> {
    let project_dir = paths::project_dir(&args.project.project_dir)?;
    let runner = CommandRunner::new(&project_dir);
    let state = LocalState::new(&project_dir, &runner);

    Ok((
        StateOutput {
            state_file: paths::state_file(&project_dir).display().to_string(),
            snapshot: state.snapshot()?,
            current_version: state.current_version().ok(),
        },
        0,
    ))
}

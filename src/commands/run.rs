use clap::Args;
use serde::Serialize;
use std::io;
use std::time::Instant;

use deployment_helper::config;
use deployment_helper::environment::ProcessEnvironment;
use deployment_helper::extension::{AppLifecycle, PluginLifecycle};
use deployment_helper::hooks::ShellHooks;
use deployment_helper::license::ConsoleLicenseService;
use deployment_helper::one_time_tasks::ConfiguredOneTimeTasks;
use deployment_helper::paths;
use deployment_helper::{LocalState, RunConfiguration, Stage, UpgradePipeline};

use super::{CmdResult, ProjectArgs, RunnerArgs};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub runner: RunnerArgs,

    /// Project configuration file (default: .shopware-project.yml in the project root)
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,

    /// Do not build assets while finishing the update or installing extensions
    #[arg(long)]
    pub skip_asset_build: bool,

    /// Do not compile the active themes
    #[arg(long)]
    pub skip_theme_compile: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub previous_version: String,
    pub current_version: String,
    pub duration_ms: f64,
    pub stages: Vec<Stage>,
}

pub fn run(args: RunArgs) -> CmdResult<RunOutput> {
    let project_dir = paths::project_dir(&args.project.project_dir)?;
    let project = config::load(&paths::config_file(&project_dir, args.config.as_deref()))?;
    let run_config = RunConfiguration::new(
        args.runner.timeout,
        args.skip_asset_build,
        args.skip_theme_compile,
    )?;

    let runner = args.runner.build(&project_dir);
    let state = LocalState::new(&project_dir, &runner);
    let hooks = ShellHooks::new(project.deployment.hooks.clone(), &runner);
    let management = &project.deployment.extension_management;
    let plugins = PluginLifecycle::new(&runner, management.clone());
    let apps = AppLifecycle::new(&runner, management.clone(), &project_dir);
    let one_time_tasks =
        ConfiguredOneTimeTasks::new(project.deployment.one_time_tasks.clone(), &runner, &state);
    let license = ConsoleLicenseService::new(&runner);

    let pipeline = UpgradePipeline {
        state: &state,
        runner: &runner,
        hooks: &hooks,
        plugins: &plugins,
        apps: &apps,
        one_time_tasks: &one_time_tasks,
        license: &license,
        project: &project,
        env: &ProcessEnvironment,
    };

    let started = Instant::now();
    let report = pipeline.run(&run_config, &mut io::stdout())?;

    Ok((
        RunOutput {
            previous_version: report.previous_version,
            current_version: report.current_version,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            stages: report.stages,
        },
        0,
    ))
}

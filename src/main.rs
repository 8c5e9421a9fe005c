use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{exec, run, state};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "deployment-helper")]
#[command(version = VERSION)]
#[command(about = "Upgrade orchestration for installed Shopware projects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the upgrade pipeline against the project
    Run(run::RunArgs),
    /// Run a shell snippet in the project directory with banners and timeout
    Exec(exec::ExecArgs),
    /// Show the recorded installation state
    State(state::StateArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command);
    if let Err(e) = output::print_json_result(json_result) {
        eprintln!("{}", e);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}

// Public modules
pub mod config;
pub mod environment;
pub mod error;
pub mod extension;
pub mod hooks;
pub mod license;
pub mod one_time_tasks;
pub mod paths;
pub mod pipeline;
pub mod run_configuration;
pub mod runner;
pub mod state;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use pipeline::{Stage, UpgradePipeline, UpgradeReport};
pub use run_configuration::RunConfiguration;
pub use runner::{CommandInvocation, CommandOutcome, CommandRunner, ProcessRunner};
pub use state::{InstallationState, LocalState};

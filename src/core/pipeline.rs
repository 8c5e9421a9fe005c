//! The upgrade stage sequence.
//!
//! Stages run strictly one after another, each behind its guard; a run
//! that passes every guard reports its stages exactly as [`Stage::ORDER`].
//! The first error from any stage aborts the run and is returned as is.
//! Nothing is cleaned up on the way out: a failure after maintenance mode was
//! entered leaves it enabled.

use serde::Serialize;
use std::io::Write;

use crate::config::ProjectConfiguration;
use crate::environment::{Environment, SALES_CHANNEL_URL};
use crate::error::{Error, Result};
use crate::extension::{self, ExtensionLifecycle};
use crate::hooks::{HookExecutor, HookPhase};
use crate::license::LicenseService;
use crate::one_time_tasks::OneTimeTasks;
use crate::run_configuration::RunConfiguration;
use crate::runner::ProcessRunner;
use crate::state::InstallationState;

const CACHE_CLEAR: [&str; 3] = ["cache:pool:clear", "cache.http", "cache.object"];
const SKIP_ASSET_BUILD: &str = "--skip-asset-build";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PreHook,
    EnterMaintenance,
    FinishUpdate,
    BootstrapSalesChannel,
    RefreshCatalog,
    PluginLifecycle,
    LicenseRefresh,
    AppLifecycle,
    CompileTheme,
    OneTimeTasks,
    PostHook,
    ExitMaintenance,
}

impl Stage {
    pub const ORDER: [Stage; 12] = [
        Stage::PreHook,
        Stage::EnterMaintenance,
        Stage::FinishUpdate,
        Stage::BootstrapSalesChannel,
        Stage::RefreshCatalog,
        Stage::PluginLifecycle,
        Stage::LicenseRefresh,
        Stage::AppLifecycle,
        Stage::CompileTheme,
        Stage::OneTimeTasks,
        Stage::PostHook,
        Stage::ExitMaintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PreHook => "pre_hook",
            Stage::EnterMaintenance => "enter_maintenance",
            Stage::FinishUpdate => "finish_update",
            Stage::BootstrapSalesChannel => "bootstrap_sales_channel",
            Stage::RefreshCatalog => "refresh_catalog",
            Stage::PluginLifecycle => "plugin_lifecycle",
            Stage::LicenseRefresh => "license_refresh",
            Stage::AppLifecycle => "app_lifecycle",
            Stage::CompileTheme => "compile_theme",
            Stage::OneTimeTasks => "one_time_tasks",
            Stage::PostHook => "post_hook",
            Stage::ExitMaintenance => "exit_maintenance",
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeReport {
    pub previous_version: String,
    pub current_version: String,
    /// Stages whose guard held, in execution order.
    pub stages: Vec<Stage>,
}

impl UpgradeReport {
    pub fn ran(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

/// Everything one run consults. Collaborators are borrowed, never owned.
pub struct UpgradePipeline<'a> {
    pub state: &'a dyn InstallationState,
    pub runner: &'a dyn ProcessRunner,
    pub hooks: &'a dyn HookExecutor,
    pub plugins: &'a dyn ExtensionLifecycle,
    pub apps: &'a dyn ExtensionLifecycle,
    pub one_time_tasks: &'a dyn OneTimeTasks,
    pub license: &'a dyn LicenseService,
    pub project: &'a ProjectConfiguration,
    pub env: &'a dyn Environment,
}

impl UpgradePipeline<'_> {
    pub fn run(&self, config: &RunConfiguration, out: &mut dyn Write) -> Result<UpgradeReport> {
        self.runner.set_timeout(config.timeout());

        let maintenance = self.project.deployment.maintenance.enabled;
        let mut report = UpgradeReport::default();

        self.hooks.execute(HookPhase::PreUpdate)?;
        report.stages.push(Stage::PreHook);

        if maintenance {
            self.state.enable_maintenance()?;
            say(out, "Maintenance mode is enabled, clearing cache to make sure it is visible")?;
            self.runner.run_managed(&CACHE_CLEAR)?;
            report.stages.push(Stage::EnterMaintenance);
        } else {
            skipped(Stage::EnterMaintenance);
        }

        say(out, "Shopware is installed, running update tools")?;

        let previous = self.state.previous_version()?;
        let current = self.state.current_version()?;
        report.previous_version = previous.clone();
        report.current_version = current.clone();

        if previous != current {
            say(out, &format!("Updating Shopware from {} to {}", previous, current))?;

            let mut args = vec!["system:update:finish"];
            if config.skip_assets_install() {
                args.push(SKIP_ASSET_BUILD);
            }
            self.runner.run_managed(&args)?;
            self.state.set_version(&current)?;
            report.stages.push(Stage::FinishUpdate);
        } else {
            skipped(Stage::FinishUpdate);
        }

        if let Some(url) = self.sales_channel_to_bootstrap()? {
            let url_arg = format!("--url={}", url);
            self.runner.run_managed(&[
                "sales-channel:create:storefront",
                "--name=Storefront",
                url_arg.as_str(),
            ])?;
            report.stages.push(Stage::BootstrapSalesChannel);
        } else {
            skipped(Stage::BootstrapSalesChannel);
        }

        self.runner.run_managed(&["plugin:refresh"])?;
        self.runner.run_managed(&["theme:refresh"])?;
        self.runner.run_managed(&["scheduled-task:register"])?;
        report.stages.push(Stage::RefreshCatalog);

        extension::apply_all(self.plugins, Some(config.skip_assets_install()))?;
        report.stages.push(Stage::PluginLifecycle);

        let domain = &self.project.deployment.store.license_domain;
        if !domain.is_empty() {
            self.license.refresh(out, &current, domain)?;
            report.stages.push(Stage::LicenseRefresh);
        } else {
            skipped(Stage::LicenseRefresh);
        }

        extension::apply_all(self.apps, None)?;
        report.stages.push(Stage::AppLifecycle);

        if !config.skip_theme_compile() {
            self.runner.run_managed(&["theme:compile", "--active-only"])?;
            report.stages.push(Stage::CompileTheme);
        } else {
            skipped(Stage::CompileTheme);
        }

        self.one_time_tasks.execute(out)?;
        report.stages.push(Stage::OneTimeTasks);

        self.hooks.execute(HookPhase::PostUpdate)?;
        report.stages.push(Stage::PostHook);

        if maintenance {
            self.state.disable_maintenance()?;
            say(
                out,
                "Maintenance mode is disabled, clearing cache to make sure the storefront is visible again",
            )?;
            self.runner.run_managed(&CACHE_CLEAR)?;
            report.stages.push(Stage::ExitMaintenance);
        } else {
            skipped(Stage::ExitMaintenance);
        }

        Ok(report)
    }

    /// The configured URL, if the storefront is installed and no sales
    /// channel serves that URL yet.
    ///
    /// Later conditions are only queried when the earlier ones hold.
    fn sales_channel_to_bootstrap(&self) -> Result<Option<String>> {
        let Some(url) = self.env.var(SALES_CHANNEL_URL) else {
            return Ok(None);
        };
        if !self.state.is_storefront_installed()? || self.state.sales_channel_exists(&url)? {
            return Ok(None);
        }
        Ok(Some(url))
    }
}

fn say(out: &mut dyn Write, line: &str) -> Result<()> {
    writeln!(out, "{}", line)
        .and_then(|_| out.flush())
        .map_err(|e| Error::internal_io(e.to_string(), Some("write progress".to_string())))
}

fn skipped(stage: Stage) {
    crate::log_status!("pipeline", "Skipping {}", stage.as_str());
}

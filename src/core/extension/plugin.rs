use serde::Deserialize;

use super::{desired, parse_listing, run_managed, Desired, ExtensionLifecycle, LifecycleVerb};
use crate::config::ExtensionManagementConfig;
use crate::error::Result;
use crate::runner::ProcessRunner;

const SKIP_ASSET_BUILD: &str = "--skip-asset-build";

/// One row of `plugin:list --json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedPlugin {
    name: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    installed_at: Option<String>,
    #[serde(default)]
    upgrade_version: Option<String>,
}

impl ListedPlugin {
    fn is_installed(&self) -> bool {
        self.installed_at.is_some()
    }
}

pub struct PluginLifecycle<'a> {
    runner: &'a dyn ProcessRunner,
    config: ExtensionManagementConfig,
}

impl<'a> PluginLifecycle<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, config: ExtensionManagementConfig) -> Self {
        Self { runner, config }
    }

    fn listed(&self) -> Result<Vec<ListedPlugin>> {
        let raw = self.runner.capture_json(&["plugin:list", "--json"])?;
        parse_listing(&raw, "plugin:list")
    }

    fn command(&self, parts: &[&str], name: &str, skip_assets: bool) -> Vec<String> {
        let mut args: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
        args.push(name.to_string());
        if skip_assets {
            args.push(SKIP_ASSET_BUILD.to_string());
        }
        args
    }
}

impl ExtensionLifecycle for PluginLifecycle<'_> {
    fn apply(&self, verb: LifecycleVerb, skip_assets: Option<bool>) -> Result<()> {
        if !self.config.enabled {
            crate::log_status!("plugins", "Extension management disabled, skipping {}", verb.as_str());
            return Ok(());
        }

        let skip_assets = skip_assets.unwrap_or(false);

        for plugin in self.listed()? {
            let want = desired(&self.config, &plugin.name);
            if want == Desired::Untouched {
                continue;
            }

            match verb {
                LifecycleVerb::Install if !plugin.is_installed() => match want {
                    Desired::Active => run_managed(
                        self.runner,
                        &self.command(&["plugin:install", "--activate"], &plugin.name, skip_assets),
                    )?,
                    Desired::Inactive => run_managed(
                        self.runner,
                        &self.command(&["plugin:install"], &plugin.name, skip_assets),
                    )?,
                    _ => {}
                },
                LifecycleVerb::Update
                    if plugin.is_installed()
                        && plugin.upgrade_version.is_some()
                        && want != Desired::Removed =>
                {
                    run_managed(
                        self.runner,
                        &self.command(&["plugin:update"], &plugin.name, skip_assets),
                    )?
                }
                LifecycleVerb::Deactivate
                    if plugin.is_installed() && plugin.active && want == Desired::Inactive =>
                {
                    run_managed(
                        self.runner,
                        &self.command(&["plugin:deactivate"], &plugin.name, skip_assets),
                    )?
                }
                LifecycleVerb::Remove if plugin.is_installed() && want == Desired::Removed => {
                    if plugin.active {
                        run_managed(
                            self.runner,
                            &self.command(&["plugin:deactivate"], &plugin.name, skip_assets),
                        )?;
                    }
                    let mut uninstall = vec!["plugin:uninstall"];
                    if self.config.keeps_user_data(&plugin.name) {
                        uninstall.push("--keep-user-data");
                    }
                    run_managed(
                        self.runner,
                        &self.command(&uninstall, &plugin.name, skip_assets),
                    )?;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

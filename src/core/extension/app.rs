use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{desired, parse_listing, run_managed, Desired, ExtensionLifecycle, LifecycleVerb};
use crate::config::ExtensionManagementConfig;
use crate::error::{Error, Result};
use crate::paths;
use crate::runner::ProcessRunner;
use crate::utils::io;

/// One row of `app:list --json`.
#[derive(Debug, Clone, Deserialize)]
struct ListedApp {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    active: bool,
}

/// An app shipped with the project under `custom/apps`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LocalApp {
    name: String,
    version: Option<String>,
}

pub struct AppLifecycle<'a> {
    runner: &'a dyn ProcessRunner,
    config: ExtensionManagementConfig,
    apps_dir: PathBuf,
}

impl<'a> AppLifecycle<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        config: ExtensionManagementConfig,
        project_dir: &Path,
    ) -> Self {
        Self {
            runner,
            config,
            apps_dir: paths::apps_dir(project_dir),
        }
    }

    fn installed(&self) -> Result<BTreeMap<String, ListedApp>> {
        let raw = self.runner.capture_json(&["app:list", "--json"])?;
        let rows: Vec<ListedApp> = parse_listing(&raw, "app:list")?;

        let mut apps = BTreeMap::new();
        for app in rows {
            apps.insert(app.name.clone(), app);
        }
        Ok(apps)
    }

    fn local(&self) -> Result<Vec<LocalApp>> {
        discover(&self.apps_dir)
    }
}

impl ExtensionLifecycle for AppLifecycle<'_> {
    fn apply(&self, verb: LifecycleVerb, _skip_assets: Option<bool>) -> Result<()> {
        if !self.config.enabled {
            crate::log_status!("apps", "Extension management disabled, skipping {}", verb.as_str());
            return Ok(());
        }

        let installed = self.installed()?;

        match verb {
            LifecycleVerb::Install | LifecycleVerb::Update => {
                for app in self.local()? {
                    let want = desired(&self.config, &app.name);
                    if matches!(want, Desired::Untouched | Desired::Removed) {
                        continue;
                    }

                    match (verb, installed.get(&app.name)) {
                        (LifecycleVerb::Install, None) => {
                            let mut args = vec!["app:install".to_string()];
                            if want == Desired::Active {
                                args.push("--activate".to_string());
                            }
                            args.push(app.name.clone());
                            run_managed(self.runner, &args)?;
                        }
                        (LifecycleVerb::Update, Some(current))
                            if app.version.is_some() && app.version != current.version =>
                        {
                            run_managed(self.runner, &["app:update".to_string(), app.name.clone()])?;
                        }
                        _ => {}
                    }
                }
            }
            LifecycleVerb::Deactivate => {
                for app in installed.values() {
                    if app.active && desired(&self.config, &app.name) == Desired::Inactive {
                        run_managed(self.runner, &["app:deactivate".to_string(), app.name.clone()])?;
                    }
                }
            }
            LifecycleVerb::Remove => {
                for app in installed.values() {
                    if desired(&self.config, &app.name) != Desired::Removed {
                        continue;
                    }
                    let mut args = vec!["app:uninstall".to_string()];
                    if self.config.keeps_user_data(&app.name) {
                        args.push("--keep-user-data".to_string());
                    }
                    args.push(app.name.clone());
                    run_managed(self.runner, &args)?;
                }
            }
        }

        Ok(())
    }
}

/// Apps found in `<dir>/*/manifest.xml`, sorted by directory name.
fn discover(dir: &Path) -> Result<Vec<LocalApp>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("list {}", dir.display()))))?;

    let mut manifests: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("manifest.xml"))
        .filter(|path| path.is_file())
        .collect();
    manifests.sort();

    let mut apps = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        let fallback = manifest
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let content = io::read_file(&manifest, "read app manifest")?;
        apps.push(parse_manifest(&content, fallback));
    }

    Ok(apps)
}

fn parse_manifest(content: &str, fallback_name: String) -> LocalApp {
    LocalApp {
        name: first_element(content, "name").unwrap_or(fallback_name),
        version: first_element(content, "version"),
    }
}

fn first_element(content: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"<{tag}>\s*([^<]+?)\s*</{tag}>");
    Regex::new(&pattern)
        .ok()?
        .captures(content)
        .map(|caps| caps[1].to_string())
}

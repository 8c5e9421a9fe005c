//! Project configuration read from `.shopware-project.yml`.
//!
//! Every key is optional; a missing file behaves like an empty one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::io;

pub const DEFAULT_FILE_NAME: &str = ".shopware-project.yml";

/// Root of the YAML document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfiguration {
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeploymentConfig {
    #[serde(default)]
    pub hooks: HooksConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub extension_management: ExtensionManagementConfig,

    #[serde(default)]
    pub one_time_tasks: Vec<OneTimeTaskConfig>,
}

/// Shell snippets run around the upgrade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HooksConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_update: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_update: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MaintenanceConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    #[serde(default)]
    pub license_domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtensionManagementConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub overrides: BTreeMap<String, ExtensionOverride>,
}

impl Default for ExtensionManagementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            overrides: BTreeMap::new(),
        }
    }
}

impl ExtensionManagementConfig {
    pub fn state_of(&self, name: &str) -> Option<OverrideState> {
        self.overrides.get(name).map(|o| o.state)
    }

    pub fn keeps_user_data(&self, name: &str) -> bool {
        self.overrides
            .get(name)
            .map(|o| o.keep_user_data)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtensionOverride {
    pub state: OverrideState,

    #[serde(default)]
    pub keep_user_data: bool,
}

/// Desired state forced onto one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideState {
    /// Installed but kept deactivated.
    Inactive,
    /// Uninstalled if present.
    Remove,
    /// Left untouched by every lifecycle verb.
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OneTimeTaskConfig {
    pub id: String,
    pub script: String,
}

fn default_true() -> bool {
    true
}

/// Load configuration from `path`, falling back to defaults when it does not exist.
pub fn load(path: &Path) -> Result<ProjectConfiguration> {
    if !path.exists() {
        crate::log_status!("config", "No {} found, using defaults", path.display());
        return Ok(ProjectConfiguration::default());
    }

    let content = io::read_file(path, &format!("read {}", path.display()))?;
    let config = parse(&content, &path.display().to_string())?;
    validate(&config)?;

    Ok(config)
}

fn parse(content: &str, origin: &str) -> Result<ProjectConfiguration> {
    if content.trim().is_empty() {
        return Ok(ProjectConfiguration::default());
    }

    serde_yml::from_str(content).map_err(|e| Error::config_invalid_yaml(origin, e))
}

fn validate(config: &ProjectConfiguration) -> Result<()> {
    let mut seen = std::collections::HashSet::new();

    for task in &config.deployment.one_time_tasks {
        if task.id.trim().is_empty() {
            return Err(Error::config_missing_key(
                "deployment.one-time-tasks[].id",
                None,
            ));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(Error::config_invalid_value(
                "deployment.one-time-tasks",
                Some(task.id.clone()),
                "One-time task ids must be unique",
            ));
        }
    }

    Ok(())
}

//! Installation state consulted and mutated by the upgrade pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths;
use crate::runner::ProcessRunner;
use crate::utils::io;

/// Reported as the previous version before anything was ever recorded.
pub const UNKNOWN_VERSION: &str = "unknown";

const CORE_PACKAGE: &str = "shopware/core";
const STOREFRONT_PACKAGE: &str = "shopware/storefront";

/// Read accessors plus the narrow mutators the pipeline is allowed to use.
///
/// Versions are opaque: an update is needed exactly when previous and
/// current differ.
pub trait InstallationState {
    fn previous_version(&self) -> Result<String>;
    fn current_version(&self) -> Result<String>;
    fn is_maintenance_enabled(&self) -> Result<bool>;
    fn enable_maintenance(&self) -> Result<()>;
    fn disable_maintenance(&self) -> Result<()>;
    fn is_storefront_installed(&self) -> Result<bool>;
    fn sales_channel_exists(&self, url: &str) -> Result<bool>;
    fn set_version(&self, version: &str) -> Result<()>;
}

/// Persisted contents of the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub maintenance: bool,

    /// Task id mapped to the RFC 3339 time it completed.
    #[serde(default)]
    pub one_time_tasks: BTreeMap<String, String>,
}

/// State kept in `var/deployment-helper.json`, with the installed platform
/// version taken from `composer.lock`.
pub struct LocalState<'a> {
    project_dir: PathBuf,
    runner: &'a dyn ProcessRunner,
}

impl<'a> LocalState<'a> {
    pub fn new(project_dir: &Path, runner: &'a dyn ProcessRunner) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            runner,
        }
    }

    pub fn snapshot(&self) -> Result<StateSnapshot> {
        read_snapshot(&paths::state_file(&self.project_dir))
    }

    pub fn executed_one_time_tasks(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.snapshot()?.one_time_tasks)
    }

    pub fn record_one_time_task(&self, id: &str) -> Result<()> {
        self.update(|snapshot| {
            snapshot
                .one_time_tasks
                .insert(id.to_string(), chrono::Utc::now().to_rfc3339());
        })
    }

    fn update(&self, change: impl FnOnce(&mut StateSnapshot)) -> Result<()> {
        let path = paths::state_file(&self.project_dir);
        let mut snapshot = read_snapshot(&path)?;
        change(&mut snapshot);
        write_snapshot(&path, &snapshot)
    }

    fn locked_packages(&self) -> Result<Vec<LockedPackage>> {
        let path = paths::composer_lock(&self.project_dir);
        if !path.exists() {
            return Err(Error::state_invalid(
                path.display().to_string(),
                "composer.lock not found; run composer install first",
            ));
        }

        let content = io::read_file(&path, "read composer.lock")?;
        let lock: ComposerLock = serde_json::from_str(&content)
            .map_err(|e| Error::validation_invalid_json(e, Some("parse composer.lock".to_string())))?;

        Ok(lock.packages.into_iter().chain(lock.packages_dev).collect())
    }
}

impl InstallationState for LocalState<'_> {
    fn previous_version(&self) -> Result<String> {
        Ok(self
            .snapshot()?
            .version
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string()))
    }

    fn current_version(&self) -> Result<String> {
        self.locked_packages()?
            .into_iter()
            .find(|p| p.name == CORE_PACKAGE)
            .map(|p| normalize_version(&p.version))
            .ok_or_else(|| {
                Error::state_invalid(
                    paths::composer_lock(&self.project_dir).display().to_string(),
                    format!("{} is not locked", CORE_PACKAGE),
                )
            })
    }

    fn is_maintenance_enabled(&self) -> Result<bool> {
        Ok(self.snapshot()?.maintenance)
    }

    fn enable_maintenance(&self) -> Result<()> {
        self.runner
            .run_managed(&["sales-channel:maintenance:enable", "--all"])?;
        self.update(|snapshot| snapshot.maintenance = true)
    }

    fn disable_maintenance(&self) -> Result<()> {
        self.runner
            .run_managed(&["sales-channel:maintenance:disable", "--all"])?;
        self.update(|snapshot| snapshot.maintenance = false)
    }

    fn is_storefront_installed(&self) -> Result<bool> {
        Ok(self
            .locked_packages()?
            .iter()
            .any(|p| p.name == STOREFRONT_PACKAGE))
    }

    fn sales_channel_exists(&self, url: &str) -> Result<bool> {
        let raw = self
            .runner
            .capture_json(&["sales-channel:list", "--output=json"])?;
        let listing: Value = serde_json::from_str(raw.trim()).map_err(|e| {
            Error::validation_invalid_json(e, Some("parse sales-channel:list output".to_string()))
        })?;

        Ok(contains_url(&listing, url))
    }

    fn set_version(&self, version: &str) -> Result<()> {
        self.update(|snapshot| snapshot.version = Some(version.to_string()))
    }
}

#[derive(Deserialize)]
struct ComposerLock {
    #[serde(default)]
    packages: Vec<LockedPackage>,
    #[serde(default, rename = "packages-dev")]
    packages_dev: Vec<LockedPackage>,
}

#[derive(Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
}

fn read_snapshot(path: &Path) -> Result<StateSnapshot> {
    if !path.exists() {
        return Ok(StateSnapshot::default());
    }

    let content = io::read_file(path, "read state file")?;
    serde_json::from_str(&content)
        .map_err(|e| Error::state_invalid(path.display().to_string(), e.to_string()))
}

fn write_snapshot(path: &Path, snapshot: &StateSnapshot) -> Result<()> {
    let content = serde_json::to_string_pretty(snapshot)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize state".to_string())))?;

    io::write_file_atomic(path, &content, "write state file")
}

fn normalize_version(raw: &str) -> String {
    raw.strip_prefix('v').unwrap_or(raw).to_string()
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Whether any string anywhere in `value` names `url`.
fn contains_url(value: &Value, url: &str) -> bool {
    match value {
        Value::String(s) => same_url(s, url),
        Value::Array(items) => items.iter().any(|v| contains_url(v, url)),
        Value::Object(map) => map.values().any(|v| contains_url(v, url)),
        _ => false,
    }
}

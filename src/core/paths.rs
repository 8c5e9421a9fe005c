//! Well-known locations inside a project directory.

use std::path::{Path, PathBuf};

use crate::config::DEFAULT_FILE_NAME;
use crate::error::{Error, Result};

/// Resolve the project directory given on the command line (`~` and `$VAR` expanded).
pub fn project_dir(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).map_err(|e| {
        Error::validation_invalid_argument("project-dir", e.to_string(), Some(raw.to_string()))
    })?;
    let path = PathBuf::from(expanded.as_ref());

    if !path.is_dir() {
        return Err(Error::validation_invalid_argument(
            "project-dir",
            "Directory does not exist",
            Some(path.display().to_string()),
        ));
    }

    Ok(path)
}

/// Project configuration file, honouring an explicit override.
pub fn config_file(project_dir: &Path, explicit: Option<&str>) -> PathBuf {
    match explicit {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            let path = PathBuf::from(expanded.as_ref());
            if path.is_absolute() {
                path
            } else {
                project_dir.join(path)
            }
        }
        None => project_dir.join(DEFAULT_FILE_NAME),
    }
}

/// Directory for files the helper writes itself.
pub fn var_dir(project_dir: &Path) -> PathBuf {
    project_dir.join("var")
}

/// JSON file persisting version, maintenance flag and executed one-time tasks.
pub fn state_file(project_dir: &Path) -> PathBuf {
    var_dir(project_dir).join("deployment-helper.json")
}

pub fn composer_lock(project_dir: &Path) -> PathBuf {
    project_dir.join("composer.lock")
}

/// Directory holding locally shipped apps, one sub-directory per app.
pub fn apps_dir(project_dir: &Path) -> PathBuf {
    project_dir.join("custom").join("apps")
}

//! Plugin and app lifecycle.
//!
//! Each lifecycle walks the same fixed verb sequence. What a verb does to a
//! given extension is decided here from the installed inventory and the
//! project's override policy; the pipeline only fixes the order.

mod app;
mod plugin;

pub use app::AppLifecycle;
pub use plugin::PluginLifecycle;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::{ExtensionManagementConfig, OverrideState};
use crate::error::{Error, Result};
use crate::runner::ProcessRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleVerb {
    Install,
    Update,
    Deactivate,
    Remove,
}

impl LifecycleVerb {
    /// The only order verbs are ever applied in.
    pub const ORDER: [LifecycleVerb; 4] = [
        LifecycleVerb::Install,
        LifecycleVerb::Update,
        LifecycleVerb::Deactivate,
        LifecycleVerb::Remove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleVerb::Install => "install",
            LifecycleVerb::Update => "update",
            LifecycleVerb::Deactivate => "deactivate",
            LifecycleVerb::Remove => "remove",
        }
    }
}

/// One kind of extension whose members move through the lifecycle verbs.
///
/// `skip_assets` is `None` for kinds without an asset build step.
pub trait ExtensionLifecycle {
    fn apply(&self, verb: LifecycleVerb, skip_assets: Option<bool>) -> Result<()>;

    fn install(&self, skip_assets: Option<bool>) -> Result<()> {
        self.apply(LifecycleVerb::Install, skip_assets)
    }

    fn update(&self, skip_assets: Option<bool>) -> Result<()> {
        self.apply(LifecycleVerb::Update, skip_assets)
    }

    fn deactivate(&self, skip_assets: Option<bool>) -> Result<()> {
        self.apply(LifecycleVerb::Deactivate, skip_assets)
    }

    fn remove(&self, skip_assets: Option<bool>) -> Result<()> {
        self.apply(LifecycleVerb::Remove, skip_assets)
    }
}

/// Apply every verb in `LifecycleVerb::ORDER`, stopping at the first failure.
pub fn apply_all(lifecycle: &dyn ExtensionLifecycle, skip_assets: Option<bool>) -> Result<()> {
    for verb in LifecycleVerb::ORDER {
        lifecycle.apply(verb, skip_assets)?;
    }
    Ok(())
}

/// What the override policy wants for one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Desired {
    Active,
    Inactive,
    Removed,
    Untouched,
}

pub(crate) fn desired(config: &ExtensionManagementConfig, name: &str) -> Desired {
    if !config.enabled {
        return Desired::Untouched;
    }
    match config.state_of(name) {
        None => Desired::Active,
        Some(OverrideState::Inactive) => Desired::Inactive,
        Some(OverrideState::Remove) => Desired::Removed,
        Some(OverrideState::Ignore) => Desired::Untouched,
    }
}

/// Rows of a `*:list --json` listing.
///
/// Accepts a list or an object keyed by extension name; any other JSON
/// value is rejected rather than read as an empty inventory.
pub(crate) fn parse_listing<T: DeserializeOwned>(raw: &str, command: &str) -> Result<Vec<T>> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| Error::validation_invalid_json(e, Some(format!("parse {} output", command))))?;

    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(map) => map.into_iter().map(|(_, row)| row).collect(),
        other => {
            return Err(Error::config_invalid_value(
                command,
                Some(other.to_string()),
                "Expected a JSON list or object of extensions",
            ))
        }
    };

    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                Error::validation_invalid_json(e, Some(format!("parse {} entry", command)))
            })
        })
        .collect()
}

pub(crate) fn run_managed(runner: &dyn ProcessRunner, args: &[String]) -> Result<()> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    runner.run_managed(&args)?;
    Ok(())
}

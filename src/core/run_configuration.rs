use serde::Serialize;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT_SECONDS: f64 = 300.0;

/// One week. Larger limits are rejected; use `0` for no limit.
pub const MAX_TIMEOUT_SECONDS: f64 = 7.0 * 24.0 * 3600.0;

/// Operator-supplied switches for one pipeline run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfiguration {
    timeout_seconds: f64,
    skip_assets_install: bool,
    skip_theme_compile: bool,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            skip_assets_install: false,
            skip_theme_compile: false,
        }
    }
}

impl RunConfiguration {
    /// `timeout_seconds` of `0` disables the per-invocation limit.
    /// Values above [`MAX_TIMEOUT_SECONDS`] are rejected.
    pub fn new(
        timeout_seconds: f64,
        skip_assets_install: bool,
        skip_theme_compile: bool,
    ) -> Result<Self> {
        if !timeout_seconds.is_finite() || timeout_seconds < 0.0 {
            return Err(Error::validation_invalid_argument(
                "timeout",
                "Timeout must be a non-negative number of seconds",
                Some(timeout_seconds.to_string()),
            ));
        }
        if timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(Error::validation_invalid_argument(
                "timeout",
                format!(
                    "Timeout may not exceed {} seconds; use 0 to disable it",
                    MAX_TIMEOUT_SECONDS
                ),
                Some(timeout_seconds.to_string()),
            ));
        }

        Ok(Self {
            timeout_seconds,
            skip_assets_install,
            skip_theme_compile,
        })
    }

    pub fn timeout_seconds(&self) -> f64 {
        self.timeout_seconds
    }

    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_seconds == 0.0 {
            None
        } else {
            Some(Duration::from_secs_f64(self.timeout_seconds))
        }
    }

    pub fn skip_assets_install(&self) -> bool {
        self.skip_assets_install
    }

    pub fn skip_theme_compile(&self) -> bool {
        self.skip_theme_compile
    }
}

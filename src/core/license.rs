//! Store license host registration.

use std::io::Write;

use crate::error::{Error, Result};
use crate::runner::ProcessRunner;

pub trait LicenseService {
    fn refresh(&self, out: &mut dyn Write, version: &str, domain: &str) -> Result<()>;
}

/// Points the store integration at the licensed domain via the managed CLI.
pub struct ConsoleLicenseService<'a> {
    runner: &'a dyn ProcessRunner,
}

impl<'a> ConsoleLicenseService<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self { runner }
    }
}

impl LicenseService for ConsoleLicenseService<'_> {
    fn refresh(&self, out: &mut dyn Write, version: &str, domain: &str) -> Result<()> {
        writeln!(out, "Updating license domain to {} for version {}", domain, version)
            .map_err(|e| Error::internal_io(e.to_string(), Some("write progress".to_string())))?;

        self.runner
            .run_managed(&["system:config:set", "core.store.licenseHost", domain])?;
        Ok(())
    }
}

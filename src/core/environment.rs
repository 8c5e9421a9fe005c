use std::collections::HashMap;

/// Optional URL for bootstrapping the storefront sales channel.
pub const SALES_CHANNEL_URL: &str = "SALES_CHANNEL_URL";

/// Environment-variable lookup. Empty values count as unset.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the orchestrator's own process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

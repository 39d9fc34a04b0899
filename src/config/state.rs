// Application state module
// Immutable per-process state shared by every request

use config::ConfigError;

use super::types::Config;
use crate::fs::Root;

/// Application state
///
/// Built once at startup and shared behind an `Arc`; nothing in it changes while serving.
pub struct AppState {
    pub config: Config,
    pub root: Root,
}

impl AppState {
    /// Resolve the configured root and freeze the configuration
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let root = Root::new(config.resolve_root()?);
        Ok(Self { config, root })
    }
}

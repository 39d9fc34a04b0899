// Configuration module entry point
// Loads settings from file and environment and resolves the served root

mod state;
mod types;

use std::net::SocketAddr;
use std::path::PathBuf;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, FsConfig, HealthConfig, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional; `SERVER_`-prefixed environment variables override it,
    /// with `__` separating nested keys (`SERVER_FS__ROOT=/srv/files`).
    /// `fs.root` has no default, so a missing root fails here.
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SERVER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Default configuration serving `root`, ignoring files and environment
    pub fn with_root(root: &str) -> Result<Self, ConfigError> {
        Self::defaults()?
            .set_override("fs.root", root)?
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("fs.mount_prefix", "/api")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.backlog", 128)?
            .set_default("performance.shutdown_timeout", 10)?
            .set_default("http.server_name", "fsapi/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 10_485_760) // 10MB
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Canonical served root; it must exist and be a directory
    pub fn resolve_root(&self) -> Result<PathBuf, ConfigError> {
        if self.fs.root.trim().is_empty() {
            return Err(ConfigError::Message("fs.root must not be empty".to_string()));
        }
        let root = std::fs::canonicalize(&self.fs.root).map_err(|e| {
            ConfigError::Message(format!("fs.root '{}' is not accessible: {e}", self.fs.root))
        })?;
        if !root.is_dir() {
            return Err(ConfigError::Message(format!(
                "fs.root '{}' is not a directory",
                root.display()
            )));
        }
        Ok(root)
    }

    /// Mount prefix without trailing slash; empty means the API owns every path
    pub fn mount_prefix(&self) -> &str {
        self.fs.mount_prefix.trim_end_matches('/')
    }

    /// Body size limit as `usize`
    pub fn max_body_size(&self) -> usize {
        usize::try_from(self.http.max_body_size).unwrap_or(usize::MAX)
    }
}

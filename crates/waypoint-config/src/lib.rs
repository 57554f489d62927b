//! Waypoint Configuration System
//!
//! Provides the launch configuration consumed by the breakpoint engine:
//! - Launch arguments (`program`, `sourceMaps`, `outDir`, `outFiles`, ...)
//! - Project defaults (`waypoint.toml`)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Project defaults (`./waypoint.toml`, found by walking up the tree)
//! 2. Environment variables (`WAYPOINT_*`)
//! 3. The client's launch request
//!
//! # Example
//!
//! ```no_run
//! use waypoint_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! let launch = config
//!     .launch_config(&serde_json::json!({ "program": "dist/main.js", "sourceMaps": true }))
//!     .unwrap();
//! assert!(launch.source_maps);
//! ```

pub mod launch;
pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid launch request: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use launch::LaunchConfig;
pub use loader::{Config, ConfigLoader};
pub use project::{LaunchDefaults, LoggingConfig, ProjectConfig};

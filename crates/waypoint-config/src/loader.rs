//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::launch::LaunchConfig;
use crate::project::ProjectConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the project configuration file.
pub const PROJECT_CONFIG_FILE: &str = "waypoint.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Project defaults (./waypoint.toml) - lowest priority
/// 2. Environment variables (WAYPOINT_*) - overrides project
/// 3. Launch request - highest priority (see [`Config::launch_config`])
#[derive(Debug, Default)]
pub struct ConfigLoader;

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Project root directory (where waypoint.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find waypoint.toml, then applies
    /// environment overrides.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let project_config = self.apply_env_overrides(project_config)?;
        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            project: project_config,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); defaults when none is found.
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides to project config
    ///
    /// - WAYPOINT_SOURCE_MAPS=true|false
    /// - WAYPOINT_OUT_DIR=<path>
    /// - WAYPOINT_LOG=<filter>
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(value) = env::var("WAYPOINT_SOURCE_MAPS") {
            let enabled = parse_bool("WAYPOINT_SOURCE_MAPS", &value)?;
            config
                .launch
                .get_or_insert_with(Default::default)
                .source_maps = Some(enabled);
        }

        if let Ok(out_dir) = env::var("WAYPOINT_OUT_DIR") {
            if !out_dir.is_empty() {
                config.launch.get_or_insert_with(Default::default).out_dir =
                    Some(PathBuf::from(out_dir));
            }
        }

        if let Ok(level) = env::var("WAYPOINT_LOG") {
            if !level.trim().is_empty() {
                config.logging.get_or_insert_with(Default::default).level = Some(level);
            }
        }

        Ok(config)
    }
}

fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}

impl Config {
    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has waypoint.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Effective log filter: project setting or "info".
    pub fn log_level(&self) -> &str {
        self.project.log_level().unwrap_or("info")
    }

    /// Whether verbose logging is forced for every launch.
    pub fn verbose_logging(&self) -> bool {
        self.project
            .logging
            .as_ref()
            .and_then(|l| l.verbose)
            .unwrap_or(false)
    }

    /// Merge a client launch request over the project defaults.
    ///
    /// Relative paths in the request resolve against its `cwd`, then the
    /// project root, then the process working directory.
    pub fn launch_config(&self, request: &serde_json::Value) -> ConfigResult<LaunchConfig> {
        let mut object = request
            .as_object()
            .cloned()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "launch".to_string(),
                reason: "launch arguments must be a JSON object".to_string(),
            })?;

        self.project
            .launch_defaults()
            .apply_to(&mut object, self.project_root());

        let mut config = LaunchConfig::from_value(serde_json::Value::Object(object))?;
        if self.verbose_logging() {
            config.verbose_diagnostic_logging = true;
        }

        let base = match self.project_root() {
            Some(root) => root.to_path_buf(),
            None => env::current_dir()?,
        };
        Ok(config.resolve_paths(&base))
    }
}

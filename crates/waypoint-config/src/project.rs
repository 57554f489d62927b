//! Project Configuration (waypoint.toml)
//!
//! Handles project-level defaults stored in `waypoint.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration from waypoint.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Defaults applied to every launch request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch: Option<LaunchDefaults>,

    /// Logging configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Launch defaults; any field the launch request sets wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LaunchDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_maps: Option<bool>,

    /// Relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,

    /// Relative patterns are anchored at the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_files: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_executable: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_args: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_on_entry: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_extensions: Option<Vec<String>>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "waypoint_engine=debug"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Same effect as `verboseDiagnosticLogging` on every launch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(launch) = &self.launch {
            if let Some(extensions) = &launch.generated_extensions {
                if extensions.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "launch.generated_extensions".to_string(),
                        reason: "at least one extension is required".to_string(),
                    });
                }
            }
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            if level.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "logging.level".to_string(),
                    reason: "level cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Launch defaults, or an empty set.
    pub fn launch_defaults(&self) -> LaunchDefaults {
        self.launch.clone().unwrap_or_default()
    }

    /// Configured log filter, if any
    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    /// Merge another project config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &ProjectConfig) {
        if other.launch.is_some() {
            self.launch = other.launch.clone();
        }
        if other.logging.is_some() {
            self.logging = other.logging.clone();
        }
    }
}

impl LaunchDefaults {
    /// Insert every default the request object does not already carry.
    ///
    /// `project_root` anchors relative `out_dir` and `out_files`.
    pub fn apply_to(
        &self,
        request: &mut serde_json::Map<String, serde_json::Value>,
        project_root: Option<&Path>,
    ) {
        use serde_json::Value;

        let anchor = |path: &Path| -> PathBuf {
            match project_root {
                Some(root) if path.is_relative() => root.join(path),
                _ => path.to_path_buf(),
            }
        };

        let mut put = |key: &str, value: Value| {
            request.entry(key.to_string()).or_insert(value);
        };

        if let Some(source_maps) = self.source_maps {
            put("sourceMaps", Value::Bool(source_maps));
        }
        if let Some(out_dir) = &self.out_dir {
            put(
                "outDir",
                Value::String(anchor(out_dir).to_string_lossy().into_owned()),
            );
        }
        if let Some(out_files) = &self.out_files {
            let anchored = out_files
                .iter()
                .map(|pattern| {
                    let (bang, body) = match pattern.strip_prefix('!') {
                        Some(rest) => ("!", rest),
                        None => ("", pattern.as_str()),
                    };
                    Value::String(format!(
                        "{}{}",
                        bang,
                        anchor(Path::new(body)).to_string_lossy()
                    ))
                })
                .collect();
            put("outFiles", Value::Array(anchored));
        }
        if let Some(exe) = &self.runtime_executable {
            put(
                "runtimeExecutable",
                Value::String(exe.to_string_lossy().into_owned()),
            );
        }
        if let Some(args) = &self.runtime_args {
            put(
                "runtimeArgs",
                Value::Array(args.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(stop) = self.stop_on_entry {
            put("stopOnEntry", Value::Bool(stop));
        }
        if let Some(extensions) = &self.generated_extensions {
            put(
                "generatedExtensions",
                Value::Array(extensions.iter().cloned().map(Value::String).collect()),
            );
        }
    }
}

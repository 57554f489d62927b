//! Launch Configuration
//!
//! The arguments of a client's `launch` request, after defaults and
//! environment overrides have been merged in.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extensions the runtime executes directly when none are configured.
pub const DEFAULT_GENERATED_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

fn default_generated_extensions() -> Vec<String> {
    DEFAULT_GENERATED_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

/// Launch arguments for one debug session.
///
/// Field names follow the client protocol (`sourceMaps`, `outDir`, ...).
/// Unknown keys such as `type`, `request` or `name` are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchConfig {
    /// Program to run. May be an original source when `out_dir`/`out_files` are set.
    pub program: PathBuf,

    /// Working directory; relative paths are resolved against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Translate breakpoints through source maps.
    #[serde(default)]
    pub source_maps: bool,

    /// Root directory holding generated files and their maps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,

    /// Glob patterns selecting generated files (`**/*.js`, `!**/node_modules/**`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub out_files: Vec<String>,

    /// Runtime executable, when not the default one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_executable: Option<PathBuf>,

    /// Extra arguments passed to the runtime before the program.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime_args: Vec<String>,

    /// Arguments passed to the program.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Report the entry pause to the client instead of hiding it.
    #[serde(default)]
    pub stop_on_entry: bool,

    /// Raise engine logging to debug level.
    #[serde(default)]
    pub verbose_diagnostic_logging: bool,

    /// Extensions of files the runtime executes directly (without a leading dot).
    #[serde(default = "default_generated_extensions")]
    pub generated_extensions: Vec<String>,
}

impl LaunchConfig {
    /// Create a launch configuration for `program` with every option at its default.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cwd: None,
            source_maps: false,
            out_dir: None,
            out_files: Vec::new(),
            runtime_executable: None,
            runtime_args: Vec::new(),
            args: Vec::new(),
            stop_on_entry: false,
            verbose_diagnostic_logging: false,
            generated_extensions: default_generated_extensions(),
        }
    }

    /// Parse a launch request body.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a launch configuration from an already-parsed request body.
    pub fn from_value(value: serde_json::Value) -> ConfigResult<Self> {
        if value.get("program").is_none() {
            return Err(ConfigError::MissingField("program".to_string()));
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_source_maps(mut self, enabled: bool) -> Self {
        self.source_maps = enabled;
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(out_dir.into());
        self
    }

    pub fn with_out_files<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.out_files = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_runtime_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runtime_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stop_on_entry(mut self, stop: bool) -> Self {
        self.stop_on_entry = stop;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Validate field values.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.program.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "program".to_string(),
                reason: "program cannot be empty".to_string(),
            });
        }

        for pattern in &self.out_files {
            let body = pattern.strip_prefix('!').unwrap_or(pattern);
            if body.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "outFiles".to_string(),
                    reason: "glob pattern cannot be empty".to_string(),
                });
            }
        }

        for ext in &self.generated_extensions {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::InvalidValue {
                    field: "generatedExtensions".to_string(),
                    reason: format!("'{}' must be a bare extension like \"js\"", ext),
                });
            }
        }

        Ok(())
    }

    /// Resolve relative `program`, `outDir` and `outFiles` against `cwd`.
    ///
    /// When `cwd` is unset, `base` is used instead (and recorded as `cwd`).
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let root = match &self.cwd {
            Some(cwd) if cwd.is_absolute() => cwd.clone(),
            Some(cwd) => base.join(cwd),
            None => base.to_path_buf(),
        };

        if self.program.is_relative() {
            self.program = root.join(&self.program);
        }
        if let Some(out_dir) = self.out_dir.take() {
            self.out_dir = Some(if out_dir.is_relative() {
                root.join(out_dir)
            } else {
                out_dir
            });
        }
        self.out_files = self
            .out_files
            .into_iter()
            .map(|pattern| resolve_pattern(&root, &pattern))
            .collect();
        self.cwd = Some(root);
        self
    }

    /// Whether the runtime executes `path` directly, judged by its extension.
    pub fn is_generated_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.generated_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Whether any outDir/outFiles search root is configured.
    pub fn has_search_hints(&self) -> bool {
        self.out_dir.is_some() || !self.out_files.is_empty()
    }
}

/// Anchor a relative glob pattern at `root`, keeping a leading `!`.
fn resolve_pattern(root: &Path, pattern: &str) -> String {
    let (negated, body) = match pattern.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let anchored = if Path::new(body).is_absolute() {
        body.to_string()
    } else {
        root.join(body).to_string_lossy().into_owned()
    };
    if negated {
        format!("!{}", anchored)
    } else {
        anchored
    }
}

//! Shared test utilities for engine integration tests
//!
//! A scripted runtime that records what the engine asks of it, and on-disk
//! fixtures of compiled projects (with spaces in every directory name).

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;

use waypoint_engine::sourcemap::SourceMapBuilder;
use waypoint_engine::{
    ClientEvent, FrameId, InstallOutcome, LaunchPlan, Location, Position, Runtime,
    RuntimeBreakpointId, RuntimeError,
};

// Re-export testing utilities
pub use pretty_assertions::{assert_eq, assert_ne};

// ══════════════════════════════════════════════════════════════════════════════
// Scripted runtime
// ══════════════════════════════════════════════════════════════════════════════

/// Everything the engine asked the runtime to do.
#[derive(Debug, Default)]
pub struct RuntimeLog {
    pub launched: Vec<LaunchPlan>,
    pub installed: Vec<(RuntimeBreakpointId, Location)>,
    pub removed: Vec<RuntimeBreakpointId>,
    pub evaluations: Vec<(String, FrameId)>,
    pub resumes: usize,
    pub terminated: bool,
}

impl RuntimeLog {
    /// Installed breakpoints not removed since, as `(file, line)`.
    pub fn live_breakpoints(&self) -> Vec<(PathBuf, u32)> {
        self.installed
            .iter()
            .filter(|(id, _)| !self.removed.contains(id))
            .map(|(_, loc)| (loc.file.path().to_path_buf(), loc.line()))
            .collect()
    }
}

type Evaluator = Box<dyn FnMut(&str, FrameId) -> Result<Value, RuntimeError> + Send>;

/// A fake runtime driven entirely by the test.
pub struct ScriptedRuntime {
    log: Arc<Mutex<RuntimeLog>>,
    next_id: u64,
    evaluator: Evaluator,
    moved_lines: HashMap<u32, u32>,
    refused_lines: HashSet<u32>,
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        waypoint_engine::logging::init_test();
        Self {
            log: Arc::new(Mutex::new(RuntimeLog::default())),
            next_id: 100,
            evaluator: Box::new(|expr, _| Err(RuntimeError::Evaluation(format!("{} is not defined", expr)))),
            moved_lines: HashMap::new(),
            refused_lines: HashSet::new(),
        }
    }

    /// Shared view of the runtime log, usable after the runtime moved into a session.
    pub fn log(&self) -> Arc<Mutex<RuntimeLog>> {
        Arc::clone(&self.log)
    }

    pub fn with_evaluator<F>(mut self, evaluator: F) -> Self
    where
        F: FnMut(&str, FrameId) -> Result<Value, RuntimeError> + Send + 'static,
    {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Place breakpoints requested on `from` at `to` instead.
    pub fn moving_line(mut self, from: u32, to: u32) -> Self {
        self.moved_lines.insert(from, to);
        self
    }

    /// Refuse breakpoints on `line`.
    pub fn refusing_line(mut self, line: u32) -> Self {
        self.refused_lines.insert(line);
        self
    }
}

impl Runtime for ScriptedRuntime {
    fn launch(&mut self, plan: &LaunchPlan) -> Result<(), RuntimeError> {
        self.log.lock().launched.push(plan.clone());
        Ok(())
    }

    fn install_breakpoint(&mut self, location: &Location) -> Result<InstallOutcome, RuntimeError> {
        if self.refused_lines.contains(&location.line()) {
            return Ok(InstallOutcome::Refused(format!(
                "no executable code on line {}",
                location.line()
            )));
        }
        self.next_id += 1;
        let id = RuntimeBreakpointId(self.next_id);
        let actual = match self.moved_lines.get(&location.line()) {
            Some(line) => Position::new(*line, Some(1)),
            None => location.position,
        };
        self.log.lock().installed.push((
            id,
            Location {
                file: location.file.clone(),
                position: actual,
            },
        ));
        Ok(InstallOutcome::Installed { id, actual })
    }

    fn remove_breakpoint(&mut self, id: RuntimeBreakpointId) -> Result<(), RuntimeError> {
        self.log.lock().removed.push(id);
        Ok(())
    }

    fn evaluate(&mut self, expression: &str, frame: FrameId) -> Result<Value, RuntimeError> {
        self.log.lock().evaluations.push((expression.to_string(), frame));
        (self.evaluator)(expression, frame)
    }

    fn resume(&mut self) -> Result<(), RuntimeError> {
        self.log.lock().resumes += 1;
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), RuntimeError> {
        self.log.lock().terminated = true;
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Event helpers
// ══════════════════════════════════════════════════════════════════════════════

/// `(id, verified, line)` of every `breakpointChanged` event.
pub fn breakpoint_changes(events: &[ClientEvent]) -> Vec<(u64, bool, u32)> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::BreakpointChanged { breakpoint } => {
                Some((breakpoint.id, breakpoint.verified, breakpoint.line))
            }
            _ => None,
        })
        .collect()
}

/// `(path, line)` of every `stopped` event.
pub fn stops(events: &[ClientEvent]) -> Vec<(PathBuf, u32)> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Stopped { source, line, .. } => Some((source.path.clone(), *line)),
            _ => None,
        })
        .collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Project fixtures
// ══════════════════════════════════════════════════════════════════════════════

/// How a compiled file points at its map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapStyle {
    /// `//# sourceMappingURL=<name>.js.map` next to the file.
    Referenced,
    /// `//# sourceMappingURL=data:application/json;base64,...`.
    Inline,
    /// `<name>.js.map` next to the file, no comment.
    Sibling,
    /// Map under `<out>/maps/`, reachable only through outDir/outFiles.
    OutDirOnly,
}

/// A temporary project: `<tmp>/sourcemaps with spaces/{the source,the distribution}`.
pub struct Project {
    _dir: TempDir,
    pub root: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("sourcemaps with spaces");
        fs::create_dir_all(root.join("the source")).unwrap();
        fs::create_dir_all(root.join("the distribution")).unwrap();
        Self { _dir: dir, root }
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("the source")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join("the distribution")
    }

    pub fn src(&self, name: &str) -> PathBuf {
        self.src_dir().join(name)
    }

    pub fn out(&self, name: &str) -> PathBuf {
        self.out_dir().join(name)
    }

    /// Write `<src>/<stem>.ts` and its compiled `<out>/<stem>.js` with a map.
    ///
    /// `mappings` are 0-based `(generated line, generated column, original line, original column)`.
    pub fn compile(&self, stem: &str, mappings: &[(u32, u32, u32, u32)], style: MapStyle) -> PathBuf {
        let ts = self.src(&format!("{}.ts", stem));
        let js = self.out(&format!("{}.js", stem));
        fs::write(&ts, format!("// {}.ts\n", stem)).unwrap();

        let mut builder = SourceMapBuilder::new();
        builder.set_file(&format!("{}.js", stem));
        let source = match style {
            MapStyle::OutDirOnly => format!("../../the source/{}.ts", stem),
            _ => format!("../the source/{}.ts", stem),
        };
        let src = builder.add_source(&source, None);
        for (gl, gc, ol, oc) in mappings {
            builder.add_mapping(*gl, *gc, src, *ol, *oc, None);
        }
        if style == MapStyle::OutDirOnly {
            builder.set_file(&format!("../{}.js", stem));
        }
        let json = builder.build().to_json().unwrap();

        let map_name = format!("{}.js.map", stem);
        let mut body = format!("// compiled {}\n\"use strict\";\n", stem);
        match style {
            MapStyle::Referenced => {
                fs::write(self.out(&map_name), &json).unwrap();
                body.push_str(&format!("//# sourceMappingURL={}\n", map_name));
            }
            MapStyle::Inline => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(json.as_bytes());
                body.push_str(&format!(
                    "//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}\n",
                    encoded
                ));
            }
            MapStyle::Sibling => {
                fs::write(self.out(&map_name), &json).unwrap();
            }
            MapStyle::OutDirOnly => {
                let maps = self.out_dir().join("maps");
                fs::create_dir_all(&maps).unwrap();
                fs::write(maps.join(&map_name), &json).unwrap();
            }
        }
        fs::write(&js, body).unwrap();
        js
    }

    /// A plain JavaScript program with no map.
    pub fn plain_js(&self, name: &str) -> PathBuf {
        let js = self.out(name);
        fs::write(&js, "console.log('hello');\n").unwrap();
        js
    }
}

/// The classes sample: `classes.ts` 3 → `classes.js` 5, 16 → 20, 17 → 21:9, 21 → 25.
pub const CLASSES: &[(u32, u32, u32, u32)] = &[
    (0, 0, 0, 0),
    (4, 4, 2, 4),
    (19, 4, 15, 4),
    (20, 8, 16, 8),
    (24, 0, 20, 0),
];

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

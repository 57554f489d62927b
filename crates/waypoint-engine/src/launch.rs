//! Launch ordering: configuration first, execution second.
//!
//! The debuggee starts suspended. Breakpoints and exception filters set
//! between `launch` and `configurationDone` are in place before any user
//! code runs; the runtime's own entry pause is hidden unless the client
//! asked for it or a user breakpoint sits there.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::identity::SourceFileIdentity;
use crate::location::Location;
use crate::runtime::{FrameId, LaunchPlan};
use crate::sourcemap::{MapperCache, SearchHints, SourceMapLocator};
use waypoint_config::LaunchConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    Idle,
    /// Runtime started suspended; waiting for `configurationDone`.
    Launched,
    Running,
    Terminated,
}

impl LaunchPhase {
    pub fn name(&self) -> &'static str {
        match self {
            LaunchPhase::Idle => "idle",
            LaunchPhase::Launched => "launched",
            LaunchPhase::Running => "running",
            LaunchPhase::Terminated => "terminated",
        }
    }
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The runtime's entry pause, held until configuration is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPause {
    pub location: Location,
    pub frame: FrameId,
}

/// Tracks the launch phase and the deferred entry pause.
#[derive(Debug)]
pub struct LaunchCoordinator {
    phase: LaunchPhase,
    stop_on_entry: bool,
    entry: Option<EntryPause>,
}

impl Default for LaunchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl LaunchCoordinator {
    pub fn new() -> Self {
        Self {
            phase: LaunchPhase::Idle,
            stop_on_entry: false,
            entry: None,
        }
    }

    pub fn phase(&self) -> LaunchPhase {
        self.phase
    }

    pub fn stop_on_entry(&self) -> bool {
        self.stop_on_entry
    }

    /// Whether the runtime has been started and not yet terminated.
    pub fn is_live(&self) -> bool {
        matches!(self.phase, LaunchPhase::Launched | LaunchPhase::Running)
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == LaunchPhase::Terminated
    }

    /// Fail unless the session is idle.
    pub fn check_can_launch(&self) -> EngineResult<()> {
        match self.phase {
            LaunchPhase::Idle => Ok(()),
            LaunchPhase::Terminated => Err(EngineError::SessionClosed),
            phase => Err(EngineError::InvalidPhase {
                request: "launch",
                phase: phase.name(),
            }),
        }
    }

    /// Record a successful runtime start.
    pub fn launched(&mut self, config: &LaunchConfig) {
        self.stop_on_entry = config.stop_on_entry;
        self.phase = LaunchPhase::Launched;
        info!(program = %config.program.display(), "debuggee launched");
    }

    /// Release the debuggee; returns the entry pause if it was already reported.
    pub fn configuration_done(&mut self) -> EngineResult<Option<EntryPause>> {
        match self.phase {
            LaunchPhase::Launched => {
                self.phase = LaunchPhase::Running;
                debug!(deferred_entry = self.entry.is_some(), "configuration done");
                Ok(self.entry.take())
            }
            LaunchPhase::Terminated => Err(EngineError::SessionClosed),
            phase => Err(EngineError::InvalidPhase {
                request: "configurationDone",
                phase: phase.name(),
            }),
        }
    }

    /// Hold the entry pause while configuration is still in progress.
    ///
    /// Returns the pause back when it can be handled now.
    pub fn entry_pause(&mut self, pause: EntryPause) -> Option<EntryPause> {
        if self.phase == LaunchPhase::Launched {
            debug!(at = %pause.location, "deferring entry pause until configuration is done");
            self.entry = Some(pause);
            None
        } else {
            Some(pause)
        }
    }

    pub fn terminate(&mut self) {
        if self.phase != LaunchPhase::Terminated {
            info!(from = %self.phase, "session terminated");
        }
        self.phase = LaunchPhase::Terminated;
        self.entry = None;
    }
}

/// Decide what the runtime should execute for `config`.
///
/// With source maps on, a `program` that is an original source (not a
/// generated extension) is replaced by the generated file whose map lists
/// it, searched under outDir/outFiles.
pub fn plan_launch(
    config: &LaunchConfig,
    locator: &SourceMapLocator,
    cache: &MapperCache,
) -> LaunchPlan {
    LaunchPlan {
        program: resolve_program(config, locator, cache),
        cwd: config.cwd.clone(),
        runtime_executable: config.runtime_executable.clone(),
        runtime_args: config.runtime_args.clone(),
        args: config.args.clone(),
    }
}

fn resolve_program(config: &LaunchConfig, locator: &SourceMapLocator, cache: &MapperCache) -> PathBuf {
    if !config.source_maps || config.is_generated_file(&config.program) || !config.has_search_hints() {
        return config.program.clone();
    }

    let original = SourceFileIdentity::new(&config.program);
    let hints = SearchHints::from_launch(config);
    match locator.find_for_source(&original, &hints, cache).first() {
        Some(mapper) => {
            let generated = mapper.generated_file().path().to_path_buf();
            info!(
                program = %config.program.display(),
                generated = %generated.display(),
                "launching generated file for original program"
            );
            generated
        }
        None => {
            debug!(program = %config.program.display(), "no generated file found for program");
            config.program.clone()
        }
    }
}

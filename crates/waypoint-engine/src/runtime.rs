//! The language runtime as seen by the engine.
//!
//! The engine never talks to a debuggee directly; it drives a [`Runtime`]
//! and consumes [`RuntimeEvent`](crate::protocol::RuntimeEvent)s posted back
//! by whoever owns the runtime connection.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;
use crate::location::{Location, Position};

/// Handle of a breakpoint installed in the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuntimeBreakpointId(pub u64);

impl fmt::Display for RuntimeBreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rt#{}", self.0)
    }
}

/// The stack frame an expression is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameId(pub u64);

/// Result of asking the runtime to install a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Installed; `actual` is where the runtime placed it in the generated
    /// file, which may be later than requested.
    Installed {
        id: RuntimeBreakpointId,
        actual: Position,
    },
    /// The runtime has no executable code there.
    Refused(String),
}

/// What the runtime is asked to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// The generated file the runtime executes.
    pub program: PathBuf,
    pub cwd: Option<PathBuf>,
    pub runtime_executable: Option<PathBuf>,
    pub runtime_args: Vec<String>,
    pub args: Vec<String>,
}

/// Operations the engine needs from the debuggee's runtime.
///
/// Errors other than [`RuntimeError::Disconnected`] are treated as local
/// failures of the single operation.
pub trait Runtime: Send {
    /// Start the debuggee suspended at its entry point.
    fn launch(&mut self, plan: &LaunchPlan) -> Result<(), RuntimeError>;

    fn install_breakpoint(&mut self, location: &Location) -> Result<InstallOutcome, RuntimeError>;

    fn remove_breakpoint(&mut self, id: RuntimeBreakpointId) -> Result<(), RuntimeError>;

    /// Evaluate `expression` in `frame` of the paused debuggee.
    fn evaluate(&mut self, expression: &str, frame: FrameId) -> Result<serde_json::Value, RuntimeError>;

    fn resume(&mut self) -> Result<(), RuntimeError>;

    fn terminate(&mut self) -> Result<(), RuntimeError>;
}

impl<R: Runtime + ?Sized> Runtime for Box<R> {
    fn launch(&mut self, plan: &LaunchPlan) -> Result<(), RuntimeError> {
        (**self).launch(plan)
    }

    fn install_breakpoint(&mut self, location: &Location) -> Result<InstallOutcome, RuntimeError> {
        (**self).install_breakpoint(location)
    }

    fn remove_breakpoint(&mut self, id: RuntimeBreakpointId) -> Result<(), RuntimeError> {
        (**self).remove_breakpoint(id)
    }

    fn evaluate(&mut self, expression: &str, frame: FrameId) -> Result<serde_json::Value, RuntimeError> {
        (**self).evaluate(expression, frame)
    }

    fn resume(&mut self) -> Result<(), RuntimeError> {
        (**self).resume()
    }

    fn terminate(&mut self) -> Result<(), RuntimeError> {
        (**self).terminate()
    }
}

//! Error taxonomy for the breakpoint engine.
//!
//! Resolution failures never fail a client request: they surface as an
//! unverified breakpoint. Only a lost runtime connection ends a session.

use std::path::PathBuf;

use thiserror::Error;

use crate::identity::SourceFileIdentity;

/// Why no source map could be produced for a generated file.
#[derive(Debug, Error)]
pub enum LocateError {
    /// No inline map, no referenced or sibling map file, nothing under the search roots.
    #[error("no source map found for {0}")]
    NotFound(SourceFileIdentity),

    /// A map was found but could not be read or decoded.
    #[error("invalid source map {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Errors reported by the runtime collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    /// An expression could not be evaluated in the paused frame.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The runtime refused a request but remains usable.
    #[error("runtime rejected request: {0}")]
    Rejected(String),

    /// The connection to the debuggee is gone.
    #[error("runtime disconnected: {0}")]
    Disconnected(String),
}

impl RuntimeError {
    /// Whether this error must end the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RuntimeError::Disconnected(_))
    }
}

/// Errors returned from session request handling.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] waypoint_config::ConfigError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("request '{request}' is not valid while the session is {phase}")]
    InvalidPhase {
        request: &'static str,
        phase: &'static str,
    },

    #[error("session has ended")]
    SessionClosed,
}

/// Result type for session operations.
pub type EngineResult<T> = Result<T, EngineError>;

//! Messages exchanged with the client and the runtime.
//!
//! Field names follow the client protocol's camelCase convention so these
//! types can be (de)serialized directly from protocol JSON.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::exceptions::ExceptionKind;
use crate::runtime::FrameId;

/// Session-unique breakpoint identifier, visible to the client.
pub type BreakpointId = u64;

/// A file reference as the client spelled it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub path: PathBuf,
}

impl Source {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// One requested breakpoint in a `setBreakpoints` request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
}

impl SourceBreakpoint {
    pub fn at(line: u32) -> Self {
        Self {
            line,
            ..Self::default()
        }
    }

    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_hit_condition(mut self, hit_condition: impl Into<String>) -> Self {
        self.hit_condition = Some(hit_condition.into());
        self
    }

    pub fn with_log_message(mut self, message: impl Into<String>) -> Self {
        self.log_message = Some(message.into());
        self
    }
}

/// Verification state of a breakpoint as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointInfo {
    pub id: BreakpointId,
    pub verified: bool,
    pub source: Source,
    /// Bound line in the client's file; the requested line while unverified.
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why the debuggee stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    Breakpoint,
    Exception,
    Entry,
    Pause,
}

// ── Client side ──────────────────────────────────────────────────────────────

/// Requests from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "arguments", rename_all = "camelCase")]
pub enum ClientRequest {
    /// Raw launch arguments, merged with project defaults by the session.
    Launch(serde_json::Value),
    SetBreakpoints {
        source: Source,
        breakpoints: Vec<SourceBreakpoint>,
    },
    SetExceptionBreakpoints {
        filters: Vec<String>,
    },
    ConfigurationDone,
    Disconnect,
}

impl ClientRequest {
    /// Protocol name of the request.
    pub fn command(&self) -> &'static str {
        match self {
            ClientRequest::Launch(_) => "launch",
            ClientRequest::SetBreakpoints { .. } => "setBreakpoints",
            ClientRequest::SetExceptionBreakpoints { .. } => "setExceptionBreakpoints",
            ClientRequest::ConfigurationDone => "configurationDone",
            ClientRequest::Disconnect => "disconnect",
        }
    }
}

/// Responses to [`ClientRequest`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "body", rename_all = "camelCase")]
pub enum ClientResponse {
    /// The runtime was started with `program`.
    Launch { program: PathBuf },
    /// One entry per requested breakpoint, in request order.
    SetBreakpoints { breakpoints: Vec<BreakpointInfo> },
    SetExceptionBreakpoints { accepted: Vec<String> },
    ConfigurationDone,
    Disconnect,
}

/// Events pushed to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "body",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    Initialized,
    BreakpointChanged {
        breakpoint: BreakpointInfo,
    },
    Stopped {
        reason: StopReason,
        source: Source,
        line: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        hit_breakpoint_ids: Vec<BreakpointId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Output {
        category: String,
        output: String,
    },
    Terminated,
}

// ── Runtime side ─────────────────────────────────────────────────────────────

/// Why the runtime reports a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PauseCause {
    /// The initial suspension before any user code runs.
    Entry,
    /// An installed breakpoint was reached.
    Breakpoint,
    /// Anything else (a `debugger` statement, a pause request).
    Other,
}

/// Notifications from the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RuntimeEvent {
    /// A generated file was loaded and is about to run.
    ScriptLoaded { path: PathBuf },
    PausedAt {
        path: PathBuf,
        line: u32,
        #[serde(default)]
        column: Option<u32>,
        #[serde(default)]
        frame: FrameId,
        cause: PauseCause,
    },
    ExceptionThrown {
        kind: ExceptionKind,
        path: PathBuf,
        line: u32,
        #[serde(default)]
        column: Option<u32>,
        #[serde(default)]
        frame: FrameId,
        #[serde(default)]
        description: Option<String>,
    },
    /// No further scripts will be loaded.
    LoadingComplete,
    Exited {
        #[serde(default)]
        exit_code: Option<i32>,
    },
}

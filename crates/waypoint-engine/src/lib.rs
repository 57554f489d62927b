//! Waypoint Engine - breakpoint resolution and verification
//!
//! This library turns client breakpoint requests into runtime breakpoints:
//! - Source Map v3 decoding and original ↔ generated position translation
//! - Per-file breakpoint sets with a Requested → Pending → Verified/Rejected lifecycle
//! - Late verification when the runtime loads a script and its map appears
//! - Exception filters, condition/hit-condition gating and log points
//! - Launch ordering that keeps the debuggee suspended until configuration is done
//!
//! # Quick-start
//!
//! ```rust,no_run
//! use waypoint_engine::{ClientRequest, DebugSession, Runtime, Source, SourceBreakpoint};
//! # fn demo<R: Runtime>(runtime: R) -> waypoint_engine::EngineResult<()> {
//! let mut session = DebugSession::new(runtime);
//! session.handle_request(ClientRequest::Launch(serde_json::json!({
//!     "program": "/work/out/app.js",
//!     "sourceMaps": true,
//!     "outDir": "/work/out",
//! })))?;
//! session.handle_request(ClientRequest::SetBreakpoints {
//!     source: Source::new("/work/src/app.ts"),
//!     breakpoints: vec![SourceBreakpoint::at(17)],
//! })?;
//! session.handle_request(ClientRequest::ConfigurationDone)?;
//! for event in session.drain_events() {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod breakpoints;
pub mod condition;
pub mod driver;
pub mod error;
pub mod exceptions;
pub mod identity;
pub mod launch;
pub mod location;
pub mod logging;
pub mod protocol;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod sourcemap;

// Re-export commonly used types
pub use breakpoints::{
    Breakpoint, BreakpointRegistry, BreakpointRequest, BreakpointState, Generation, ReplaceOutcome,
    ShouldFire,
};
pub use condition::{HitCondition, LogTemplate};
pub use driver::{SessionDriver, SessionHandle, SessionMessage};
pub use error::{EngineError, EngineResult, LocateError, RuntimeError};
pub use exceptions::{ExceptionFilter, ExceptionFilterManager, ExceptionKind};
pub use identity::SourceFileIdentity;
pub use launch::{LaunchCoordinator, LaunchPhase};
pub use location::{Location, Position};
pub use protocol::{
    BreakpointId, BreakpointInfo, ClientEvent, ClientRequest, ClientResponse, PauseCause,
    RuntimeEvent, Source, SourceBreakpoint, StopReason,
};
pub use runtime::{FrameId, InstallOutcome, LaunchPlan, Runtime, RuntimeBreakpointId};
pub use scheduler::{Resolution, ScriptLoadJob, ScriptLoadOutcome, VerificationScheduler};
pub use session::{DebugSession, SessionState};
pub use sourcemap::{MapperCache, PositionMapper, SearchHints, SourceMapLocator};

//! The debug session: one dispatch point for client requests and runtime events.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::breakpoints::{Breakpoint, BreakpointRegistry, BreakpointRequest, ShouldFire};
use crate::condition::{display_value, is_truthy};
use crate::error::{EngineError, EngineResult, RuntimeError};
use crate::exceptions::{ExceptionFilterManager, ExceptionKind};
use crate::identity::SourceFileIdentity;
use crate::launch::{self, EntryPause, LaunchCoordinator, LaunchPhase};
use crate::location::{Location, Position};
use crate::logging;
use crate::protocol::{
    BreakpointId, BreakpointInfo, ClientEvent, ClientRequest, ClientResponse, PauseCause, Source,
    SourceBreakpoint, StopReason, RuntimeEvent,
};
use crate::runtime::{FrameId, InstallOutcome, Runtime};
use crate::scheduler::{ScriptLoadJob, ScriptLoadOutcome, VerificationScheduler};
use crate::sourcemap::MapperCache;
use waypoint_config::{Config, LaunchConfig};

// ── SessionState ─────────────────────────────────────────────────────────────

/// Everything one debug session knows. Owned by its [`DebugSession`].
#[derive(Debug)]
pub struct SessionState {
    pub config: Option<LaunchConfig>,
    pub registry: BreakpointRegistry,
    pub filters: ExceptionFilterManager,
    pub cache: Arc<MapperCache>,
    pub scheduler: VerificationScheduler,
    pub coordinator: LaunchCoordinator,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        let cache = Arc::new(MapperCache::new());
        Self {
            config: None,
            registry: BreakpointRegistry::new(),
            filters: ExceptionFilterManager::new(),
            scheduler: VerificationScheduler::new(Arc::clone(&cache)),
            cache,
            coordinator: LaunchCoordinator::new(),
        }
    }

    /// Drop breakpoints and cached maps.
    pub fn teardown(&mut self) -> Vec<Breakpoint> {
        self.cache.clear();
        self.registry.drain()
    }
}

// ── DebugSession ─────────────────────────────────────────────────────────────

/// Applies client requests and runtime events to a [`SessionState`].
///
/// Client-visible events are queued and collected with
/// [`drain_events`](DebugSession::drain_events).
pub struct DebugSession<R: Runtime> {
    runtime: R,
    state: SessionState,
    defaults: Config,
    events: VecDeque<ClientEvent>,
}

impl<R: Runtime> DebugSession<R> {
    pub fn new(runtime: R) -> Self {
        Self::with_config(runtime, Config::default())
    }

    /// A session whose launch requests are merged over `defaults`.
    pub fn with_config(runtime: R, defaults: Config) -> Self {
        Self {
            runtime,
            state: SessionState::new(),
            defaults,
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn phase(&self) -> LaunchPhase {
        self.state.coordinator.phase()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.coordinator.is_terminated()
    }

    /// Take every queued client event, oldest first.
    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        self.events.drain(..).collect()
    }

    // ── Client requests ──────────────────────────────────────────────────────

    pub fn handle_request(&mut self, request: ClientRequest) -> EngineResult<ClientResponse> {
        if self.is_terminated() {
            return Err(EngineError::SessionClosed);
        }
        debug!(command = request.command(), phase = %self.phase(), "client request");

        let result = match request {
            ClientRequest::Launch(arguments) => self.launch(&arguments),
            ClientRequest::SetBreakpoints {
                source,
                breakpoints,
            } => self.set_breakpoints(source, &breakpoints),
            ClientRequest::SetExceptionBreakpoints { filters } => {
                let accepted = self.state.filters.set_filters(&filters);
                Ok(ClientResponse::SetExceptionBreakpoints { accepted })
            }
            ClientRequest::ConfigurationDone => self.configuration_done(),
            ClientRequest::Disconnect => {
                self.disconnect();
                Ok(ClientResponse::Disconnect)
            }
        };
        self.end_on_fatal(result)
    }

    fn launch(&mut self, arguments: &serde_json::Value) -> EngineResult<ClientResponse> {
        self.state.coordinator.check_can_launch()?;

        let config = self.defaults.launch_config(arguments)?;
        config.validate()?;
        let level = logging::launch_level(&self.defaults, &config);
        if logging::init_with_level(level) {
            debug!(%level, "diagnostic logging enabled");
        }

        self.state.scheduler.configure(&config);
        let plan = launch::plan_launch(&config, self.state.scheduler.locator(), &self.state.cache);
        self.runtime.launch(&plan)?;
        self.state.coordinator.launched(&config);
        self.state.config = Some(config);

        self.state.scheduler.resolve_all(&mut self.state.registry);
        self.sync_runtime()?;
        self.flush_changes();
        self.events.push_back(ClientEvent::Initialized);

        Ok(ClientResponse::Launch {
            program: plan.program,
        })
    }

    fn set_breakpoints(
        &mut self,
        source: Source,
        breakpoints: &[SourceBreakpoint],
    ) -> EngineResult<ClientResponse> {
        let file = SourceFileIdentity::new(&source.path);
        let requests: Vec<BreakpointRequest> = breakpoints.iter().map(BreakpointRequest::from).collect();

        let outcome = self.state.registry.replace(file.clone(), source.path, requests);
        for removed in &outcome.removed {
            self.uninstall(removed)?;
        }

        self.state
            .scheduler
            .resolve_unresolved(&mut self.state.registry, &file);
        self.sync_runtime()?;

        let infos: Vec<BreakpointInfo> = outcome
            .slots
            .iter()
            .filter_map(|id| self.state.registry.info(*id))
            .collect();
        for id in &outcome.slots {
            self.state.registry.mark_reported(*id);
        }
        self.flush_changes();

        Ok(ClientResponse::SetBreakpoints { breakpoints: infos })
    }

    fn configuration_done(&mut self) -> EngineResult<ClientResponse> {
        match self.state.coordinator.configuration_done()? {
            Some(entry) => self.on_paused(entry.location, entry.frame, PauseCause::Entry)?,
            None => self.runtime.resume()?,
        }
        Ok(ClientResponse::ConfigurationDone)
    }

    fn disconnect(&mut self) {
        if self.state.coordinator.is_live() {
            if let Err(e) = self.runtime.terminate() {
                warn!(error = %e, "runtime did not terminate cleanly");
            }
        }
        self.shut_down();
    }

    // ── Runtime events ───────────────────────────────────────────────────────

    pub fn handle_runtime_event(&mut self, event: RuntimeEvent) -> EngineResult<()> {
        if self.is_terminated() {
            debug!(?event, "ignoring runtime event after termination");
            return Ok(());
        }

        let result = match event {
            RuntimeEvent::ScriptLoaded { path } => match self.prepare_script_load(&path) {
                Some(job) => self.apply_script_load(job.run()),
                None => Ok(()),
            },
            RuntimeEvent::PausedAt {
                path,
                line,
                column,
                frame,
                cause,
            } => {
                let location = Location::new(path, line, column);
                match cause {
                    PauseCause::Entry => {
                        match self
                            .state
                            .coordinator
                            .entry_pause(EntryPause { location, frame })
                        {
                            Some(entry) => self.on_paused(entry.location, entry.frame, cause),
                            None => Ok(()),
                        }
                    }
                    _ => self.on_paused(location, frame, cause),
                }
            }
            RuntimeEvent::ExceptionThrown {
                kind,
                path,
                line,
                column,
                description,
                ..
            } => self.on_exception(kind, Location::new(path, line, column), description),
            RuntimeEvent::LoadingComplete => {
                let rejected = self
                    .state
                    .scheduler
                    .reject_unresolved(&mut self.state.registry, "no source map found for this file");
                debug!(count = rejected.len(), "loading complete");
                self.flush_changes();
                Ok(())
            }
            RuntimeEvent::Exited { exit_code } => {
                debug!(?exit_code, "debuggee exited");
                self.shut_down();
                Ok(())
            }
        };
        self.end_on_fatal(result)
    }

    /// Snapshot the work a loaded script may unlock. `None` when there is none.
    pub fn prepare_script_load(&mut self, path: &Path) -> Option<ScriptLoadJob> {
        if self.is_terminated() {
            return None;
        }
        self.state
            .scheduler
            .prepare_script_load(path, &self.state.registry)
    }

    /// Apply a finished script-load job, install what became verified and notify.
    pub fn apply_script_load(&mut self, outcome: ScriptLoadOutcome) -> EngineResult<()> {
        if self.is_terminated() {
            return Ok(());
        }
        let changed = self
            .state
            .scheduler
            .apply_script_load(outcome, &mut self.state.registry);
        debug!(?changed, "script load applied");
        let result = self.sync_runtime();
        self.flush_changes();
        self.end_on_fatal(result)
    }

    fn on_paused(&mut self, location: Location, frame: FrameId, cause: PauseCause) -> EngineResult<()> {
        let mut pausing: Vec<BreakpointId> = Vec::new();

        for id in self.state.registry.verified_at(&location) {
            let condition = self
                .state
                .registry
                .get(id)
                .and_then(|bp| bp.request.condition.clone());
            let condition_met = match condition {
                Some(expression) => self.evaluate_condition(&expression, frame)?,
                None => true,
            };

            let Some(bp) = self.state.registry.get_mut(id) else { continue };
            match bp.record_hit(condition_met) {
                ShouldFire::Pause => pausing.push(id),
                ShouldFire::Log(template) => {
                    let mut fatal: Option<RuntimeError> = None;
                    let runtime = &mut self.runtime;
                    let mut line = template.render(|expression| match runtime.evaluate(expression, frame) {
                        Ok(value) => display_value(&value),
                        Err(e) => {
                            if e.is_fatal() {
                                fatal = Some(e.clone());
                            }
                            format!("<{}>", e)
                        }
                    });
                    if let Some(e) = fatal {
                        return Err(e.into());
                    }
                    line.push('\n');
                    self.events.push_back(ClientEvent::Output {
                        category: "console".to_string(),
                        output: line,
                    });
                }
                ShouldFire::Skip => {}
            }
        }

        let reason = if !pausing.is_empty() {
            Some(StopReason::Breakpoint)
        } else {
            match cause {
                PauseCause::Entry if self.state.coordinator.stop_on_entry() => Some(StopReason::Entry),
                PauseCause::Other => Some(StopReason::Pause),
                PauseCause::Entry | PauseCause::Breakpoint => None,
            }
        };

        match reason {
            Some(reason) => {
                debug!(?reason, at = %location, hits = ?pausing, "stopping");
                self.emit_stopped(reason, &location, pausing, None);
                Ok(())
            }
            None => {
                debug!(at = %location, ?cause, "pause not reported; resuming");
                self.runtime.resume().map_err(EngineError::from)
            }
        }
    }

    fn on_exception(
        &mut self,
        kind: ExceptionKind,
        location: Location,
        description: Option<String>,
    ) -> EngineResult<()> {
        if self.state.filters.should_pause(kind) {
            debug!(?kind, at = %location, "stopping on exception");
            self.emit_stopped(StopReason::Exception, &location, Vec::new(), description);
            Ok(())
        } else {
            self.runtime.resume().map_err(EngineError::from)
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn evaluate_condition(&mut self, expression: &str, frame: FrameId) -> EngineResult<bool> {
        match self.runtime.evaluate(expression, frame) {
            Ok(value) => Ok(is_truthy(&value)),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                warn!(%expression, error = %e, "breakpoint condition failed; treating as false");
                Ok(false)
            }
        }
    }

    /// Install every verified breakpoint the runtime does not have yet.
    fn sync_runtime(&mut self) -> EngineResult<()> {
        if !self.state.coordinator.is_live() {
            return Ok(());
        }

        for id in self.state.registry.uninstalled() {
            let Some(location) = self.state.registry.get(id).and_then(|bp| bp.resolved.clone()) else {
                continue;
            };

            let outcome = match self.runtime.install_breakpoint(&location) {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => InstallOutcome::Refused(e.to_string()),
            };

            match outcome {
                InstallOutcome::Installed { id: handle, actual } => {
                    let adjusted = (actual != location.position)
                        .then(|| self.adjusted_binding(id, &location.file, actual))
                        .flatten();
                    if let Some(bp) = self.state.registry.get_mut(id) {
                        bp.installed = Some(handle);
                        if let Some((resolved, original)) = adjusted {
                            debug!(id, from = %location, to = %resolved, "runtime moved breakpoint");
                            bp.resolved = Some(resolved);
                            bp.actual = Some(original);
                        }
                    }
                }
                InstallOutcome::Refused(reason) => {
                    debug!(id, at = %location, %reason, "runtime refused breakpoint");
                    if let Some(bp) = self.state.registry.get_mut(id) {
                        bp.reject(reason);
                    }
                }
            }
        }
        Ok(())
    }

    /// New (generated, original) binding after the runtime placed a breakpoint at `actual`.
    fn adjusted_binding(
        &self,
        id: BreakpointId,
        generated: &SourceFileIdentity,
        actual: Position,
    ) -> Option<(Location, Position)> {
        let bp = self.state.registry.get(id)?;
        let keep_column = |p: Position| Position {
            line: p.line,
            column: bp.request.position.column.and(p.column),
        };
        let resolved = Location {
            file: generated.clone(),
            position: actual,
        };

        if bp.source == *generated {
            return Some((resolved, keep_column(actual)));
        }
        let original = self
            .state
            .cache
            .get(generated)?
            .original_position_for(actual)
            .filter(|loc| loc.file == bp.source)?;
        Some((resolved, keep_column(original.position)))
    }

    fn uninstall(&mut self, bp: &Breakpoint) -> EngineResult<()> {
        let Some(handle) = bp.installed else {
            return Ok(());
        };
        match self.runtime.remove_breakpoint(handle) {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                warn!(id = bp.id, %handle, error = %e, "failed to remove breakpoint");
                Ok(())
            }
        }
    }

    /// Queue a `breakpointChanged` for every breakpoint whose client view changed.
    fn flush_changes(&mut self) {
        let mut ids: Vec<BreakpointId> = self.state.registry.iter().map(|bp| bp.id).collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(breakpoint) = self.state.registry.take_change(id) {
                self.events
                    .push_back(ClientEvent::BreakpointChanged { breakpoint });
            }
        }
    }

    fn emit_stopped(
        &mut self,
        reason: StopReason,
        generated: &Location,
        hit_breakpoint_ids: Vec<BreakpointId>,
        description: Option<String>,
    ) {
        let shown = self.client_location(generated);
        self.events.push_back(ClientEvent::Stopped {
            reason,
            source: Source::new(shown.0),
            line: shown.1,
            column: shown.2,
            hit_breakpoint_ids,
            description,
        });
    }

    /// A generated location as the client should see it: mapped back to the
    /// original source when a map is loaded, spelled with the client's path.
    fn client_location(&self, generated: &Location) -> (PathBuf, u32, Option<u32>) {
        let location = self
            .state
            .cache
            .get(&generated.file)
            .and_then(|mapper| mapper.original_position_for(generated.position))
            .unwrap_or_else(|| generated.clone());
        let path = self
            .state
            .registry
            .client_path(&location.file)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| location.file.path().to_path_buf());
        (path, location.line(), location.column())
    }

    fn shut_down(&mut self) {
        if self.is_terminated() {
            return;
        }
        self.state.scheduler.reject_unresolved(
            &mut self.state.registry,
            "session ended before the breakpoint could be bound",
        );
        self.flush_changes();
        self.state.coordinator.terminate();
        self.state.teardown();
        self.events.push_back(ClientEvent::Terminated);
    }

    /// A lost runtime ends the session; other errors only fail the request.
    fn end_on_fatal<T>(&mut self, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(EngineError::Runtime(e)) = &result {
            if e.is_fatal() {
                warn!(error = %e, "runtime connection lost; ending session");
                self.shut_down();
            }
        }
        result
    }
}

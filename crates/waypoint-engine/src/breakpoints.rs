//! Per-file breakpoint sets and their verification lifecycle.
//!
//! A client replaces all breakpoints of a file at once. Each replace bumps
//! the file's [`Generation`]; work computed against an older generation is
//! stale and must not be applied.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::condition::{HitCondition, LogTemplate};
use crate::identity::SourceFileIdentity;
use crate::location::{Location, Position};
use crate::protocol::{BreakpointId, BreakpointInfo, Source, SourceBreakpoint};
use crate::runtime::RuntimeBreakpointId;

// ── Generation ───────────────────────────────────────────────────────────────

/// Per-file counter bumped by every replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

// ── BreakpointState ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointState {
    /// Just registered; not yet resolved.
    Requested,
    /// Waiting for a source map or for the runtime to start.
    Pending,
    /// Bound to a generated location.
    Verified,
    /// Can never bind; stays unverified.
    Rejected,
}

// ── BreakpointRequest ────────────────────────────────────────────────────────

/// What the client asked for at one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointRequest {
    pub position: Position,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub log_message: Option<String>,
}

impl BreakpointRequest {
    pub fn at(line: u32, column: Option<u32>) -> Self {
        Self {
            position: Position::new(line, column),
            condition: None,
            hit_condition: None,
            log_message: None,
        }
    }
}

impl From<&SourceBreakpoint> for BreakpointRequest {
    fn from(bp: &SourceBreakpoint) -> Self {
        let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.trim().is_empty());
        Self {
            position: Position::new(bp.line, bp.column),
            condition: non_empty(&bp.condition),
            hit_condition: non_empty(&bp.hit_condition),
            log_message: non_empty(&bp.log_message),
        }
    }
}

// ── ShouldFire ───────────────────────────────────────────────────────────────

/// What a reached breakpoint asks the session to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ShouldFire {
    Pause,
    /// A log point: render the template and keep running.
    Log(LogTemplate),
    /// Not verified, condition false, or hit condition not met.
    Skip,
}

// ── Breakpoint ───────────────────────────────────────────────────────────────

/// One registered breakpoint.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub id: BreakpointId,
    /// The original (client-side) file.
    pub source: SourceFileIdentity,
    pub request: BreakpointRequest,
    pub state: BreakpointState,
    /// Generated location the runtime breaks at; set only when Verified.
    pub resolved: Option<Location>,
    /// Original-side position actually bound; may be later than requested.
    pub actual: Option<Position>,
    pub generation: Generation,
    pub installed: Option<RuntimeBreakpointId>,
    pub hit_count: u64,
    /// Why the breakpoint is unverified, when known.
    pub message: Option<String>,
    hit_condition: Option<HitCondition>,
    log_template: Option<LogTemplate>,
    reported: Option<BreakpointInfo>,
}

impl Breakpoint {
    fn new(
        id: BreakpointId,
        source: SourceFileIdentity,
        request: BreakpointRequest,
        generation: Generation,
    ) -> Self {
        let log_template = request.log_message.as_deref().map(LogTemplate::parse);
        let mut bp = Self {
            id,
            source,
            request,
            state: BreakpointState::Requested,
            resolved: None,
            actual: None,
            generation,
            installed: None,
            hit_count: 0,
            message: None,
            hit_condition: None,
            log_template,
            reported: None,
        };
        if let Some(text) = bp.request.hit_condition.clone() {
            match HitCondition::parse(&text) {
                Ok(hit) => bp.hit_condition = Some(hit),
                Err(e) => bp.reject(e.to_string()),
            }
        }
        bp
    }

    /// The same breakpoint in a newer generation, keeping id, binding and install handle.
    fn carried_into(previous: Breakpoint, generation: Generation) -> Self {
        Self {
            generation,
            ..previous
        }
    }

    pub fn is_verified(&self) -> bool {
        self.state == BreakpointState::Verified
    }

    /// Requested or Pending.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self.state,
            BreakpointState::Requested | BreakpointState::Pending
        )
    }

    pub fn is_log_point(&self) -> bool {
        self.log_template.is_some()
    }

    pub fn verify(&mut self, resolved: Location, actual: Position) {
        self.state = BreakpointState::Verified;
        self.resolved = Some(resolved);
        self.actual = Some(actual);
        self.message = None;
    }

    pub fn reject(&mut self, reason: impl Into<String>) {
        self.state = BreakpointState::Rejected;
        self.resolved = None;
        self.actual = None;
        self.message = Some(reason.into());
    }

    pub fn mark_pending(&mut self) {
        if self.state == BreakpointState::Requested {
            self.state = BreakpointState::Pending;
        }
    }

    /// Whether a pause at `location` (generated side) is this breakpoint.
    ///
    /// Line always; column only when the client asked for one.
    pub fn matches_pause(&self, location: &Location) -> bool {
        let Some(resolved) = &self.resolved else {
            return false;
        };
        match self.request.position.column {
            Some(_) => resolved.matches(location),
            None => resolved.same_line(location),
        }
    }

    /// Count a hit whose condition evaluated to `condition_met`.
    pub fn record_hit(&mut self, condition_met: bool) -> ShouldFire {
        if !self.is_verified() || !condition_met {
            return ShouldFire::Skip;
        }

        self.hit_count += 1;

        if let Some(hit) = &self.hit_condition {
            if !hit.is_met(self.hit_count) {
                return ShouldFire::Skip;
            }
        }

        match &self.log_template {
            Some(template) => ShouldFire::Log(template.clone()),
            None => ShouldFire::Pause,
        }
    }

    /// Protocol view, echoing `client_path` as the source.
    pub fn info(&self, client_path: &Path) -> BreakpointInfo {
        let position = match (self.state, self.actual) {
            (BreakpointState::Verified, Some(actual)) => actual,
            _ => self.request.position,
        };
        BreakpointInfo {
            id: self.id,
            verified: self.is_verified(),
            source: Source::new(client_path),
            line: position.line,
            column: position.column,
            message: self.message.clone(),
        }
    }
}

// ── BreakpointRegistry ───────────────────────────────────────────────────────

#[derive(Debug)]
struct FileBreakpoints {
    client_path: PathBuf,
    generation: Generation,
    breakpoints: Vec<Breakpoint>,
}

/// Result of replacing a file's breakpoints.
#[derive(Debug)]
pub struct ReplaceOutcome {
    pub generation: Generation,
    /// One id per request, in request order; duplicates share an id.
    pub slots: Vec<BreakpointId>,
    /// Breakpoints of the previous set that were not carried over.
    pub removed: Vec<Breakpoint>,
}

/// Authoritative breakpoint sets, keyed by original file.
#[derive(Debug)]
pub struct BreakpointRegistry {
    files: HashMap<SourceFileIdentity, FileBreakpoints>,
    index: HashMap<BreakpointId, SourceFileIdentity>,
    next_id: BreakpointId,
}

impl Default for BreakpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            index: HashMap::new(),
            next_id: 1,
        }
    }

    /// Atomically replace every breakpoint of `file`.
    ///
    /// Requests at the same `(line, column)` collapse into the first one.
    /// A previous breakpoint with an identical request keeps its id,
    /// binding and runtime handle; the rest come back in `removed`.
    pub fn replace(
        &mut self,
        file: SourceFileIdentity,
        client_path: impl Into<PathBuf>,
        requests: Vec<BreakpointRequest>,
    ) -> ReplaceOutcome {
        let (generation, mut previous) = match self.files.remove(&file) {
            Some(old) => (old.generation.next(), old.breakpoints),
            None => (Generation(1), Vec::new()),
        };
        for bp in &previous {
            self.index.remove(&bp.id);
        }

        let mut breakpoints: Vec<Breakpoint> = Vec::with_capacity(requests.len());
        let mut slots = Vec::with_capacity(requests.len());

        for request in requests {
            if let Some(existing) = breakpoints
                .iter()
                .find(|bp| bp.request.position == request.position)
            {
                slots.push(existing.id);
                continue;
            }

            let bp = match previous.iter().position(|old| old.request == request) {
                Some(idx) => Breakpoint::carried_into(previous.swap_remove(idx), generation),
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    Breakpoint::new(id, file.clone(), request, generation)
                }
            };
            slots.push(bp.id);
            breakpoints.push(bp);
        }

        for bp in &breakpoints {
            self.index.insert(bp.id, file.clone());
        }
        debug!(
            file = %file,
            %generation,
            kept = breakpoints.len(),
            removed = previous.len(),
            "replaced breakpoints"
        );

        self.files.insert(
            file,
            FileBreakpoints {
                client_path: client_path.into(),
                generation,
                breakpoints,
            },
        );

        ReplaceOutcome {
            generation,
            slots,
            removed: previous,
        }
    }

    pub fn generation(&self, file: &SourceFileIdentity) -> Option<Generation> {
        self.files.get(file).map(|f| f.generation)
    }

    /// The path the client last used for `file`.
    pub fn client_path(&self, file: &SourceFileIdentity) -> Option<&Path> {
        self.files.get(file).map(|f| f.client_path.as_path())
    }

    pub fn get(&self, id: BreakpointId) -> Option<&Breakpoint> {
        let file = self.index.get(&id)?;
        self.files.get(file)?.breakpoints.iter().find(|bp| bp.id == id)
    }

    pub fn get_mut(&mut self, id: BreakpointId) -> Option<&mut Breakpoint> {
        let file = self.index.get(&id)?;
        self.files
            .get_mut(file)?
            .breakpoints
            .iter_mut()
            .find(|bp| bp.id == id)
    }

    pub fn breakpoints_in(&self, file: &SourceFileIdentity) -> &[Breakpoint] {
        self.files
            .get(file)
            .map(|f| f.breakpoints.as_slice())
            .unwrap_or(&[])
    }

    /// Ids of `file`'s breakpoints that still need resolving.
    pub fn unresolved_in(&self, file: &SourceFileIdentity) -> Vec<BreakpointId> {
        self.breakpoints_in(file)
            .iter()
            .filter(|bp| bp.is_unresolved())
            .map(|bp| bp.id)
            .collect()
    }

    /// Files holding unresolved breakpoints, with their current generation.
    pub fn unresolved_files(&self) -> Vec<(SourceFileIdentity, Generation)> {
        let mut files: Vec<_> = self
            .files
            .iter()
            .filter(|(_, f)| f.breakpoints.iter().any(Breakpoint::is_unresolved))
            .map(|(file, f)| (file.clone(), f.generation))
            .collect();
        files.sort();
        files
    }

    /// Verified breakpoints bound at `location`, in id order.
    pub fn verified_at(&self, location: &Location) -> Vec<BreakpointId> {
        let mut ids: Vec<BreakpointId> = self
            .iter()
            .filter(|bp| bp.is_verified() && bp.matches_pause(location))
            .map(|bp| bp.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Verified breakpoints not yet installed in the runtime.
    pub fn uninstalled(&self) -> Vec<BreakpointId> {
        let mut ids: Vec<BreakpointId> = self
            .iter()
            .filter(|bp| bp.is_verified() && bp.installed.is_none())
            .map(|bp| bp.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.files.values().flat_map(|f| f.breakpoints.iter())
    }

    pub fn count(&self) -> usize {
        self.index.len()
    }

    pub fn info(&self, id: BreakpointId) -> Option<BreakpointInfo> {
        let file = self.index.get(&id)?;
        let entry = self.files.get(file)?;
        let bp = entry.breakpoints.iter().find(|bp| bp.id == id)?;
        Some(bp.info(&entry.client_path))
    }

    /// Record that the client has seen `id`'s current state.
    pub fn mark_reported(&mut self, id: BreakpointId) {
        let Some(info) = self.info(id) else { return };
        if let Some(bp) = self.get_mut(id) {
            bp.reported = Some(info);
        }
    }

    /// The new client view of `id` if it differs from the last reported one.
    pub fn take_change(&mut self, id: BreakpointId) -> Option<BreakpointInfo> {
        let info = self.info(id)?;
        let bp = self.get_mut(id)?;
        if bp.reported.as_ref() == Some(&info) {
            return None;
        }
        bp.reported = Some(info.clone());
        Some(info)
    }

    /// Remove every breakpoint, for session teardown.
    pub fn drain(&mut self) -> Vec<Breakpoint> {
        self.index.clear();
        let mut all: Vec<Breakpoint> = self
            .files
            .drain()
            .flat_map(|(_, f)| f.breakpoints)
            .collect();
        all.sort_by_key(|bp| bp.id);
        all
    }
}

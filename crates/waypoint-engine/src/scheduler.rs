//! Breakpoint resolution and late verification.
//!
//! Resolution runs synchronously when breakpoints are set and again when
//! the runtime reports a loaded script. Loading a script's map is split into
//! [`VerificationScheduler::prepare_script_load`] (snapshot, on the event
//! loop), [`ScriptLoadJob::run`] (disk and decoding, anywhere) and
//! [`VerificationScheduler::apply_script_load`] (back on the event loop),
//! so a slow map never blocks other events. Results computed for a file
//! whose breakpoints were replaced in the meantime are discarded by
//! generation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::breakpoints::{BreakpointRegistry, BreakpointState, Generation};
use crate::error::LocateError;
use crate::identity::SourceFileIdentity;
use crate::location::{Location, Position};
use crate::protocol::BreakpointId;
use crate::sourcemap::{MapperCache, MappedPosition, PositionMapper, SearchHints, SourceMapLocator};
use waypoint_config::LaunchConfig;

/// Outcome of resolving one requested position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Verified { generated: Location, actual: Position },
    Rejected(String),
    Pending,
}

#[derive(Debug, Clone)]
struct ResolveMode {
    source_maps: bool,
    hints: SearchHints,
}

#[derive(Debug, Clone)]
struct PendingBreakpoint {
    id: BreakpointId,
    source: SourceFileIdentity,
    generation: Generation,
    position: Position,
}

/// A pre-translation computed by a [`ScriptLoadJob`].
#[derive(Debug, Clone)]
pub struct Translation {
    pub breakpoint: BreakpointId,
    pub source: SourceFileIdentity,
    pub generation: Generation,
    pub mapped: Option<MappedPosition>,
}

/// Map loading and pre-translation for one loaded script.
#[derive(Debug)]
pub struct ScriptLoadJob {
    generated: SourceFileIdentity,
    pending: Vec<PendingBreakpoint>,
    cache: Arc<MapperCache>,
    locator: SourceMapLocator,
    hints: SearchHints,
}

/// What a finished [`ScriptLoadJob`] hands back to the scheduler.
#[derive(Debug)]
pub struct ScriptLoadOutcome {
    pub generated: SourceFileIdentity,
    pub mapper: Option<Arc<PositionMapper>>,
    pub translations: Vec<Translation>,
}

impl ScriptLoadJob {
    pub fn generated(&self) -> &SourceFileIdentity {
        &self.generated
    }

    /// Load (or reuse) the script's map and translate the snapshot through it.
    pub fn run(self) -> ScriptLoadOutcome {
        let generated = &self.generated;
        let mapper = match self
            .cache
            .get_or_load(generated, || self.locator.locate(generated, &self.hints))
        {
            Ok(mapper) => Some(mapper),
            Err(LocateError::NotFound(_)) => {
                debug!(script = %generated, "script has no source map");
                None
            }
            Err(LocateError::Parse { path, reason }) => {
                warn!(script = %generated, map = %path.display(), %reason, "unreadable source map");
                None
            }
        };

        let translations = match &mapper {
            Some(mapper) => self
                .pending
                .iter()
                .filter(|p| mapper.has_source(&p.source))
                .map(|p| Translation {
                    breakpoint: p.id,
                    source: p.source.clone(),
                    generation: p.generation,
                    mapped: mapper.generated_position_for(&p.source, p.position),
                })
                .collect(),
            None => Vec::new(),
        };

        ScriptLoadOutcome {
            generated: self.generated,
            mapper,
            translations,
        }
    }
}

/// Drives breakpoints from Requested to Verified or Rejected.
#[derive(Debug)]
pub struct VerificationScheduler {
    cache: Arc<MapperCache>,
    locator: SourceMapLocator,
    mode: Option<ResolveMode>,
    loaded_scripts: HashSet<SourceFileIdentity>,
}

impl VerificationScheduler {
    pub fn new(cache: Arc<MapperCache>) -> Self {
        Self {
            cache,
            locator: SourceMapLocator::new(),
            mode: None,
            loaded_scripts: HashSet::new(),
        }
    }

    pub fn cache(&self) -> &Arc<MapperCache> {
        &self.cache
    }

    pub fn locator(&self) -> &SourceMapLocator {
        &self.locator
    }

    /// Search hints of the launched configuration.
    pub fn hints(&self) -> Option<&SearchHints> {
        self.mode.as_ref().map(|m| &m.hints)
    }

    /// Whether a launch configuration has been applied.
    pub fn is_configured(&self) -> bool {
        self.mode.is_some()
    }

    /// Apply the launch configuration and preload maps under outDir/outFiles.
    pub fn configure(&mut self, config: &LaunchConfig) {
        let hints = SearchHints::from_launch(config);
        if config.source_maps && !hints.is_empty() {
            let loaded = self.locator.preload(&hints, &self.cache);
            debug!(loaded, "source maps available at launch");
        }
        self.mode = Some(ResolveMode {
            source_maps: config.source_maps,
            hints,
        });
    }

    /// Resolve one original position with what is known right now.
    pub fn resolve(&self, source: &SourceFileIdentity, requested: Position) -> Resolution {
        let Some(mode) = &self.mode else {
            return Resolution::Pending;
        };

        if !mode.source_maps {
            return Resolution::Verified {
                generated: Location {
                    file: source.clone(),
                    position: requested,
                },
                actual: requested,
            };
        }

        let mappers = self.cache.find_by_source(source);
        if !mappers.is_empty() {
            return mappers
                .iter()
                .find_map(|m| m.generated_position_for(source, requested))
                .map(|mapped| Resolution::Verified {
                    generated: mapped.generated,
                    actual: mapped.original.position,
                })
                .unwrap_or_else(|| {
                    Resolution::Rejected(format!(
                        "no generated code at or after line {}",
                        requested.line
                    ))
                });
        }

        if mode.hints.is_generated_file(source.path()) {
            return Resolution::Verified {
                generated: Location {
                    file: source.clone(),
                    position: requested,
                },
                actual: requested,
            };
        }

        Resolution::Pending
    }

    /// Resolve every unresolved breakpoint of `file`; returns the ids that moved state.
    pub fn resolve_unresolved(
        &self,
        registry: &mut BreakpointRegistry,
        file: &SourceFileIdentity,
    ) -> Vec<BreakpointId> {
        let mut changed = Vec::new();
        for id in registry.unresolved_in(file) {
            let Some(bp) = registry.get_mut(id) else { continue };
            let before = bp.state;
            match self.resolve(file, bp.request.position) {
                Resolution::Verified { generated, actual } => {
                    debug!(id, at = %generated, "breakpoint verified");
                    bp.verify(generated, actual);
                }
                Resolution::Rejected(reason) => {
                    debug!(id, %reason, "breakpoint rejected");
                    bp.reject(reason);
                }
                Resolution::Pending => bp.mark_pending(),
            }
            if bp.state != before && bp.state != BreakpointState::Pending {
                changed.push(id);
            }
        }
        changed
    }

    /// Resolve every unresolved breakpoint in the session.
    pub fn resolve_all(&self, registry: &mut BreakpointRegistry) -> Vec<BreakpointId> {
        let mut changed = Vec::new();
        for (file, _) in registry.unresolved_files() {
            changed.extend(self.resolve_unresolved(registry, &file));
        }
        changed
    }

    /// Snapshot what a newly loaded script could resolve.
    ///
    /// Returns `None` when there is nothing to do: source maps are off, the
    /// session is not launched, or the script was already handled.
    pub fn prepare_script_load(
        &mut self,
        path: &Path,
        registry: &BreakpointRegistry,
    ) -> Option<ScriptLoadJob> {
        let mode = self.mode.as_ref()?;
        if !mode.source_maps {
            return None;
        }

        let generated = SourceFileIdentity::new(path);
        let first_load = self.loaded_scripts.insert(generated.clone());

        let pending: Vec<PendingBreakpoint> = registry
            .unresolved_files()
            .into_iter()
            .flat_map(|(file, generation)| {
                registry
                    .breakpoints_in(&file)
                    .iter()
                    .filter(|bp| bp.is_unresolved())
                    .map(move |bp| PendingBreakpoint {
                        id: bp.id,
                        source: file.clone(),
                        generation,
                        position: bp.request.position,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        if !first_load && (pending.is_empty() || self.cache.get(&generated).is_some()) {
            debug!(script = %generated, "ignoring repeated script load");
            return None;
        }

        Some(ScriptLoadJob {
            generated,
            pending,
            cache: Arc::clone(&self.cache),
            locator: self.locator.clone(),
            hints: mode.hints.clone(),
        })
    }

    /// Install a finished job's results; returns the ids that moved state.
    pub fn apply_script_load(
        &mut self,
        outcome: ScriptLoadOutcome,
        registry: &mut BreakpointRegistry,
    ) -> Vec<BreakpointId> {
        let mut changed = Vec::new();

        for translation in outcome.translations {
            if registry.generation(&translation.source) != Some(translation.generation) {
                debug!(
                    id = translation.breakpoint,
                    file = %translation.source,
                    generation = %translation.generation,
                    "discarding stale translation"
                );
                continue;
            }
            let Some(bp) = registry.get_mut(translation.breakpoint) else { continue };
            if !bp.is_unresolved() {
                continue;
            }
            match translation.mapped {
                Some(mapped) => {
                    debug!(id = bp.id, at = %mapped.generated, "breakpoint verified after script load");
                    bp.verify(mapped.generated, mapped.original.position);
                }
                None => bp.reject(format!(
                    "no generated code at or after line {}",
                    bp.request.position.line
                )),
            }
            changed.push(translation.breakpoint);
        }

        // Files replaced while the job ran, or set after its snapshot.
        if let Some(mapper) = &outcome.mapper {
            for (file, _) in registry.unresolved_files() {
                if mapper.has_source(&file) {
                    changed.extend(self.resolve_unresolved(registry, &file));
                }
            }
        }

        // Breakpoints set directly in the loaded script bind as-is.
        if !registry.unresolved_in(&outcome.generated).is_empty()
            && self.cache.find_by_source(&outcome.generated).is_empty()
        {
            for id in registry.unresolved_in(&outcome.generated) {
                if let Some(bp) = registry.get_mut(id) {
                    let at = Location {
                        file: outcome.generated.clone(),
                        position: bp.request.position,
                    };
                    bp.verify(at, bp.request.position);
                    changed.push(id);
                }
            }
        }

        changed
    }

    /// Give up on every unresolved breakpoint.
    pub fn reject_unresolved(
        &self,
        registry: &mut BreakpointRegistry,
        reason: &str,
    ) -> Vec<BreakpointId> {
        let ids: Vec<BreakpointId> = registry
            .unresolved_files()
            .into_iter()
            .flat_map(|(file, _)| registry.unresolved_in(&file))
            .collect();
        for id in &ids {
            if let Some(bp) = registry.get_mut(*id) {
                bp.reject(reason);
            }
        }
        ids
    }
}

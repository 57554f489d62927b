//! Session-wide cache of loaded position mappers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::mapper::PositionMapper;
use crate::error::LocateError;
use crate::identity::SourceFileIdentity;

type LoadGuard = Arc<Mutex<()>>;

/// At most one mapper per generated file.
///
/// Loads are serialized per file by a guard so concurrent requests for the
/// same generated file wait for the first load instead of repeating it,
/// while other files load in parallel. Finished mappers are published to a
/// separate table that lookups read without touching any load guard, so a
/// slow map never stalls a lookup. Failed loads publish nothing and a later
/// event can retry.
#[derive(Debug, Default)]
pub struct MapperCache {
    guards: Mutex<HashMap<SourceFileIdentity, LoadGuard>>,
    loaded: RwLock<HashMap<SourceFileIdentity, Arc<PositionMapper>>>,
    loads: AtomicUsize,
}

impl MapperCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self, generated: &SourceFileIdentity) -> LoadGuard {
        self.guards
            .lock()
            .entry(generated.clone())
            .or_default()
            .clone()
    }

    /// The cached mapper for `generated`, if one has finished loading.
    pub fn get(&self, generated: &SourceFileIdentity) -> Option<Arc<PositionMapper>> {
        self.loaded.read().get(generated).cloned()
    }

    /// Return the cached mapper or run `load` once under the file's guard.
    pub fn get_or_load<F>(
        &self,
        generated: &SourceFileIdentity,
        load: F,
    ) -> Result<Arc<PositionMapper>, LocateError>
    where
        F: FnOnce() -> Result<PositionMapper, LocateError>,
    {
        if let Some(mapper) = self.get(generated) {
            return Ok(mapper);
        }
        let guard = self.guard(generated);
        let _loading = guard.lock();
        if let Some(mapper) = self.get(generated) {
            return Ok(mapper);
        }
        self.loads.fetch_add(1, Ordering::Relaxed);
        let mapper = Arc::new(load()?);
        self.loaded
            .write()
            .insert(generated.clone(), Arc::clone(&mapper));
        Ok(mapper)
    }

    /// Every cached mapper that lists `source` among its original sources.
    pub fn find_by_source(&self, source: &SourceFileIdentity) -> Vec<Arc<PositionMapper>> {
        let mut found: Vec<Arc<PositionMapper>> = self
            .loaded
            .read()
            .values()
            .filter(|mapper| mapper.has_source(source))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.generated_file().cmp(b.generated_file()));
        found
    }

    /// Number of loaded mappers.
    pub fn len(&self) -> usize {
        self.loaded.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times a loader actually ran (successful or not).
    pub fn load_attempts(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Drop every mapper; used at session teardown.
    pub fn clear(&self) {
        self.loaded.write().clear();
        self.guards.lock().clear();
    }
}

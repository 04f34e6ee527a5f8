use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::domain::RequirementId;
use super::views::RequirementTree;

/// Read-through cache of derived requirement trees keyed by requirement id.
///
/// Every invalidation bumps a per-id generation. A tree loaded under an older generation
/// is returned to its caller but never written back, so a slow reader cannot overwrite
/// the tree a later mutation rebuilt.
#[derive(Debug, Default)]
pub struct RequirementCache {
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<RequirementId, Arc<RequirementTree>>,
    generations: HashMap<RequirementId, u64>,
}

impl CacheState {
    fn generation(&self, id: &RequirementId) -> u64 {
        self.generations.get(id).copied().unwrap_or_default()
    }
}

impl RequirementCache {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &RequirementId) -> Option<Arc<RequirementTree>> {
        self.lock().entries.get(id).cloned()
    }

    /// Serve the cached tree or populate it from `load`.
    pub fn get_or_load<E>(
        &self,
        id: &RequirementId,
        load: impl FnOnce() -> Result<Option<RequirementTree>, E>,
    ) -> Result<Option<Arc<RequirementTree>>, E> {
        let generation = {
            let state = self.lock();
            if let Some(tree) = state.entries.get(id) {
                return Ok(Some(tree.clone()));
            }
            state.generation(id)
        };
        Ok(load()?.map(|tree| self.store(tree, generation)))
    }

    /// Write `tree` back unless the entry was invalidated after `generation` was observed.
    pub fn store(&self, tree: RequirementTree, generation: u64) -> Arc<RequirementTree> {
        let tree = Arc::new(tree);
        let mut state = self.lock();
        if state.generation(&tree.requirement.id) == generation {
            state
                .entries
                .insert(tree.requirement.id.clone(), tree.clone());
        }
        tree
    }

    /// Drop the cached tree and return the new generation for a follow-up `store`.
    pub fn invalidate(&self, id: &RequirementId) -> u64 {
        let mut state = self.lock();
        state.entries.remove(id);
        let generation = state.generations.entry(id.clone()).or_default();
        *generation += 1;
        *generation
    }
}

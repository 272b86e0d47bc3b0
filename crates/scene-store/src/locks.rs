//! Per-scene mutual exclusion

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = HashMap<Uuid, Arc<Mutex<()>>>;

/// One async mutex per scene id, present only while someone holds or awaits it
#[derive(Default)]
pub(crate) struct SceneLocks {
    inner: StdMutex<LockMap>,
}

/// Exclusive access to one scene; releases and prunes its entry on drop
pub(crate) struct SceneGuard<'a> {
    locks: &'a SceneLocks,
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SceneLocks {
    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to `id`
    pub(crate) async fn lock(&self, id: Uuid) -> SceneGuard<'_> {
        let lock = self.map().entry(id).or_default().clone();
        // Built before waiting so a cancelled wait still prunes the entry
        let mut guard = SceneGuard {
            locks: self,
            id,
            guard: None,
        };
        guard.guard = Some(lock.lock_owned().await);
        guard
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map().len()
    }
}

impl Drop for SceneGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Waiters clone the Arc under the map lock, so a count of one means
        // nobody else wants this id
        let mut map = self.locks.map();
        if map
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.id);
        }
    }
}

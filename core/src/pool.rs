//! Resource pool: a fixed-size, key-indexed pool of [`Resource`]s.
//! Acquisition blocks until a slot for that key becomes available, so a
//! worker's own acquisitions inside one region never contend with another
//! worker's (each worker owns a disjoint region, hence disjoint keys).

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};

use tracing::{debug, warn};

use macros::acquire_lock;

use crate::block::Block;
use crate::resource::{Resource, ResourceKey};

struct Inventory {
    available: Vec<Resource>,
    rented: usize,
    max: usize,
}

/// A bounded pool of resources, one inventory per `(depth, bx, by)` key.
pub struct ResourcePool {
    inner: Mutex<HashMap<ResourceKey, Inventory>>,
    condvar: Condvar,
    /// Upper bound on total rented-plus-available resources per key,
    /// mirroring a min/max inventory protocol: never allocate unbounded
    /// resources for one position, but don't block while under the max.
    max_per_key: usize,
}

impl ResourcePool {
    #[must_use]
    pub fn new(max_per_key: usize) -> Self {
        Self { inner: Mutex::new(HashMap::new()), condvar: Condvar::new(), max_per_key }
    }

    /// Blocks until a resource for `key` is available, either from the
    /// free list or freshly built via `make`.
    pub fn acquire(&self, key: ResourceKey, make: impl FnOnce() -> Block) -> Resource {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        loop {
            let inventory = guard.entry(key).or_insert_with(|| Inventory { available: Vec::new(), rented: 0, max: self.max_per_key });
            if let Some(resource) = inventory.available.pop() {
                inventory.rented += 1;
                return resource;
            }
            if inventory.rented < inventory.max {
                inventory.rented += 1;
                debug!(?key, "resource pool: allocating fresh resource");
                return Resource::new(key, make());
            }
            warn!(?key, "resource pool: blocking for a free slot");
            guard = self.condvar.wait(guard).unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Returns a resource to the pool and wakes one waiter.
    pub fn release(&self, resource: Resource) {
        acquire_lock!(self.inner, guard => {
            if let Some(inventory) = guard.get_mut(&resource.key) {
                inventory.rented -= 1;
                inventory.available.push(resource);
            }
        });
        self.condvar.notify_one();
    }
}

/// The low-memory recovery ladder: each action is attempted in order until
/// one frees enough memory, or `NothingMore` surfaces
/// [`crate::error::BackdropError::OutOfMemory`] upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LowMemoryAction {
    OpenForWriting,
    Compression,
    ShareBlists1,
    WriteToDisk,
    ShareBlists2,
    NothingMore,
}

impl LowMemoryAction {
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::OpenForWriting => Self::Compression,
            Self::Compression => Self::ShareBlists1,
            Self::ShareBlists1 => Self::WriteToDisk,
            Self::WriteToDisk => Self::ShareBlists2,
            Self::ShareBlists2 | Self::NothingMore => Self::NothingMore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorArray, ColorInfo, ColorValue};
    use pretty_assertions::assert_eq;

    fn fresh_block() -> Block {
        Block::new_isolated(4, 4, 1, false, &ColorArray::from_vec(vec![ColorValue::ZERO]), ColorValue::ZERO, ColorInfo::default(), false)
    }

    #[test]
    fn acquire_builds_fresh_then_reuses_released() {
        let pool = ResourcePool::new(2);
        let key = ResourceKey { depth: 0, bx: 0, by: 0 };
        let a = pool.acquire(key, fresh_block);
        pool.release(a);
        let b = pool.acquire(key, fresh_block);
        assert_eq!(b.key, key);
    }

    #[test]
    fn low_memory_ladder_terminates_at_nothing_more() {
        let mut action = LowMemoryAction::OpenForWriting;
        for _ in 0..10 {
            action = action.next();
        }
        assert_eq!(action, LowMemoryAction::NothingMore);
    }
}

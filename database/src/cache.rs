use indexmap::IndexMap;
use lds_utils::mem_size::MemSizeEstimator;
use parking_lot::RwLock;
use rand::Rng;
use std::{collections::hash_map::RandomState, hash::BuildHasher, sync::Arc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
    /// No caching
    Empty,
    /// Bounds the number of cached items
    Count(usize),
    /// Bounds the estimated size in bytes of all cached items
    Tracked { max_size: usize },
}

struct Inner<TKey, TData, S = RandomState>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync + MemSizeEstimator,
{
    // We use IndexMap and not HashMap because it makes it cheaper to remove a random element when the cache is full.
    map: IndexMap<TKey, TData, S>,
    tracked_size: usize,
}

impl<TKey, TData, S> Inner<TKey, TData, S>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync + MemSizeEstimator,
    S: BuildHasher + Default,
{
    fn new(prealloc_size: usize) -> Self {
        Self { map: IndexMap::with_capacity_and_hasher(prealloc_size, S::default()), tracked_size: 0 }
    }

    fn untrack(&mut self, policy: CachePolicy, data: &TData) {
        if let CachePolicy::Tracked { .. } = policy {
            self.tracked_size = self.tracked_size.saturating_sub(data.estimate_mem_bytes());
        }
    }
}

#[derive(Clone)]
pub struct Cache<TKey, TData, S = RandomState>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync + MemSizeEstimator,
{
    inner: Arc<RwLock<Inner<TKey, TData, S>>>,
    policy: CachePolicy,
}

impl<TKey, TData, S> Cache<TKey, TData, S>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync + MemSizeEstimator,
    S: BuildHasher + Default,
{
    pub fn new(policy: CachePolicy) -> Self {
        let prealloc_size = match policy {
            CachePolicy::Empty => 0,
            // Use `size + 1` for not triggering a realloc if new element exactly overflows capacity
            CachePolicy::Count(max_size) => max_size + 1,
            CachePolicy::Tracked { .. } => 0,
        };
        Self { inner: Arc::new(RwLock::new(Inner::new(prealloc_size))), policy }
    }

    pub fn get(&self, key: &TKey) -> Option<TData> {
        self.inner.read().map.get(key).cloned()
    }

    pub fn contains_key(&self, key: &TKey) -> bool {
        self.inner.read().map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_impl(&self, inner: &mut Inner<TKey, TData, S>, key: TKey, data: TData) {
        match self.policy {
            CachePolicy::Empty => {}
            CachePolicy::Count(max_size) => {
                if inner.map.len() == max_size && !inner.map.contains_key(&key) {
                    inner.map.swap_remove_index(rand::thread_rng().gen_range(0..max_size));
                }
                inner.map.insert(key, data);
            }
            CachePolicy::Tracked { max_size } => {
                inner.tracked_size += data.estimate_mem_bytes();
                if let Some(removed) = inner.map.insert(key.clone(), data) {
                    inner.untrack(self.policy, &removed);
                }
                // Always keep the last inserted item, even if it exceeds the budget on its own
                while inner.tracked_size > max_size && inner.map.len() > 1 {
                    let Some(keep) = inner.map.get_index_of(&key) else { break };
                    let mut index = rand::thread_rng().gen_range(0..inner.map.len() - 1);
                    if index >= keep {
                        index += 1;
                    }
                    if let Some((_, removed)) = inner.map.swap_remove_index(index) {
                        inner.untrack(self.policy, &removed);
                    }
                }
            }
        }
    }

    pub fn insert(&self, key: TKey, data: TData) {
        if self.policy == CachePolicy::Empty {
            return;
        }
        let mut write_guard = self.inner.write();
        self.insert_impl(&mut write_guard, key, data);
    }

    pub fn remove(&self, key: &TKey) -> Option<TData> {
        if self.policy == CachePolicy::Empty {
            return None;
        }
        let mut write_guard = self.inner.write();
        let removed = write_guard.map.swap_remove(key)?;
        write_guard.untrack(self.policy, &removed);
        Some(removed)
    }
}

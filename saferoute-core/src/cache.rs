//! Bounded cache of built route graphs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use log::{debug, info};

use crate::model::{GraphKey, RouteGraph};

struct CacheEntry {
    graph: Arc<RouteGraph>,
    last_used: u64,
}

/// LRU cache keyed by (hour, alpha, dataset version, risk version).
///
/// Version bumps alone never purge entries built for older versions, so
/// dataset reloads and risk-config updates must call [`GraphCache::clear`]
/// synchronously. The TTL check is a backstop against anything that slips
/// through, not the primary invalidation mechanism.
pub struct GraphCache {
    entries: HashMap<GraphKey, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    last_clear: Instant,
    clock: u64,
}

impl GraphCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
            last_clear: Instant::now(),
            clock: 0,
        }
    }

    /// Cached graph for `key`, refreshing its recency.
    pub fn get(&mut self, key: &GraphKey) -> Option<Arc<RouteGraph>> {
        self.clock += 1;
        let now = self.clock;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = now;
            Arc::clone(&entry.graph)
        })
    }

    /// Inserts a graph, evicting the least-recently-used entry when full.
    pub fn insert(&mut self, key: GraphKey, graph: Arc<RouteGraph>) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| *key)
            {
                debug!("evicting cached graph {victim:?}");
                self.entries.remove(&victim);
            }
        }
        self.clock += 1;
        self.entries.insert(
            key,
            CacheEntry {
                graph,
                last_used: self.clock,
            },
        );
    }

    /// Drops every cached graph and restarts the TTL clock.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_clear = Instant::now();
    }

    /// TTL backstop: clears everything once the TTL has elapsed since the
    /// last clear. Returns whether a clear happened so the caller can drop
    /// derived memos along with it.
    pub fn expire_if_stale(&mut self) -> bool {
        if self.last_clear.elapsed() > self.ttl {
            info!(
                "graph cache TTL elapsed, clearing {} entries",
                self.entries.len()
            );
            self.clear();
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

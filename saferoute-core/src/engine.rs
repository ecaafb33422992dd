//! The routing-engine context: configuration, shared state and the query
//! entry points.
//!
//! All mutable state lives in one [`RoutingEngine`] value passed around by
//! reference; there is no process-wide state. Mutations (dataset reload,
//! risk-config update, cache maintenance) are serialized through a
//! single-writer lock discipline, while queries only need a consistent
//! (dataset version, risk version) snapshot captured at entry: graphs built
//! for a version tuple are immutable afterwards.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;

use geo::Point;
use hashbrown::HashMap;
use log::{error, info};
use serde::Deserialize;

use crate::cache::GraphCache;
use crate::error::{Error, RoutingError};
use crate::model::{GraphKey, RouteGraph, SegmentRecord, SegmentStore, build_route_graph};
use crate::risk::RiskState;
use crate::routing::{LinearLocator, NodeLocator, RouteResult, assemble_route, astar_path};
use crate::{
    DEFAULT_SPEED_KMPH, DatasetVersion, GRAPH_CACHE_CAPACITY, GRAPH_CACHE_TTL, MAX_SNAP_DISTANCE,
    RISK_MEMO_CAPACITY, RiskVersion,
};

/// Engine tuning knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Assumed travel speed in km/h.
    pub speed_kmph: f64,
    /// Snap distance in degrees beyond which lookups log an advisory.
    pub snap_tolerance_deg: f64,
    /// Maximum number of cached graphs.
    pub cache_capacity: usize,
    /// Backstop TTL for the graph cache and risk memo, in seconds.
    pub cache_ttl_secs: u64,
    /// Maximum number of segments with memoized risk scores.
    pub memo_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            speed_kmph: DEFAULT_SPEED_KMPH,
            snap_tolerance_deg: MAX_SNAP_DISTANCE,
            cache_capacity: GRAPH_CACHE_CAPACITY,
            cache_ttl_secs: GRAPH_CACHE_TTL.as_secs(),
            memo_capacity: RISK_MEMO_CAPACITY,
        }
    }
}

/// Route-type presets mapping onto the blend factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoutePlan {
    /// Minimize travel time only (alpha 1.0).
    Shortest,
    /// Minimize risk only (alpha 0.0).
    Safest,
    /// Caller-supplied blend.
    Balanced(f64),
}

impl RoutePlan {
    pub fn alpha(self) -> f64 {
        match self {
            RoutePlan::Shortest => 1.0,
            RoutePlan::Safest => 0.0,
            RoutePlan::Balanced(alpha) => alpha,
        }
    }
}

// Writers replace whole values, so the state behind a poisoned lock is still
// consistent and safe to reuse.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns all mutable routing state and serializes its writers.
///
/// Lock order is cache → store → risk wherever more than one is held.
pub struct RoutingEngine {
    config: EngineConfig,
    cache: Mutex<GraphCache>,
    store: RwLock<SegmentStore>,
    risk: RwLock<RiskState>,
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RoutingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            cache: Mutex::new(GraphCache::new(
                config.cache_capacity,
                Duration::from_secs(config.cache_ttl_secs),
            )),
            store: RwLock::new(SegmentStore::new()),
            risk: RwLock::new(RiskState::new(config.memo_capacity)),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Atomically replaces the segment set and synchronously invalidates all
    /// cached graphs and memoized scores before the next lookup can run.
    ///
    /// # Errors
    ///
    /// On an invalid record nothing changes: the previous dataset, version
    /// and caches stay live.
    pub fn reload_dataset(&self, records: Vec<SegmentRecord>) -> Result<usize, Error> {
        let mut cache = mutex_lock(&self.cache);
        let mut store = write_lock(&self.store);
        let count = store.replace(records)?;
        cache.clear();
        // Scores are keyed by segment id; a reload may reuse ids with new
        // attributes, so the memo has to go too.
        write_lock(&self.risk).memo.clear();
        Ok(count)
    }

    /// Merges `updates` into the risk configuration (last write wins per
    /// key), bumps its version and synchronously invalidates cached graphs
    /// and memoized scores.
    ///
    /// # Errors
    ///
    /// Rejects non-finite values without touching config or caches.
    pub fn update_risk_config(&self, updates: &HashMap<String, f64>) -> Result<RiskVersion, Error> {
        let mut cache = mutex_lock(&self.cache);
        let mut risk = write_lock(&self.risk);
        let version = risk.config.update(updates)?;
        risk.memo.clear();
        cache.clear();
        info!("risk config updated to version {version}");
        Ok(version)
    }

    /// The graph for (hour, alpha) against the current dataset and risk
    /// config: cached when available, built and inserted otherwise.
    ///
    /// Also runs the TTL backstop. Building happens under the cache lock, so
    /// concurrent queries for the same key never build twice.
    pub fn graph(&self, hour: u8, alpha: f64) -> Arc<RouteGraph> {
        let mut cache = mutex_lock(&self.cache);
        if cache.expire_if_stale() {
            write_lock(&self.risk).memo.clear();
        }

        let store = read_lock(&self.store);
        let key = GraphKey::new(
            hour,
            alpha,
            store.version(),
            read_lock(&self.risk).config.version(),
        );
        if let Some(graph) = cache.get(&key) {
            return graph;
        }

        let mut risk = write_lock(&self.risk);
        let graph = Arc::new(build_route_graph(
            &store,
            &mut risk,
            hour,
            alpha,
            self.config.speed_kmph,
        ));
        cache.insert(key, Arc::clone(&graph));
        graph
    }

    /// Computes a route between `origin` and `destination` (x = lon,
    /// y = lat).
    ///
    /// `hour` is the local hour of day (0–23); `alpha` trades travel time
    /// (1.0) against risk (0.0). Internal errors and panics are caught,
    /// logged and reported as [`RoutingError::Failure`] rather than
    /// unwinding into the calling worker.
    pub fn compute_route(
        &self,
        origin: Point<f64>,
        destination: Point<f64>,
        hour: u8,
        alpha: f64,
    ) -> Result<RouteResult, RoutingError> {
        validate_query(origin, destination, hour, alpha)?;

        match panic::catch_unwind(AssertUnwindSafe(|| {
            self.route_inner(origin, destination, hour, alpha)
        })) {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "route computation panicked (origin {origin:?}, destination {destination:?}, \
                     hour {hour}, alpha {alpha})"
                );
                Err(RoutingError::Failure)
            }
        }
    }

    /// Route query with a preset strategy.
    pub fn plan(
        &self,
        origin: Point<f64>,
        destination: Point<f64>,
        hour: u8,
        plan: RoutePlan,
    ) -> Result<RouteResult, RoutingError> {
        self.compute_route(origin, destination, hour, plan.alpha())
    }

    fn route_inner(
        &self,
        origin: Point<f64>,
        destination: Point<f64>,
        hour: u8,
        alpha: f64,
    ) -> Result<RouteResult, RoutingError> {
        let graph = self.graph(hour, alpha);
        let locator = LinearLocator::new(self.config.snap_tolerance_deg);

        let origin_vertex = locator
            .nearest(&graph, origin)
            .map_err(|_| RoutingError::OriginTooFar)?;
        let destination_vertex = locator
            .nearest(&graph, destination)
            .map_err(|_| RoutingError::DestinationTooFar)?;

        if origin_vertex == destination_vertex {
            // Trivial route, no search needed
            return assemble_route(&graph, &[origin_vertex]).map_err(internal_failure);
        }

        let path = astar_path(&graph, origin_vertex, destination_vertex).map_err(|e| match e {
            Error::NoPath => RoutingError::NoRoute,
            other => internal_failure(other),
        })?;

        assemble_route(&graph, &path).map_err(internal_failure)
    }

    pub fn dataset_version(&self) -> DatasetVersion {
        read_lock(&self.store).version()
    }

    pub fn risk_version(&self) -> RiskVersion {
        read_lock(&self.risk).config.version()
    }

    pub fn segment_count(&self) -> usize {
        read_lock(&self.store).len()
    }

    pub fn cached_graph_count(&self) -> usize {
        mutex_lock(&self.cache).len()
    }
}

fn internal_failure(error: Error) -> RoutingError {
    error!("routing failure: {error}");
    RoutingError::Failure
}

fn valid_point(point: Point<f64>) -> bool {
    point.y().is_finite()
        && point.x().is_finite()
        && (-90.0..=90.0).contains(&point.y())
        && (-180.0..=180.0).contains(&point.x())
}

fn validate_query(
    origin: Point<f64>,
    destination: Point<f64>,
    hour: u8,
    alpha: f64,
) -> Result<(), RoutingError> {
    if !valid_point(origin) {
        return Err(RoutingError::InvalidQuery(
            "origin coordinate out of range".to_string(),
        ));
    }
    if !valid_point(destination) {
        return Err(RoutingError::InvalidQuery(
            "destination coordinate out of range".to_string(),
        ));
    }
    if hour > 23 {
        return Err(RoutingError::InvalidQuery(format!(
            "hour {hour} outside 0-23"
        )));
    }
    if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
        return Err(RoutingError::InvalidQuery(format!(
            "alpha {alpha} outside 0-1"
        )));
    }
    Ok(())
}

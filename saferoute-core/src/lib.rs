//! Core engine for risk-weighted route planning.
//!
//! Turns a set of road segments into weighted directed graphs, scores
//! per-segment danger for a given hour of day, caches built graphs under
//! explicit invalidation rules, and answers shortest, safest and blended
//! route queries between arbitrary coordinates.

use std::time::Duration;

use geo::Point;

pub mod cache;
pub mod engine;
pub mod error;
pub mod loading;
pub mod model;
pub mod prelude;
pub mod risk;
pub mod routing;

pub use error::{Error, RoutingError};

/// Travel speed assumed for every segment, in km/h.
pub const DEFAULT_SPEED_KMPH: f64 = 30.0;

/// Bound on the number of graphs kept in the cache.
pub const GRAPH_CACHE_CAPACITY: usize = 200;

/// Backstop TTL after which all cached graphs and memoized scores are dropped.
pub const GRAPH_CACHE_TTL: Duration = Duration::from_secs(300);

/// Snap distance in degrees beyond which nearest-vertex lookups log an
/// advisory (the lookup still succeeds with the closest vertex).
pub const MAX_SNAP_DISTANCE: f64 = 0.02;

/// Bound on the number of segments with memoized risk scores.
pub const RISK_MEMO_CAPACITY: usize = 2000;

/// Monotonic dataset generation counter.
pub type DatasetVersion = u64;

/// Monotonic risk-configuration generation counter.
pub type RiskVersion = u64;

/// Straight-line distance between two points in coordinate space.
///
/// Distances are planar throughout: segment lengths, the snap tolerance and
/// the search heuristic only ever compare these values against each other.
pub(crate) fn planar_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    (a.x() - b.x()).hypot(a.y() - b.y())
}

/// Round to two decimals, the resolution of reported minutes and risk.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((planar_distance(a, b) - 5.0).abs() < 1e-12);
        assert_eq!(planar_distance(a, a), 0.0);
    }

    #[test]
    fn round2_half_up() {
        assert_eq!(round2(0.689_655), 0.69);
        assert_eq!(round2(2.0), 2.0);
        assert_eq!(round2(1.005_000_1), 1.01);
    }
}

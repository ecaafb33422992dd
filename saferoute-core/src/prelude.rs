pub use crate::{DEFAULT_SPEED_KMPH, GRAPH_CACHE_CAPACITY, GRAPH_CACHE_TTL, MAX_SNAP_DISTANCE};

// Re-export key components
pub use crate::cache::GraphCache;
pub use crate::engine::{EngineConfig, RoutePlan, RoutingEngine};
pub use crate::error::{Error, RoutingError};
pub use crate::loading::{RiskDataset, load_dataset, load_segments};
pub use crate::model::{GraphKey, RouteGraph, Segment, SegmentRecord, SegmentStore};
pub use crate::risk::{RiskConfig, RiskState, time_multiplier};
pub use crate::routing::{
    LinearLocator, NodeLocator, RouteResult, RtreeLocator, assemble_route, astar_path,
};

// Version counters used as cache-invalidation keys
pub use crate::DatasetVersion;
pub use crate::RiskVersion;

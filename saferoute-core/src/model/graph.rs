//! Directed weighted route graph and its builder.

use geo::{LineString, Point};
use hashbrown::HashMap;
use log::info;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::model::{Segment, SegmentStore};
use crate::risk::RiskState;
use crate::{DatasetVersion, RiskVersion, round2};

/// Edge payload: one traversable road segment.
#[derive(Debug, Clone)]
pub struct RouteEdge {
    /// Id of the originating segment.
    pub segment_id: String,
    /// Traversal time in minutes.
    pub eta: f64,
    /// Danger score at the hour the graph was built for.
    pub risk: f64,
    /// Blend of eta and risk used as search cost.
    pub weight: f64,
    /// Endpoint pair, for rendering.
    pub geometry: LineString<f64>,
}

/// Cache identity of a built graph.
///
/// Alpha is keyed by bit pattern: the same f64 always maps to the same key,
/// and near-duplicate blends are deliberately distinct entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphKey {
    pub hour: u8,
    alpha_bits: u64,
    pub dataset_version: DatasetVersion,
    pub risk_version: RiskVersion,
}

impl GraphKey {
    pub fn new(
        hour: u8,
        alpha: f64,
        dataset_version: DatasetVersion,
        risk_version: RiskVersion,
    ) -> Self {
        Self {
            hour,
            alpha_bits: alpha.to_bits(),
            dataset_version,
            risk_version,
        }
    }

    pub fn alpha(&self) -> f64 {
        f64::from_bits(self.alpha_bits)
    }
}

/// Vertex identity is the exact coordinate bit pattern: endpoints merge into
/// one vertex only when bit-identical, never by proximity.
fn vertex_key(point: Point<f64>) -> (u64, u64) {
    (point.x().to_bits(), point.y().to_bits())
}

/// Directed graph over segment endpoints.
///
/// Every segment contributes exactly one start→end edge; reverse travel is
/// never implied. Built graphs are immutable and shared by reference.
#[derive(Debug)]
pub struct RouteGraph {
    graph: DiGraph<Point<f64>, RouteEdge>,
    vertex_index: HashMap<(u64, u64), NodeIndex>,
    key: GraphKey,
}

impl RouteGraph {
    fn with_capacity(key: GraphKey, segment_count: usize) -> Self {
        Self {
            graph: DiGraph::with_capacity(segment_count * 2, segment_count),
            vertex_index: HashMap::with_capacity(segment_count * 2),
            key,
        }
    }

    fn vertex_or_insert(&mut self, point: Point<f64>) -> NodeIndex {
        match self.vertex_index.entry(vertex_key(point)) {
            hashbrown::hash_map::Entry::Occupied(entry) => *entry.get(),
            hashbrown::hash_map::Entry::Vacant(entry) => *entry.insert(self.graph.add_node(point)),
        }
    }

    /// The (hour, alpha, dataset version, risk version) tuple this graph was
    /// built for.
    pub fn key(&self) -> GraphKey {
        self.key
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Coordinates of a vertex of this graph.
    pub fn vertex(&self, index: NodeIndex) -> Point<f64> {
        self.graph[index]
    }

    /// All vertices with their indices.
    pub fn vertices(&self) -> impl Iterator<Item = (NodeIndex, Point<f64>)> + '_ {
        self.graph.node_indices().map(|i| (i, self.graph[i]))
    }

    /// Outgoing edges of a vertex.
    pub fn edges(&self, from: NodeIndex) -> impl Iterator<Item = (NodeIndex, &RouteEdge)> {
        self.graph.edges(from).map(|e| (e.target(), e.weight()))
    }

    /// Minimum-weight edge from `a` to `b`, if any.
    ///
    /// Two segments may share an ordered endpoint pair; the search relaxes
    /// over all parallel edges, so readers take the cheapest one.
    pub fn best_edge(&self, a: NodeIndex, b: NodeIndex) -> Option<&RouteEdge> {
        self.graph
            .edges(a)
            .filter(|e| e.target() == b)
            .map(|e| e.weight())
            .min_by(|x, y| x.weight.total_cmp(&y.weight))
    }

    /// Index of the vertex at exactly `point`, if present.
    pub fn find_vertex(&self, point: Point<f64>) -> Option<NodeIndex> {
        self.vertex_index.get(&vertex_key(point)).copied()
    }
}

/// Materializes the weighted graph for (hour, alpha) from the current
/// segment set and risk configuration.
///
/// Edge cost is `alpha * eta + (1 - alpha) * risk`, where eta assumes a
/// uniform `speed_kmph` over the segment's planar length. The graph is
/// asymmetric by construction: a segment never implies the reverse edge.
pub fn build_route_graph(
    store: &SegmentStore,
    risk: &mut RiskState,
    hour: u8,
    alpha: f64,
    speed_kmph: f64,
) -> RouteGraph {
    let key = GraphKey::new(hour, alpha, store.version(), risk.config.version());

    // Stable ordering keeps vertex numbering reproducible across builds
    let mut segments: Vec<&Segment> = store.all().collect();
    segments.sort_unstable_by(|a, b| a.id.cmp(&b.id));
    let risks = risk.score_all(&segments, hour);

    let mut graph = RouteGraph::with_capacity(key, segments.len());
    for (segment, risk_score) in segments.iter().zip(risks) {
        let Some(length_km) = store.length(&segment.id) else {
            continue;
        };
        let eta = round2(length_km / speed_kmph * 60.0);
        let weight = alpha * eta + (1.0 - alpha) * risk_score;

        let start = graph.vertex_or_insert(segment.start);
        let end = graph.vertex_or_insert(segment.end);
        graph.graph.add_edge(
            start,
            end,
            RouteEdge {
                segment_id: segment.id.clone(),
                eta,
                risk: risk_score,
                weight,
                geometry: LineString::new(vec![segment.start.into(), segment.end.into()]),
            },
        );
    }

    info!(
        "built graph for hour {hour}, alpha {alpha}: {} vertices, {} edges",
        graph.vertex_count(),
        graph.edge_count()
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SegmentRecord;

    fn record(
        id: &str,
        start: [f64; 2],
        end: [f64; 2],
        crime: f64,
        lighting: f64,
        crowd: f64,
    ) -> SegmentRecord {
        SegmentRecord {
            id: id.to_string(),
            start,
            end,
            crime,
            lighting,
            crowd,
        }
    }

    fn store(records: Vec<SegmentRecord>) -> SegmentStore {
        let mut store = SegmentStore::new();
        store.replace(records).unwrap();
        store
    }

    #[test]
    fn one_directed_edge_per_segment() {
        let store = store(vec![record(
            "ab",
            [0.0, 0.0],
            [0.0, 1.0],
            0.0,
            1.0,
            1.0,
        )]);
        let mut risk = RiskState::default();
        let graph = build_route_graph(&store, &mut risk, 10, 0.5, 30.0);

        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.edge_count(), 1);

        let a = graph.find_vertex(Point::new(0.0, 0.0)).unwrap();
        let b = graph.find_vertex(Point::new(1.0, 0.0)).unwrap();
        assert!(graph.best_edge(a, b).is_some());
        // No implicit reverse edge
        assert!(graph.best_edge(b, a).is_none());
    }

    #[test]
    fn shared_endpoints_merge_exactly_and_only_exactly() {
        let store = store(vec![
            record("ab", [0.0, 0.0], [0.0, 1.0], 0.5, 0.5, 0.5),
            record("bc", [0.0, 1.0], [0.0, 2.0], 0.5, 0.5, 0.5),
            // End is a hair off `[0.0, 1.0]`: must stay a distinct vertex
            record("ab2", [0.0, 0.0], [0.000_000_1, 1.0], 0.5, 0.5, 0.5),
        ]);
        let mut risk = RiskState::default();
        let graph = build_route_graph(&store, &mut risk, 10, 0.5, 30.0);

        // a, b, c, plus the near-duplicate of b
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn edge_attributes_follow_the_blend() {
        let store = store(vec![record(
            "risky",
            [0.0, 0.0],
            [0.0, 1.0],
            1.0,
            0.0,
            0.0,
        )]);
        let mut risk = RiskState::default();
        let graph = build_route_graph(&store, &mut risk, 10, 0.25, 30.0);

        let a = graph.find_vertex(Point::new(0.0, 0.0)).unwrap();
        let b = graph.find_vertex(Point::new(1.0, 0.0)).unwrap();
        let edge = graph.best_edge(a, b).unwrap();

        assert_eq!(edge.segment_id, "risky");
        assert_eq!(edge.eta, 2.0);
        assert_eq!(edge.risk, 0.9);
        assert!((edge.weight - (0.25 * 2.0 + 0.75 * 0.9)).abs() < 1e-12);
        assert_eq!(edge.geometry.0.len(), 2);

        assert_eq!(graph.key().hour, 10);
        assert_eq!(graph.key().alpha(), 0.25);
        assert_eq!(graph.key().dataset_version, 1);
    }

    #[test]
    fn graph_key_distinguishes_alpha_bit_patterns() {
        let k1 = GraphKey::new(10, 0.5, 1, 1);
        let k2 = GraphKey::new(10, 0.5, 1, 1);
        let k3 = GraphKey::new(10, 0.500_000_001, 1, 1);
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(k1.alpha(), 0.5);
    }
}

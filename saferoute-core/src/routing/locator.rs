//! Snapping query coordinates to graph vertices.

use geo::Point;
use log::warn;
use petgraph::graph::NodeIndex;
use rstar::{RTree, primitives::GeomWithData};

use crate::model::RouteGraph;
use crate::{Error, planar_distance};

/// Maps an arbitrary query coordinate to the nearest graph vertex.
///
/// Implementations fail only on an empty graph; a far-away point still
/// resolves to the closest vertex, with a logged advisory.
pub trait NodeLocator {
    fn nearest(&self, graph: &RouteGraph, point: Point<f64>) -> Result<NodeIndex, Error>;
}

fn advise_if_far(point: Point<f64>, vertex: Point<f64>, tolerance: f64) {
    let distance = planar_distance(point, vertex);
    if distance > tolerance {
        warn!(
            "snapping point ({:.5}, {:.5}) to a vertex {distance:.5} deg away (tolerance {tolerance} deg)",
            point.y(),
            point.x()
        );
    }
}

/// Linear scan over all vertices.
///
/// Fine at the target scale; swap in [`RtreeLocator`] behind the same trait
/// when the vertex count grows.
pub struct LinearLocator {
    snap_tolerance: f64,
}

impl LinearLocator {
    pub fn new(snap_tolerance: f64) -> Self {
        Self { snap_tolerance }
    }
}

impl NodeLocator for LinearLocator {
    fn nearest(&self, graph: &RouteGraph, point: Point<f64>) -> Result<NodeIndex, Error> {
        let (index, vertex) = graph
            .vertices()
            .min_by(|(_, a), (_, b)| {
                planar_distance(*a, point).total_cmp(&planar_distance(*b, point))
            })
            .ok_or(Error::EmptyGraph)?;
        advise_if_far(point, vertex, self.snap_tolerance);
        Ok(index)
    }
}

/// R-tree nearest-neighbour lookup over a graph's vertices.
pub struct RtreeLocator {
    tree: RTree<GeomWithData<[f64; 2], NodeIndex>>,
    snap_tolerance: f64,
}

impl RtreeLocator {
    /// Bulk-loads the index from `graph`'s vertices. The index is tied to
    /// the graph it was built from.
    pub fn new(graph: &RouteGraph, snap_tolerance: f64) -> Self {
        let points: Vec<GeomWithData<[f64; 2], NodeIndex>> = graph
            .vertices()
            .map(|(index, point)| GeomWithData::new([point.x(), point.y()], index))
            .collect();
        Self {
            tree: RTree::bulk_load(points),
            snap_tolerance,
        }
    }
}

impl NodeLocator for RtreeLocator {
    fn nearest(&self, graph: &RouteGraph, point: Point<f64>) -> Result<NodeIndex, Error> {
        let nearest = self
            .tree
            .nearest_neighbor(&[point.x(), point.y()])
            .ok_or(Error::EmptyGraph)?;
        advise_if_far(point, graph.vertex(nearest.data), self.snap_tolerance);
        Ok(nearest.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SegmentRecord, SegmentStore, build_route_graph};
    use crate::risk::RiskState;

    fn corridor_graph() -> RouteGraph {
        let records = vec![
            SegmentRecord {
                id: "ab".to_string(),
                start: [0.0, 0.0],
                end: [0.0, 1.0],
                crime: 0.5,
                lighting: 0.5,
                crowd: 0.5,
            },
            SegmentRecord {
                id: "bc".to_string(),
                start: [0.0, 1.0],
                end: [0.0, 2.0],
                crime: 0.5,
                lighting: 0.5,
                crowd: 0.5,
            },
        ];
        let mut store = SegmentStore::new();
        store.replace(records).unwrap();
        let mut risk = RiskState::default();
        build_route_graph(&store, &mut risk, 10, 0.5, 30.0)
    }

    fn empty_graph() -> RouteGraph {
        let store = SegmentStore::new();
        let mut risk = RiskState::default();
        build_route_graph(&store, &mut risk, 10, 0.5, 30.0)
    }

    #[test]
    fn nearest_snaps_to_the_closest_vertex() {
        let graph = corridor_graph();
        let locator = LinearLocator::new(0.02);

        let index = locator.nearest(&graph, Point::new(0.99, 0.001)).unwrap();
        assert_eq!(graph.vertex(index), Point::new(1.0, 0.0));
    }

    #[test]
    fn far_points_still_resolve() {
        let graph = corridor_graph();
        let locator = LinearLocator::new(0.02);

        // Way beyond the snap tolerance: advisory only, never an error
        let index = locator.nearest(&graph, Point::new(10.0, 10.0)).unwrap();
        assert_eq!(graph.vertex(index), Point::new(2.0, 0.0));
    }

    #[test]
    fn empty_graph_is_an_error() {
        let graph = empty_graph();
        assert!(graph.is_empty());
        assert!(matches!(
            LinearLocator::new(0.02).nearest(&graph, Point::new(0.0, 0.0)),
            Err(Error::EmptyGraph)
        ));
        assert!(matches!(
            RtreeLocator::new(&graph, 0.02).nearest(&graph, Point::new(0.0, 0.0)),
            Err(Error::EmptyGraph)
        ));
    }

    #[test]
    fn rtree_agrees_with_linear_scan() {
        let graph = corridor_graph();
        let linear = LinearLocator::new(0.02);
        let rtree = RtreeLocator::new(&graph, 0.02);

        for point in [
            Point::new(0.1, 0.0),
            Point::new(1.2, 0.01),
            Point::new(2.4, -0.3),
        ] {
            assert_eq!(
                linear.nearest(&graph, point).unwrap(),
                rtree.nearest(&graph, point).unwrap()
            );
        }
    }
}

use std::{cmp::Ordering, collections::BinaryHeap};

use hashbrown::HashMap;
use petgraph::graph::NodeIndex;

use crate::model::RouteGraph;
use crate::{Error, planar_distance};

#[derive(Copy, Clone, PartialEq)]
struct State {
    estimate: f64,
    cost: f64,
    node: NodeIndex,
}

impl Eq for State {}

// Min-heap by estimated total cost (reversed from standard Rust BinaryHeap)
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other.estimate.total_cmp(&self.estimate)
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* search from `origin` to `destination` over edge weights.
///
/// The heuristic is planar distance to the destination while edge weights
/// blend minutes with risk, so it is not guaranteed admissible: the returned
/// path is a best-effort approximation of the optimum. That mismatch is an
/// accepted trade-off of the blended cost model.
///
/// Equal origin and destination short-circuit to a single-vertex path
/// without touching the frontier.
///
/// # Errors
///
/// [`Error::NoPath`] when the destination is unreachable.
pub fn astar_path(
    graph: &RouteGraph,
    origin: NodeIndex,
    destination: NodeIndex,
) -> Result<Vec<NodeIndex>, Error> {
    if origin == destination {
        return Ok(vec![origin]);
    }

    let goal = graph.vertex(destination);
    let mut costs: HashMap<NodeIndex, f64> = HashMap::new();
    let mut predecessors: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut heap = BinaryHeap::new();

    costs.insert(origin, 0.0);
    heap.push(State {
        estimate: planar_distance(graph.vertex(origin), goal),
        cost: 0.0,
        node: origin,
    });

    while let Some(State { cost, node, .. }) = heap.pop() {
        if node == destination {
            return Ok(reconstruct(&predecessors, origin, destination));
        }

        // Skip frontier entries that a cheaper relaxation already replaced
        if costs.get(&node).is_some_and(|&best| cost > best) {
            continue;
        }

        for (next, edge) in graph.edges(node) {
            let next_cost = cost + edge.weight;
            match costs.entry(next) {
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(next_cost);
                    predecessors.insert(next, node);
                    heap.push(State {
                        estimate: next_cost + planar_distance(graph.vertex(next), goal),
                        cost: next_cost,
                        node: next,
                    });
                }
                hashbrown::hash_map::Entry::Occupied(mut entry) => {
                    if next_cost < *entry.get() {
                        *entry.get_mut() = next_cost;
                        predecessors.insert(next, node);
                        heap.push(State {
                            estimate: next_cost + planar_distance(graph.vertex(next), goal),
                            cost: next_cost,
                            node: next,
                        });
                    }
                }
            }
        }
    }

    Err(Error::NoPath)
}

fn reconstruct(
    predecessors: &HashMap<NodeIndex, NodeIndex>,
    origin: NodeIndex,
    destination: NodeIndex,
) -> Vec<NodeIndex> {
    let mut path = vec![destination];
    let mut current = destination;
    while current != origin {
        if let Some(&previous) = predecessors.get(&current) {
            path.push(previous);
            current = previous;
        } else {
            break;
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SegmentRecord, SegmentStore, build_route_graph};
    use crate::risk::RiskState;
    use geo::Point;

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

    /// Two ways from o to d: a direct risky segment and a two-leg safe
    /// detour through m. Distances are tiny so the detour stays attractive
    /// to the heuristic when risk dominates the weights.
    fn diamond(alpha: f64) -> (RouteGraph, NodeIndex, NodeIndex, NodeIndex) {
        let mut store = SegmentStore::new();
        store
            .replace(vec![
                record("direct", [0.0, 0.0], [0.0, 0.02], 1.0, 0.0, 0.0),
                record("out", [0.0, 0.0], [0.01, 0.01], 0.0, 1.0, 1.0),
                record("back", [0.01, 0.01], [0.0, 0.02], 0.0, 1.0, 1.0),
            ])
            .unwrap();
        let mut risk = RiskState::default();
        let graph = build_route_graph(&store, &mut risk, 10, alpha, 30.0);
        let o = graph.find_vertex(Point::new(0.0, 0.0)).unwrap();
        let m = graph.find_vertex(Point::new(0.01, 0.01)).unwrap();
        let d = graph.find_vertex(Point::new(0.02, 0.0)).unwrap();
        (graph, o, m, d)
    }

    #[test]
    fn alpha_one_prefers_the_faster_path() {
        let (graph, o, _, d) = diamond(1.0);
        let path = astar_path(&graph, o, d).unwrap();
        assert_eq!(path, vec![o, d]);
    }

    #[test]
    fn alpha_zero_prefers_the_safer_path() {
        let (graph, o, m, d) = diamond(0.0);
        let path = astar_path(&graph, o, d).unwrap();
        assert_eq!(path, vec![o, m, d]);
    }

    #[test]
    fn same_vertex_short_circuits() {
        let (graph, o, _, _) = diamond(0.5);
        assert_eq!(astar_path(&graph, o, o).unwrap(), vec![o]);
    }

    #[test]
    fn unreachable_destination_is_no_path() {
        let mut store = SegmentStore::new();
        store
            .replace(vec![
                record("ab", [0.0, 0.0], [0.0, 1.0], 0.5, 0.5, 0.5),
                // Directed the wrong way round: d→c only
                record("dc", [5.0, 1.0], [5.0, 0.0], 0.5, 0.5, 0.5),
            ])
            .unwrap();
        let mut risk = RiskState::default();
        let graph = build_route_graph(&store, &mut risk, 10, 0.5, 30.0);

        let a = graph.find_vertex(Point::new(0.0, 0.0)).unwrap();
        let c = graph.find_vertex(Point::new(0.0, 5.0)).unwrap();
        assert!(matches!(astar_path(&graph, a, c), Err(Error::NoPath)));
    }
}

//! Folding a vertex path into a reported route.

use geo::LineString;
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use itertools::Itertools;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use serde_json::json;

use crate::model::RouteGraph;
use crate::{Error, round2};

/// A computed route. Ephemeral: recomputed per query, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
    /// Traversed vertices as `[lat, lon]` pairs, origin first.
    pub path: Vec<[f64; 2]>,
    /// Total travel time in minutes.
    pub eta: f64,
    /// Total risk divided by the number of traversed segments.
    pub risk: f64,
    /// In (0, 1], inversely related to the normalized risk.
    pub confidence: f64,
    /// Per-edge endpoint pairs in path order; shared endpoints repeat.
    pub geometry: Vec<[[f64; 2]; 2]>,
    /// Advisory set when origin and destination resolve to the same vertex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}

/// Aggregates ETA, risk, confidence and geometry over `path`.
///
/// A single-vertex path is the trivial route: zero cost, full confidence,
/// with an advisory instead of geometry.
///
/// # Errors
///
/// [`Error::RoutingFailure`] if consecutive path vertices are not connected,
/// which indicates a path that did not come from this graph.
pub fn assemble_route(graph: &RouteGraph, path: &[NodeIndex]) -> Result<RouteResult, Error> {
    let coords = |index: NodeIndex| {
        let point = graph.vertex(index);
        [point.y(), point.x()]
    };

    if let [only] = path {
        return Ok(RouteResult {
            path: vec![coords(*only)],
            eta: 0.0,
            risk: 0.0,
            confidence: 1.0,
            geometry: Vec::new(),
            advisory: Some("origin and destination resolved to the same vertex".to_string()),
        });
    }

    let mut eta = 0.0;
    let mut risk = 0.0;
    let mut geometry = Vec::with_capacity(path.len().saturating_sub(1));

    for (a, b) in path.iter().tuple_windows() {
        let edge = graph.best_edge(*a, *b).ok_or_else(|| {
            Error::RoutingFailure(format!("path vertices {a:?} and {b:?} are not connected"))
        })?;
        eta += edge.eta;
        risk += edge.risk;
        geometry.push([coords(*a), coords(*b)]);
    }

    let segment_count = path.len().saturating_sub(1).max(1);
    let normalized_risk = round2(risk / segment_count as f64);
    let confidence = round2(1.0 / (1.0 + normalized_risk));

    Ok(RouteResult {
        path: path.iter().map(|&index| coords(index)).collect(),
        eta: round2(eta),
        risk: normalized_risk,
        confidence,
        geometry,
        advisory: None,
    })
}

impl RouteResult {
    /// Converts the route to a GeoJSON `FeatureCollection`, one `LineString`
    /// feature per traversed edge in path order.
    pub fn to_geojson(&self) -> Result<FeatureCollection, Error> {
        let mut features = Vec::with_capacity(self.geometry.len());

        for (index, pair) in self.geometry.iter().enumerate() {
            // GeoJSON positions are [lon, lat]
            let line = LineString::from(vec![
                (pair[0][1], pair[0][0]),
                (pair[1][1], pair[1][0]),
            ]);
            let geometry = Geometry::new(GeoJsonValue::from(&line));

            let value = json!({
                "type": "Feature",
                "geometry": geometry,
                "properties": {
                    "edge_index": index,
                },
            });
            features.push(
                Feature::from_json_value(value).map_err(|e| Error::GeoJsonError(e.to_string()))?,
            );
        }

        Ok(FeatureCollection {
            features,
            bbox: None,
            foreign_members: None,
        })
    }

    pub fn to_geojson_string(&self) -> Result<String, Error> {
        serde_json::to_string(&self.to_geojson()?).map_err(|e| Error::GeoJsonError(e.to_string()))
    }
}

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use geo::Point;

use saferoute_core::model::{SegmentRecord, SegmentStore, build_route_graph};
use saferoute_core::prelude::*;
use saferoute_core::risk::RiskState;

/// `n` x `n` lattice of eastward and northward segments at 0.01 degree
/// spacing, with deterministic pseudo-random risk attributes.
fn grid_records(n: usize) -> Vec<SegmentRecord> {
    let mut records = Vec::new();
    let coord = |i: usize| i as f64 * 0.01;
    let score = |seed: usize| (seed % 97) as f64 / 96.0;

    for i in 0..n {
        for j in 0..n {
            if j + 1 < n {
                records.push(SegmentRecord {
                    id: format!("e-{i}-{j}"),
                    start: [coord(i), coord(j)],
                    end: [coord(i), coord(j + 1)],
                    crime: score(i * 31 + j * 17),
                    lighting: score(i * 13 + j * 7),
                    crowd: score(i * 5 + j * 3),
                });
            }
            if i + 1 < n {
                records.push(SegmentRecord {
                    id: format!("n-{i}-{j}"),
                    start: [coord(i), coord(j)],
                    end: [coord(i + 1), coord(j)],
                    crime: score(i * 19 + j * 23),
                    lighting: score(i * 11 + j * 29),
                    crowd: score(i * 3 + j * 37),
                });
            }
        }
    }
    records
}

fn bench_build(c: &mut Criterion) {
    let mut store = SegmentStore::new();
    store.replace(grid_records(20)).unwrap();

    c.bench_function("build_graph_20x20", |b| {
        let mut risk = RiskState::default();
        b.iter(|| black_box(build_route_graph(&store, &mut risk, 22, 0.5, 30.0)));
    });
}

fn bench_route(c: &mut Criterion) {
    let engine = RoutingEngine::default();
    engine.reload_dataset(grid_records(20)).unwrap();

    let origin = Point::new(0.0, 0.0);
    let destination = Point::new(0.19, 0.19);

    c.bench_function("route_across_grid_20x20", |b| {
        b.iter(|| black_box(engine.compute_route(origin, destination, 22, 0.5)));
    });
}

criterion_group!(benches, bench_build, bench_route);
criterion_main!(benches);

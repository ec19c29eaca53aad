//! Benchmarks for env-mesh operations.
//!
//! Run with: cargo bench -p env-mesh
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p env-mesh -- --save-baseline main
//! 2. After changes: cargo bench -p env-mesh -- --baseline main

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use env_mesh::{BaseGrid, EnvironmentMesh, MeshBuilder, MeshConfig, NeighbourGraph};

// =============================================================================
// Test Config Generation
// =============================================================================

/// Config over a `size` x `size` degree region with a circle source.
fn circle_config(size: f64, split_depth: u32) -> MeshConfig {
    let half = size / 2.0;
    let json = format!(
        r#"{{
            "region": {{
                "lat_min": {}, "lat_max": {}, "long_min": {}, "long_max": {},
                "start_time": "2000-01-01", "end_time": "2000-12-31",
                "cell_width": 5, "cell_height": 5
            }},
            "data_sources": [{{
                "loader": "circle",
                "params": {{
                    "radius": {}, "centre": [0, 0], "nx": 201, "ny": 201,
                    "splitting_conditions": [
                        {{"dummy_data": {{"threshold": 0.5, "upper_bound": 0.9, "lower_bound": 0.1}}}}
                    ]
                }}
            }}],
            "splitting": {{"split_depth": {}, "minimum_datapoints": 5}}
        }}"#,
        -half,
        half,
        -half,
        half,
        size / 3.0,
        split_depth
    );
    MeshConfig::from_json(&json).expect("valid benchmark config")
}

fn build(size: f64, split_depth: u32) -> EnvironmentMesh {
    MeshBuilder::new(circle_config(size, split_depth))
        .and_then(|b| b.build_environmental_mesh())
        .expect("benchmark mesh builds")
}

// =============================================================================
// Build Benchmarks
// =============================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("Build");
    group.sample_size(20);

    for (name, depth) in [("depth_2", 2), ("depth_4", 4), ("depth_6", 6)] {
        let builder = MeshBuilder::new(circle_config(40.0, depth)).expect("valid benchmark config");
        group.bench_with_input(BenchmarkId::new("build_environmental_mesh", name), &builder, |b, builder| {
            b.iter(|| builder.build_environmental_mesh().expect("benchmark mesh builds"))
        });
    }

    group.finish();
}

// =============================================================================
// Neighbour Graph Benchmarks
// =============================================================================

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("NeighbourGraph");

    for (name, depth) in [("depth_3", 3), ("depth_5", 5)] {
        let mesh = build(40.0, depth);
        let grid = BaseGrid::new(mesh.bounds().clone(), 5.0, 5.0).expect("valid grid");
        group.throughput(Throughput::Elements(mesh.cellboxes().len() as u64));

        group.bench_with_input(BenchmarkId::new("initialise", name), &mesh, |b, mesh| {
            b.iter(|| NeighbourGraph::initialise_neighbour_graph(black_box(mesh.cellboxes()), &grid))
        });
    }

    group.finish();
}

// =============================================================================
// Mesh Operation Benchmarks
// =============================================================================

fn bench_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("Operations");
    let mesh = build(40.0, 4);
    let first = mesh.cellboxes()[0].id();

    group.bench_function("split_and_replace", |b| {
        b.iter_batched(
            || mesh.clone(),
            |mut m| m.split_and_replace(first),
            criterion::BatchSize::SmallInput,
        )
    });

    group.bench_function("query_index", |b| b.iter(|| mesh.query_index(black_box(1.3), black_box(-7.2))));

    group.bench_function("to_json", |b| b.iter(|| mesh.to_json()));

    let json = mesh.to_json().expect("mesh serialises");
    group.bench_function("load_from_json", |b| b.iter(|| EnvironmentMesh::load_from_json(black_box(&json))));

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_build, bench_graph, bench_operations);

criterion_main!(benches);

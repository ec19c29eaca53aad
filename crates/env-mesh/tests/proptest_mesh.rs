//! Property-based tests for mesh operations.
//!
//! These tests use proptest to generate random boundaries, split sequences
//! and attribute values, and verify the mesh invariants.
//!
//! Run with: cargo test -p env-mesh -- proptest

use env_mesh::{AggData, AggValue, Boundary, EnvironmentMesh, MeshConfig, build_environmental_mesh};
use proptest::prelude::*;

const BASIC_CONFIG: &str = r#"{"region":{"lat_min":-10,"lat_max":10,"long_min":-10,"long_max":10,"start_time":"2000-01-01","end_time":"2000-12-31","cell_width":10,"cell_height":10},"data_sources":[],"splitting":{"split_depth":1,"minimum_datapoints":5}}"#;

// =============================================================================
// Strategies
// =============================================================================

/// A boundary that does not cross the antimeridian.
fn arb_boundary() -> impl Strategy<Value = Boundary> {
    (-80.0..70.0f64, 0.1..20.0f64, -170.0..150.0f64, 0.1..30.0f64).prop_map(|(lat, height, long, width)| {
        Boundary::new([lat, lat + height], [long, long + width], None).unwrap()
    })
}

/// A boundary crossing the antimeridian.
fn arb_crossing_boundary() -> impl Strategy<Value = Boundary> {
    (-80.0..70.0f64, 0.1..20.0f64, 150.0..179.0f64, 2.0..30.0f64).prop_map(|(lat, height, long, width)| {
        let east = long + width - 360.0;
        Boundary::new([lat, lat + height], [long, east.max(-179.9)], None).unwrap()
    })
}

/// Sequence of split choices, each an index into the current cellbox list.
fn arb_splits(max: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..1000, 0..=max)
}

/// Finite attribute values.
fn arb_value() -> impl Strategy<Value = AggValue> {
    prop_oneof![
        (-1e6..1e6f64).prop_map(AggValue::Scalar),
        prop::collection::vec(-100.0..100.0f64, 2).prop_map(AggValue::Vector),
        any::<bool>().prop_map(AggValue::Bool),
    ]
}

fn basic_mesh() -> EnvironmentMesh {
    build_environmental_mesh(MeshConfig::from_json(BASIC_CONFIG).unwrap()).unwrap()
}

fn apply_splits(mesh: &mut EnvironmentMesh, choices: &[usize]) {
    for choice in choices {
        let id = mesh.cellboxes()[choice % mesh.cellboxes().len()].id();
        mesh.split_and_replace(id).unwrap();
    }
}

fn area(b: &Boundary) -> f64 {
    b.width() * b.height()
}

fn overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    (a1.min(b1) - a0.max(b0)).max(0.0)
}

// =============================================================================
// Property Tests: Quartering
// =============================================================================

proptest! {
    /// The four quarters tile the parent exactly.
    #[test]
    fn proptest_split_tiles_parent(b in arb_boundary()) {
        let quarters = b.split();
        let total: f64 = quarters.iter().map(area).sum();
        prop_assert!((total - area(&b)).abs() <= 1e-9 * area(&b).max(1.0));

        for (i, q) in quarters.iter().enumerate() {
            prop_assert!(b.encloses(q), "quarter {} escapes {}", i, b);
            for other in &quarters[i + 1..] {
                let shared = overlap(q.lat_min(), q.lat_max(), other.lat_min(), other.lat_max())
                    * overlap(q.long_min(), q.long_max(), other.long_min(), other.long_max());
                prop_assert_eq!(shared, 0.0);
            }
        }
    }

    /// Quarters of an antimeridian-crossing boundary keep its area.
    #[test]
    fn proptest_split_crossing_keeps_area(b in arb_crossing_boundary()) {
        let quarters = b.split();
        let total: f64 = quarters.iter().map(area).sum();
        prop_assert!((total - area(&b)).abs() <= 1e-9 * area(&b).max(1.0));
        for q in &quarters {
            prop_assert!(b.encloses(q));
        }
    }
}

// =============================================================================
// Property Tests: Neighbour Graph
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Incremental splits keep the graph symmetric and the cells tiling the region.
    #[test]
    fn proptest_splits_keep_graph_symmetric(choices in arb_splits(12)) {
        let mut mesh = basic_mesh();
        apply_splits(&mut mesh, &choices);

        prop_assert!(mesh.neighbour_graph().is_symmetric(), "{:?}", mesh.neighbour_graph().asymmetries());
        prop_assert_eq!(mesh.cellboxes().len(), 4 + 3 * choices.len());
        prop_assert_eq!(mesh.neighbour_graph().len(), mesh.cellboxes().len());
        let total: f64 = mesh.cellboxes().iter().map(|c| area(c.boundary())).sum();
        prop_assert!((total - 400.0).abs() < 1e-9);
    }

    /// Every point of the region lies in exactly one cellbox.
    #[test]
    fn proptest_points_have_one_cellbox(
        choices in arb_splits(8),
        lat in -10.0..10.0f64,
        long in -10.0..10.0f64,
    ) {
        let mut mesh = basic_mesh();
        apply_splits(&mut mesh, &choices);
        let id = mesh.query_index(lat, long).unwrap();
        prop_assert!(mesh.get_cellbox(id).unwrap().contains_point(lat, long));
    }
}

// =============================================================================
// Property Tests: Serialisation
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Loading a serialised mesh gives back the same mesh.
    #[test]
    fn proptest_json_roundtrip(
        choices in arb_splits(6),
        values in prop::collection::vec(arb_value(), 1..8),
    ) {
        let mut mesh = basic_mesh();
        apply_splits(&mut mesh, &choices);
        for (i, value) in values.into_iter().enumerate() {
            let mut data = AggData::new();
            data.insert(format!("attr_{}", i % 3), value);
            let index = i % mesh.cellboxes().len();
            mesh.update_cellbox(index, data).unwrap();
        }

        let restored = EnvironmentMesh::load_from_json(&mesh.to_json().unwrap()).unwrap();
        prop_assert_eq!(restored, mesh);
    }
}

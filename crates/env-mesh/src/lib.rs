//! Adaptive environmental meshes.
//!
//! This crate discretises a geographic region into a non-uniform mesh of
//! rectangular cells. Cells split recursively (quad-tree fashion) wherever
//! the environmental data sources inside them are heterogeneous, so that
//! resolution follows the data. The finished mesh carries aggregated values
//! per cell and an 8-direction neighbour graph, ready for route planning or
//! other graph algorithms.
//!
//! # Features
//!
//! - **Boundaries**: lat/long/time rectangles, including antimeridian-crossing
//!   and global regions
//! - **Data sources**: synthetic shapes, CSV point tables and gridded JSON,
//!   with scalar and vector splitting conditions
//! - **Refinement**: breadth-first, generation by generation, in parallel
//! - **Neighbour graph**: built from leaf geometry, repaired incrementally on
//!   split and merge
//! - **I/O**: mesh JSON round-trip and GeoJSON export
//!
//! # Coordinates
//!
//! Latitude runs `-90..=90` and longitude `-180..=180` degrees. A region with
//! `long_min > long_max` crosses the antimeridian. Cells are half-open for
//! point queries (`min <= x < max`); datapoints are trimmed with the
//! `(min, max]` convention.
//!
//! # Quick Start
//!
//! ```no_run
//! use env_mesh::{MeshBuilder, MeshConfig};
//!
//! let config = MeshConfig::from_file("config.json").unwrap();
//! let mesh = MeshBuilder::new(config).unwrap().build_environmental_mesh().unwrap();
//!
//! let id = mesh.query_index(-5.0, -5.0).unwrap();
//! println!("cellbox {}: {:?}", id, mesh.get_cellbox(id).unwrap().agg_data());
//!
//! mesh.save("mesh.json", "JSON", None).unwrap();
//! ```
//!
//! # Common Workflows
//!
//! ## Rebuilding a mesh
//!
//! Every mesh embeds the config it was built from:
//!
//! ```no_run
//! use env_mesh::{EnvironmentMesh, MeshConfig, build_environmental_mesh};
//!
//! let config = MeshConfig::from_file("old_mesh.json").unwrap();
//! let mesh = build_environmental_mesh(config).unwrap();
//! ```
//!
//! ## Merging meshes
//!
//! A finer mesh of a sub-region can replace that part of a coarser mesh,
//! provided both share the base cell size and alignment:
//!
//! ```no_run
//! use env_mesh::EnvironmentMesh;
//!
//! let mut mesh = EnvironmentMesh::load("coarse.json").unwrap();
//! let patch = EnvironmentMesh::load("fine.json").unwrap();
//! mesh.merge_mesh(&patch).unwrap();
//! ```
//!
//! ## Walking the graph
//!
//! ```no_run
//! use env_mesh::{Direction, EnvironmentMesh};
//!
//! let mesh = EnvironmentMesh::load("mesh.json").unwrap();
//! let graph = mesh.neighbour_graph();
//! for &north in graph.get_neighbours(0, Direction::North).unwrap() {
//!     println!("north of 0: {}", north);
//! }
//! ```

mod builder;
mod error;
pub mod tracing_ext;

pub mod aggregated;
pub mod boundary;
pub mod cellbox;
pub mod config;
pub mod dataloader;
pub mod direction;
pub mod environment_mesh;
pub mod export;
pub mod grid;
pub mod metadata;
pub mod neighbour_graph;
pub mod progress;

/// Identifier of a cell or cellbox.
pub type CellId = usize;

// Re-export core types at crate root
pub use error::{ErrorCode, MeshError, MeshLocation, MeshResult, RecoverySuggestion};

pub use aggregated::{AggValue, AggregatedCellBox};
pub use boundary::{Boundary, TimeRange};
pub use builder::{MeshBuilder, build_environmental_mesh};
pub use cellbox::{Cell, CellArena};
pub use config::{DataSourceConfig, MeshConfig, Region, SplittingConfig};
pub use dataloader::{
    AggData, AggregationType, DataLoader, DataLoaderFactory, HomCondition, SplittingCondition,
    ValueFillType,
};
pub use direction::Direction;
pub use environment_mesh::EnvironmentMesh;
pub use export::{ExportFormat, FormatParams};
pub use grid::BaseGrid;
pub use metadata::Metadata;
pub use neighbour_graph::{NeighbourGraph, NeighbourMap};
pub use progress::{Progress, ProgressCallback};

//! Adaptive mesh construction.
//!
//! # Example
//!
//! ```no_run
//! use env_mesh::{MeshBuilder, MeshConfig};
//!
//! let config = MeshConfig::from_file("config.json").unwrap();
//! let mesh = MeshBuilder::new(config)
//!     .unwrap()
//!     .build_environmental_mesh()
//!     .unwrap();
//!
//! mesh.save("mesh.json", "JSON", None).unwrap();
//! ```
//!
//! # Algorithm
//!
//! 1. The region is cut into a regular grid of `cell_width x cell_height`
//!    base cells, each carrying every data source trimmed to its bounds.
//! 2. Each generation, every active cell is asked whether it should split
//!    (in parallel). Splitting cells are replaced by their four children,
//!    which form the next generation. The rest become leaves.
//! 3. Refinement stops once no cell splits; `split_depth` bounds the number
//!    of generations.
//! 4. Leaves are aggregated (in parallel) and the neighbour graph is built
//!    from their geometry.

use rayon::prelude::*;
use tracing::{info, trace, warn};

use crate::CellId;
use crate::aggregated::AggregatedCellBox;
use crate::boundary::Boundary;
use crate::cellbox::{Cell, CellArena};
use crate::config::MeshConfig;
use crate::dataloader::{DataLoaderFactory, SplittingCondition, ValueFillType};
use crate::environment_mesh::EnvironmentMesh;
use crate::error::{MeshError, MeshResult};
use crate::grid::BaseGrid;
use crate::metadata::Metadata;
use crate::neighbour_graph::NeighbourGraph;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::tracing_ext::{OperationTimer, log_generation, log_mesh_stats};

/// Builds an [`EnvironmentMesh`] from a [`MeshConfig`].
///
/// Data sources are loaded once, when the builder is created.
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    config: MeshConfig,
    grid: BaseGrid,
    sources: Vec<Metadata>,
}

impl MeshBuilder {
    /// Validate `config` and load its data sources.
    pub fn new(config: MeshConfig) -> MeshResult<Self> {
        Self::with_factory(config, DataLoaderFactory::new())
    }

    /// Like [`MeshBuilder::new`], loading sources through `factory`.
    pub fn with_factory(config: MeshConfig, factory: DataLoaderFactory) -> MeshResult<Self> {
        config.validate()?;
        let bounds = config.bounds()?;
        let grid = BaseGrid::new(bounds.clone(), config.region.cell_width, config.region.cell_height)?;
        let min_dp = config.splitting.minimum_datapoints as usize;

        let mut sources = Vec::with_capacity(config.data_sources.len());
        for source in &config.data_sources {
            let loader = factory.get_dataloader(&source.loader, &bounds, &source.params, min_dp)?;
            let conditions = SplittingCondition::list_from_params(&source.params)?;
            let value_fill_type = ValueFillType::from_params(&source.params)?;
            sources.push(Metadata::new(loader, conditions, value_fill_type));
        }

        info!(
            target: "env_mesh::build",
            sources = sources.len(),
            grid_width = grid.grid_width(),
            grid_height = grid.grid_height(),
            split_depth = config.splitting.split_depth,
            "Initialised mesh builder"
        );

        Ok(Self { config, grid, sources })
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn grid(&self) -> &BaseGrid {
        &self.grid
    }

    /// Data sources over the whole region, in config order.
    pub fn sources(&self) -> &[Metadata] {
        &self.sources
    }

    /// Build the mesh.
    pub fn build_environmental_mesh(&self) -> MeshResult<EnvironmentMesh> {
        self.build_with_progress(None)
    }

    /// Build the mesh, reporting to `callback` once per refinement generation.
    ///
    /// # Errors
    ///
    /// [`MeshError::Cancelled`] if the callback returns `false`.
    pub fn build_with_progress(&self, callback: Option<&ProgressCallback>) -> MeshResult<EnvironmentMesh> {
        let _timer = OperationTimer::new("build_environmental_mesh");
        let arena = self.refine(callback)?;

        let leaves = arena.leaves();
        let cellboxes = leaves
            .par_iter()
            .map(|&id| arena.aggregate(id))
            .collect::<MeshResult<Vec<AggregatedCellBox>>>()?;

        let neighbour_graph = NeighbourGraph::initialise_neighbour_graph(&cellboxes, &self.grid)?;
        let mesh = EnvironmentMesh::new(self.grid.bounds().clone(), cellboxes, neighbour_graph, self.config.clone());

        log_mesh_stats(&mesh, "build_environmental_mesh");
        info!(
            target: "env_mesh::build",
            cellboxes = mesh.cellboxes().len(),
            cells_evaluated = arena.len(),
            "Built environmental mesh"
        );
        Ok(mesh)
    }

    /// Root cells of the base grid, with ids `0..n`.
    fn base_cells(&self) -> MeshResult<Vec<Cell>> {
        let minimum_datapoints = i64::from(self.config.splitting.minimum_datapoints);
        self.grid
            .cells()?
            .into_iter()
            .enumerate()
            .map(|(id, bounds)| self.root_cell(id, bounds, minimum_datapoints))
            .collect()
    }

    fn root_cell(&self, id: CellId, bounds: Boundary, minimum_datapoints: i64) -> MeshResult<Cell> {
        let data_source = self.sources.iter().map(|m| m.for_bounds(&bounds)).collect();
        let mut cell = Cell::new(bounds, id);
        cell.set_data_source(data_source);
        cell.set_minimum_datapoints(minimum_datapoints)?;
        Ok(cell)
    }

    /// Breadth-first refinement. Returns every cell created, leaves and
    /// split parents alike.
    fn refine(&self, callback: Option<&ProgressCallback>) -> MeshResult<CellArena> {
        let max_depth = self.config.splitting.split_depth;
        let tracker = ProgressTracker::new(u64::from(max_depth) + 1);

        let mut arena = CellArena::new();
        let mut active: Vec<CellId> = self.base_cells()?.into_iter().map(|c| arena.insert(c)).collect();
        let mut generation = 0usize;

        while !active.is_empty() {
            tracker.set_generation(generation as u64);
            let message = format!("refining generation {}", generation);
            if !tracker.report(callback, active.len(), message) {
                warn!(target: "env_mesh::progress", generation, "Mesh build cancelled");
                return Err(MeshError::Cancelled { generation });
            }

            let decisions = active
                .par_iter()
                .map(|&id| arena.get(id)?.should_split(max_depth))
                .collect::<MeshResult<Vec<bool>>>()?;

            let mut next = Vec::new();
            for (&id, split) in active.iter().zip(decisions) {
                if split {
                    next.extend(arena.split(id)?);
                    trace!(target: "env_mesh::build", cell = id, "Split cell");
                }
            }

            log_generation(generation, active.len(), next.len() / 4);
            active = next;
            generation += 1;
        }

        Ok(arena)
    }
}

/// Build a mesh from `config` with the default loader factory.
pub fn build_environmental_mesh(config: MeshConfig) -> MeshResult<EnvironmentMesh> {
    MeshBuilder::new(config)?.build_environmental_mesh()
}

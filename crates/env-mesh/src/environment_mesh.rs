//! The finished mesh: leaf cellboxes, their neighbour graph and the config
//! they were built from.

use std::path::Path;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::CellId;
use crate::aggregated::AggregatedCellBox;
use crate::boundary::Boundary;
use crate::config::MeshConfig;
use crate::dataloader::AggData;
use crate::direction::Direction;
use crate::error::{MeshError, MeshResult};
use crate::grid::BaseGrid;
use crate::neighbour_graph::NeighbourGraph;
use crate::tracing_ext::{OperationTimer, log_graph_check, log_io_operation, log_merge_result};

const EPS: f64 = 1e-9;

/// Leaf cellboxes of a mesh together with their adjacency and config.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentMesh {
    bounds: Boundary,
    agg_cellboxes: Vec<AggregatedCellBox>,
    neighbour_graph: NeighbourGraph,
    config: MeshConfig,
}

impl EnvironmentMesh {
    pub fn new(
        bounds: Boundary,
        agg_cellboxes: Vec<AggregatedCellBox>,
        neighbour_graph: NeighbourGraph,
        config: MeshConfig,
    ) -> Self {
        Self {
            bounds,
            agg_cellboxes,
            neighbour_graph,
            config,
        }
    }

    #[inline]
    pub fn bounds(&self) -> &Boundary {
        &self.bounds
    }

    #[inline]
    pub fn cellboxes(&self) -> &[AggregatedCellBox] {
        &self.agg_cellboxes
    }

    #[inline]
    pub fn neighbour_graph(&self) -> &NeighbourGraph {
        &self.neighbour_graph
    }

    #[inline]
    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    // ==================== Serialisation ====================

    /// The mesh document: `config`, `cellboxes` and `neighbour_graph`.
    pub fn to_json(&self) -> MeshResult<Value> {
        let config = serde_json::to_value(&self.config).map_err(|e| MeshError::serialize("mesh config", e))?;
        let cellboxes: Vec<Value> = self
            .agg_cellboxes
            .iter()
            .map(|cb| Value::Object(cb.to_json()))
            .collect();
        Ok(json!({
            "config": { "mesh_info": config },
            "cellboxes": cellboxes,
            "neighbour_graph": self.neighbour_graph.to_json()?,
        }))
    }

    /// Rebuild a mesh from [`EnvironmentMesh::to_json`] output.
    ///
    /// Cellbox geometry carries no time, so cellboxes take the time range of
    /// the config's region.
    pub fn load_from_json(value: &Value) -> MeshResult<Self> {
        let config = MeshConfig::from_json_value(value.clone())
            .map_err(|e| MeshError::parse_error("<mesh>", format!("config: {}", e)))?;
        let bounds = config.bounds()?;
        let grid = BaseGrid::new(bounds.clone(), config.region.cell_width, config.region.cell_height)?;
        let time_range = bounds.time_range().copied();

        let cellboxes = value
            .get("cellboxes")
            .and_then(Value::as_array)
            .ok_or_else(|| MeshError::parse_error("<mesh>", "missing 'cellboxes' list"))?
            .iter()
            .map(|cb| {
                let object = cb
                    .as_object()
                    .ok_or_else(|| MeshError::parse_error("<mesh>", "cellbox is not an object"))?;
                AggregatedCellBox::from_json(object, time_range)
            })
            .collect::<MeshResult<Vec<_>>>()?;

        let graph_json = value
            .get("neighbour_graph")
            .ok_or_else(|| MeshError::parse_error("<mesh>", "missing 'neighbour_graph'"))?;
        let neighbour_graph = NeighbourGraph::from_json(graph_json, &bounds, grid.grid_width())?;

        Ok(Self::new(bounds, cellboxes, neighbour_graph, config))
    }

    /// Read a mesh JSON file.
    pub fn load(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| MeshError::io_read(path, e))?;
        let value: Value =
            serde_json::from_str(&contents).map_err(|e| MeshError::parse_error(path, e.to_string()))?;
        let mesh = Self::load_from_json(&value).map_err(|e| match e {
            MeshError::ParseError { details, .. } => MeshError::parse_error(path, details),
            other => other,
        })?;
        log_io_operation("load", path, Some("JSON"), true);
        Ok(mesh)
    }

    // ==================== Queries ====================

    /// Whether any cellbox contains `(lat, long)`.
    ///
    /// Merged-in meshes extend the covered area past the config region, so
    /// this asks the cellboxes rather than `bounds`.
    pub fn query_inside_mesh(&self, lat: f64, long: f64) -> bool {
        self.agg_cellboxes.iter().any(|cb| cb.contains_point(lat, long))
    }

    /// Id of the single cellbox containing `(lat, long)`.
    ///
    /// # Errors
    ///
    /// [`MeshError::AmbiguousPointLocation`] if zero or several cellboxes
    /// contain the point.
    pub fn query_index(&self, lat: f64, long: f64) -> MeshResult<CellId> {
        let mut matches = self.agg_cellboxes.iter().filter(|cb| cb.contains_point(lat, long));
        match (matches.next(), matches.count()) {
            (Some(cellbox), 0) => Ok(cellbox.id()),
            (first, rest) => Err(MeshError::AmbiguousPointLocation {
                lat,
                long,
                matches: usize::from(first.is_some()) + rest,
            }),
        }
    }

    pub fn get_cellbox(&self, id: CellId) -> MeshResult<&AggregatedCellBox> {
        self.agg_cellboxes
            .iter()
            .find(|cb| cb.id() == id)
            .ok_or(MeshError::CellNotFound { id })
    }

    fn position_of(&self, id: CellId) -> MeshResult<usize> {
        self.agg_cellboxes
            .iter()
            .position(|cb| cb.id() == id)
            .ok_or(MeshError::CellNotFound { id })
    }

    /// Largest cellbox id, or 0 for an empty mesh.
    pub fn get_max_cellbox_id(&self) -> CellId {
        self.agg_cellboxes.iter().map(AggregatedCellBox::id).max().unwrap_or(0)
    }

    /// Merge `values` into the data of the cellbox at position `index`.
    ///
    /// # Errors
    ///
    /// [`MeshError::InvalidArgument`] if `index` is out of range.
    pub fn update_cellbox(&mut self, index: usize, values: AggData) -> MeshResult<()> {
        let count = self.agg_cellboxes.len();
        let cellbox = self.agg_cellboxes.get_mut(index).ok_or_else(|| {
            MeshError::invalid_argument("index", format!("{} is out of range for {} cellboxes", index, count))
        })?;
        cellbox.update(values);
        Ok(())
    }

    // ==================== Splitting ====================

    /// Split cellbox `id` into four and repair the neighbour graph.
    ///
    /// Children take ids `max_id + 1..=max_id + 4` in SW, NW, SE, NE order
    /// and copy the parent's data. Returns their ids.
    pub fn split_and_replace(&mut self, id: CellId) -> MeshResult<[CellId; 4]> {
        let position = self.position_of(id)?;
        let parent = &self.agg_cellboxes[position];

        let mut edge_neighbours = Vec::new();
        for direction in [Direction::North, Direction::East, Direction::South, Direction::West] {
            for &neighbour in self.neighbour_graph.get_neighbours(id, direction)? {
                edge_neighbours.push((neighbour, self.get_cellbox(neighbour)?.boundary().clone()));
            }
        }

        let first = self.get_max_cellbox_id() + 1;
        let [sw, nw, se, ne] = parent.boundary().split();
        let children = [(first, sw), (first + 1, nw), (first + 2, se), (first + 3, ne)];
        let agg_data = parent.agg_data().clone();

        self.neighbour_graph.split_node(id, &children, &edge_neighbours)?;
        self.agg_cellboxes.remove(position);
        for (child_id, bounds) in children {
            self.agg_cellboxes.push(AggregatedCellBox::new(bounds, agg_data.clone(), child_id));
        }

        debug!(target: "env_mesh::graph", cell = id, first_child = first, "Split and replaced cellbox");
        Ok([first, first + 1, first + 2, first + 3])
    }

    /// Split the mesh around each point down to the maximum split depth.
    ///
    /// Points outside the mesh are skipped. Returns the number of splits.
    pub fn split_points(&mut self, points: &[(f64, f64)]) -> MeshResult<usize> {
        let _timer = OperationTimer::with_context("split_points", self.agg_cellboxes.len());
        let scale = 2f64.powi(self.config.splitting.split_depth as i32);
        let min_dcx = self.config.region.cell_width / scale;
        let min_dcy = self.config.region.cell_height / scale;

        let mut splits = 0;
        for &(lat, long) in points {
            if !self.query_inside_mesh(lat, long) {
                debug!(target: "env_mesh::build", lat, long, "Point outside mesh, skipping");
                continue;
            }
            loop {
                let id = self.query_index(lat, long)?;
                let bounds = self.get_cellbox(id)?.boundary();
                if bounds.width() <= min_dcx + EPS || bounds.height() <= min_dcy + EPS {
                    break;
                }
                self.split_and_replace(id)?;
                splits += 1;
            }
        }

        info!(target: "env_mesh::build", points = points.len(), splits, "Split mesh around points");
        Ok(splits)
    }

    // ==================== Merging ====================

    /// Splice `other` into this mesh.
    ///
    /// Cellboxes of this mesh that lie within `other`'s bounds are dropped,
    /// `other`'s cellboxes are appended with ids past this mesh's maximum,
    /// and the graphs are tied along all four edges of `other`.
    ///
    /// # Errors
    ///
    /// [`MeshError::MergeIncompatible`] if `other` is not aligned with this
    /// mesh's base grid. Nothing is changed in that case.
    pub fn merge_mesh(&mut self, other: &EnvironmentMesh) -> MeshResult<()> {
        let _timer = OperationTimer::with_context("merge_mesh", other.agg_cellboxes.len());
        self.validate_merge_compatibility(other)?;

        self.config.merged.push(other.config.clone());

        let region = other.bounds.clone();
        let inside: Vec<CellId> = self
            .agg_cellboxes
            .iter()
            .filter(|cb| region.encloses(cb.boundary()))
            .map(AggregatedCellBox::id)
            .collect();
        for &id in &inside {
            self.remove_cellbox(id)?;
        }

        let mut incoming = other.clone();
        let offset = if self.agg_cellboxes.is_empty() { 0 } else { self.get_max_cellbox_id() + 1 };
        incoming.increment_ids(offset);

        let exterior: Vec<(CellId, Boundary)> = self
            .agg_cellboxes
            .iter()
            .map(|cb| (cb.id(), cb.boundary().clone()))
            .collect();

        for (&id, neighbours) in incoming.neighbour_graph.get_graph() {
            self.neighbour_graph.add_node(id, neighbours.clone());
        }

        let mut tied = 0;
        for side in [Direction::North, Direction::South, Direction::East, Direction::West] {
            let outside: Vec<&(CellId, Boundary)> =
                exterior.iter().filter(|(_, b)| self.beyond_edge(&region, b, side)).collect();
            let edge: Vec<&AggregatedCellBox> = incoming
                .agg_cellboxes
                .iter()
                .filter(|cb| on_edge(&region, cb.boundary(), side))
                .collect();
            for (outer_id, outer) in &outside {
                for inner in &edge {
                    let Some(direction) = self.neighbour_graph.get_neighbour_case_bounds(outer, inner.boundary())
                    else {
                        continue;
                    };
                    // Corner cells turn up on two sides
                    if self.neighbour_graph.get_neighbours(*outer_id, direction)?.contains(&inner.id()) {
                        continue;
                    }
                    self.neighbour_graph.link(*outer_id, direction, inner.id())?;
                    tied += 1;
                }
            }
        }

        self.agg_cellboxes.append(&mut incoming.agg_cellboxes);

        log_merge_result(inside.len(), other.agg_cellboxes.len(), tied);
        log_graph_check(self.neighbour_graph.asymmetries().len(), "merge_mesh");
        Ok(())
    }

    /// Check that `other` is a whole number of base cells, aligned with
    /// this mesh's grid.
    pub fn validate_merge_compatibility(&self, other: &EnvironmentMesh) -> MeshResult<()> {
        let cell_width = self.config.region.cell_width;
        let cell_height = self.config.region.cell_height;
        let theirs = &other.bounds;

        let checks = [
            (theirs.height(), cell_height, "height of the merged mesh"),
            (theirs.width(), cell_width, "width of the merged mesh"),
            (self.bounds.lat_min() - theirs.lat_min(), cell_height, "latitude offset"),
            (self.bounds.long_min() - theirs.long_min(), cell_width, "longitude offset"),
        ];
        for (value, step, what) in checks {
            if !is_multiple(value, step) {
                return Err(MeshError::merge_incompatible(format!(
                    "{} ({}) is not a multiple of the cell size ({})",
                    what, value, step
                )));
            }
        }
        Ok(())
    }

    /// Remove a cellbox and every graph reference to it.
    pub fn remove_cellbox(&mut self, id: CellId) -> MeshResult<()> {
        let position = self.position_of(id)?;
        self.agg_cellboxes.remove(position);
        if self.neighbour_graph.contains(id) {
            self.neighbour_graph.remove_node_and_update_neighbours(id)?;
        }
        Ok(())
    }

    /// Offset every cellbox id, in the cellboxes and the graph alike.
    pub fn increment_ids(&mut self, increment: CellId) {
        for cellbox in &mut self.agg_cellboxes {
            cellbox.set_id(cellbox.id() + increment);
        }
        self.neighbour_graph.increment_ids(increment);
    }

    /// Whether `cell` lies just outside `side` of `region`.
    fn beyond_edge(&self, region: &Boundary, cell: &Boundary, side: Direction) -> bool {
        match side {
            Direction::North => cell.lat_min() == region.lat_max(),
            Direction::South => cell.lat_max() == region.lat_min(),
            Direction::East => self.neighbour_graph.same_meridian(cell.long_min(), region.long_max()),
            Direction::West => self.neighbour_graph.same_meridian(cell.long_max(), region.long_min()),
            _ => false,
        }
    }

    /// Sorted names of every attribute carried by any cellbox.
    pub fn data_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .agg_cellboxes
            .iter()
            .flat_map(|cb| cb.agg_data().keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Whether `cell` lies along `side` of `region`, inside it.
fn on_edge(region: &Boundary, cell: &Boundary, side: Direction) -> bool {
    match side {
        Direction::North => cell.lat_max() == region.lat_max(),
        Direction::South => cell.lat_min() == region.lat_min(),
        Direction::East => cell.long_max() == region.long_max(),
        Direction::West => cell.long_min() == region.long_min(),
        _ => false,
    }
}

fn is_multiple(value: f64, step: f64) -> bool {
    let ratio = value / step;
    (ratio - ratio.round()).abs() < EPS
}

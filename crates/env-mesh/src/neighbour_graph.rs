//! Directional adjacency between the cellboxes of a mesh.
//!
//! Every cellbox is a node holding a [`NeighbourMap`]: the ids of the
//! cellboxes touching it in each of the eight compass directions. Edges are
//! always written in pairs, `b` in `a`'s `d` list and `a` in `b`'s
//! `d.opposite()` list, so the graph stays symmetric through every repair.
//!
//! # Adjacency
//!
//! Two boundaries are neighbours when they share an edge segment of
//! non-zero length (N, E, S, W) or touch at a single corner point
//! (NE, SE, SW, NW). When the mesh wraps through the antimeridian,
//! longitudes 180 and -180 are the same meridian.
//!
//! # JSON
//!
//! ```json
//! {"0": {"1": [3], "2": [1], "3": [], "4": [], "-1": [], "-2": [], "-3": [], "-4": [2]}}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use hashbrown::HashMap;
use rayon::prelude::*;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::CellId;
use crate::aggregated::AggregatedCellBox;
use crate::boundary::{Boundary, unwrap_long};
use crate::direction::Direction;
use crate::error::{MeshError, MeshResult};
use crate::grid::BaseGrid;
use crate::tracing_ext::{OperationTimer, log_graph_check};

/// Neighbour ids of one cellbox in each direction.
///
/// Lists are kept sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighbourMap {
    lists: [Vec<CellId>; 8],
}

#[inline]
fn slot(direction: Direction) -> usize {
    match direction {
        Direction::NorthEast => 0,
        Direction::East => 1,
        Direction::SouthEast => 2,
        Direction::South => 3,
        Direction::SouthWest => 4,
        Direction::West => 5,
        Direction::NorthWest => 6,
        Direction::North => 7,
    }
}

impl NeighbourMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(direction, ids)` pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (Direction, Vec<CellId>)>) -> Self {
        let mut map = Self::new();
        for (direction, ids) in entries {
            map.set(direction, ids);
        }
        map
    }

    pub fn get(&self, direction: Direction) -> &[CellId] {
        &self.lists[slot(direction)]
    }

    /// Add `id` in `direction`. Returns `false` if it was already there.
    pub fn insert(&mut self, direction: Direction, id: CellId) -> bool {
        let list = &mut self.lists[slot(direction)];
        match list.binary_search(&id) {
            Ok(_) => false,
            Err(pos) => {
                list.insert(pos, id);
                true
            }
        }
    }

    /// Remove `id` from `direction`. Returns `false` if it was not there.
    pub fn remove(&mut self, direction: Direction, id: CellId) -> bool {
        let list = &mut self.lists[slot(direction)];
        match list.binary_search(&id) {
            Ok(pos) => {
                list.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Replace the list in `direction`.
    pub fn set(&mut self, direction: Direction, mut ids: Vec<CellId>) {
        ids.sort_unstable();
        ids.dedup();
        self.lists[slot(direction)] = ids;
    }

    pub fn contains(&self, direction: Direction, id: CellId) -> bool {
        self.get(direction).binary_search(&id).is_ok()
    }

    /// Every `(direction, ids)` pair in serialisation order.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &[CellId])> + '_ {
        Direction::ALL.into_iter().map(move |d| (d, self.get(d)))
    }

    /// Total number of neighbour entries.
    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    fn map_ids(&self, f: impl Fn(CellId) -> CellId) -> Self {
        let mut lists = self.lists.clone();
        for list in &mut lists {
            for id in list.iter_mut() {
                *id = f(*id);
            }
        }
        Self { lists }
    }
}

impl Serialize for NeighbourMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(8))?;
        for (direction, ids) in self.iter() {
            map.serialize_entry(&direction.code().to_string(), ids)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NeighbourMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = NeighbourMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of direction codes to neighbour id lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<NeighbourMap, A::Error> {
                let mut map = NeighbourMap::new();
                while let Some((key, ids)) = access.next_entry::<String, Vec<CellId>>()? {
                    let code: i8 = key
                        .parse()
                        .map_err(|_| de::Error::custom(format!("'{}' is not a direction code", key)))?;
                    let direction = Direction::from_code(code).map_err(de::Error::custom)?;
                    map.set(direction, ids);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// Adjacency of every cellbox in a mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighbourGraph {
    graph: BTreeMap<CellId, NeighbourMap>,
    grid_width: usize,
    is_global_mesh: bool,
    wraps_antimeridian: bool,
}

impl NeighbourGraph {
    /// Empty graph for a mesh covering `bounds`.
    pub fn for_bounds(bounds: &Boundary, grid_width: usize) -> Self {
        let is_global_mesh = bounds.is_global();
        Self {
            graph: BTreeMap::new(),
            grid_width,
            is_global_mesh,
            wraps_antimeridian: is_global_mesh || bounds.crosses_antimeridian(),
        }
    }

    /// Read a graph from its JSON object form.
    pub fn from_json(value: &Value, bounds: &Boundary, grid_width: usize) -> MeshResult<Self> {
        let graph: BTreeMap<CellId, NeighbourMap> = serde_json::from_value(value.clone())
            .map_err(|e| MeshError::parse_error("<neighbour_graph>", e.to_string()))?;
        Ok(Self {
            graph,
            ..Self::for_bounds(bounds, grid_width)
        })
    }

    pub fn to_json(&self) -> MeshResult<Value> {
        serde_json::to_value(&self.graph).map_err(|e| MeshError::serialize("neighbour graph", e))
    }

    #[inline]
    pub fn grid_width(&self) -> usize {
        self.grid_width
    }

    #[inline]
    pub fn is_global_mesh(&self) -> bool {
        self.is_global_mesh
    }

    #[inline]
    pub fn wraps_antimeridian(&self) -> bool {
        self.wraps_antimeridian
    }

    pub fn set_wraps_antimeridian(&mut self, wraps: bool) {
        self.wraps_antimeridian = wraps;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.graph.contains_key(&id)
    }

    pub fn get_graph(&self) -> &BTreeMap<CellId, NeighbourMap> {
        &self.graph
    }

    /// Node ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.graph.keys().copied()
    }

    /// Insert or replace a node. Neighbours are not updated.
    pub fn add_node(&mut self, id: CellId, neighbours: NeighbourMap) {
        self.graph.insert(id, neighbours);
    }

    /// Remove a node without touching the lists that reference it.
    pub fn remove_node(&mut self, id: CellId) -> MeshResult<NeighbourMap> {
        self.graph.remove(&id).ok_or(MeshError::NodeNotFound { id })
    }

    pub fn neighbour_map(&self, id: CellId) -> MeshResult<&NeighbourMap> {
        self.graph.get(&id).ok_or(MeshError::NodeNotFound { id })
    }

    fn neighbour_map_mut(&mut self, id: CellId) -> MeshResult<&mut NeighbourMap> {
        self.graph.get_mut(&id).ok_or(MeshError::NodeNotFound { id })
    }

    /// Neighbours of `id` in `direction`.
    ///
    /// # Errors
    ///
    /// [`MeshError::NodeNotFound`] if `id` is not in the graph.
    pub fn get_neighbours(&self, id: CellId, direction: Direction) -> MeshResult<&[CellId]> {
        Ok(self.neighbour_map(id)?.get(direction))
    }

    /// Add `neighbour` to `id`'s list in `direction` (one side only).
    pub fn add_neighbour(&mut self, id: CellId, direction: Direction, neighbour: CellId) -> MeshResult<()> {
        self.neighbour_map_mut(id)?.insert(direction, neighbour);
        Ok(())
    }

    /// Replace `id`'s list in `direction` (one side only).
    pub fn update_neighbour(&mut self, id: CellId, direction: Direction, neighbours: Vec<CellId>) -> MeshResult<()> {
        self.neighbour_map_mut(id)?.set(direction, neighbours);
        Ok(())
    }

    /// Remove `neighbour` from `id`'s list in `direction` (one side only).
    pub fn remove_neighbour(&mut self, id: CellId, direction: Direction, neighbour: CellId) -> MeshResult<()> {
        self.neighbour_map_mut(id)?.remove(direction, neighbour);
        Ok(())
    }

    /// Record that `b` lies in `direction` of `a`, on both nodes.
    pub fn link(&mut self, a: CellId, direction: Direction, b: CellId) -> MeshResult<()> {
        self.add_neighbour(a, direction, b)?;
        self.add_neighbour(b, direction.opposite(), a)
    }

    /// Remove a node and strip its id from every list that references it.
    pub fn remove_node_and_update_neighbours(&mut self, id: CellId) -> MeshResult<()> {
        let neighbours = self.remove_node(id)?;
        for (_, ids) in neighbours.iter() {
            for neighbour in ids {
                if let Some(map) = self.graph.get_mut(neighbour) {
                    for direction in Direction::ALL {
                        map.remove(direction, id);
                    }
                }
            }
        }
        Ok(())
    }

    /// Hand the corner neighbours of `parent` over to its children.
    ///
    /// `children` are in SW, NW, SE, NE order. The parent keeps its own
    /// entries; only the far side and the children are rewritten.
    pub fn update_corner_neighbours(&mut self, parent: CellId, children: [CellId; 4]) -> MeshResult<()> {
        let [sw, nw, se, ne] = children;
        let corners = [
            (Direction::SouthWest, sw),
            (Direction::NorthWest, nw),
            (Direction::SouthEast, se),
            (Direction::NorthEast, ne),
        ];
        for (direction, child) in corners {
            let neighbours = self.get_neighbours(parent, direction)?.to_vec();
            for neighbour in neighbours {
                self.remove_neighbour(neighbour, direction.opposite(), parent)?;
                self.link(child, direction, neighbour)?;
            }
        }
        Ok(())
    }

    /// Replace `parent` by the four children of its split.
    ///
    /// `children` pairs each child id with its boundary, in SW, NW, SE, NE
    /// order. `edge_neighbours` holds the boundary of every N, E, S and W
    /// neighbour of the parent; each is re-classified against every child.
    pub fn split_node(
        &mut self,
        parent: CellId,
        children: &[(CellId, Boundary); 4],
        edge_neighbours: &[(CellId, Boundary)],
    ) -> MeshResult<()> {
        use Direction::*;
        let [sw, nw, se, ne] = [children[0].0, children[1].0, children[2].0, children[3].0];

        // Children always sit in the same arrangement
        self.add_node(sw, NeighbourMap::from_entries([(NorthEast, vec![ne]), (East, vec![se]), (North, vec![nw])]));
        self.add_node(nw, NeighbourMap::from_entries([(East, vec![ne]), (SouthEast, vec![se]), (South, vec![sw])]));
        self.add_node(ne, NeighbourMap::from_entries([(South, vec![se]), (SouthWest, vec![sw]), (West, vec![nw])]));
        self.add_node(se, NeighbourMap::from_entries([(West, vec![sw]), (NorthWest, vec![nw]), (North, vec![ne])]));

        self.update_corner_neighbours(parent, [sw, nw, se, ne])?;

        for (neighbour, neighbour_bounds) in edge_neighbours {
            for (child, child_bounds) in children {
                if let Some(direction) = self.get_neighbour_case_bounds(child_bounds, neighbour_bounds) {
                    self.link(*child, direction, *neighbour)?;
                }
            }
        }

        self.remove_node_and_update_neighbours(parent)?;
        trace!(target: "env_mesh::graph", cell = parent, sw, nw, se, ne, "Split graph node");
        Ok(())
    }

    /// Offset every id in the graph by `increment`.
    pub fn increment_ids(&mut self, increment: CellId) {
        self.graph = std::mem::take(&mut self.graph)
            .into_iter()
            .map(|(id, map)| (id + increment, map.map_ids(|n| n + increment)))
            .collect();
    }

    /// Direction of `b` as seen from `a`, or `None` if they do not touch.
    pub fn get_neighbour_case(&self, a: &AggregatedCellBox, b: &AggregatedCellBox) -> Option<Direction> {
        self.get_neighbour_case_bounds(a.boundary(), b.boundary())
    }

    /// Direction of `b` as seen from `a`, or `None` if they do not touch.
    ///
    /// Edge neighbours must share a segment of non-zero length; boundaries
    /// meeting at a single point are corner neighbours.
    pub fn get_neighbour_case_bounds(&self, a: &Boundary, b: &Boundary) -> Option<Direction> {
        if self.same_meridian(a.long_max(), b.long_min()) {
            if b.lat_min() == a.lat_max() {
                return Some(Direction::NorthEast);
            }
            if b.lat_max() == a.lat_min() {
                return Some(Direction::SouthEast);
            }
            if overlap(a.lat_min(), a.lat_max(), b.lat_min(), b.lat_max()) > 0.0 {
                return Some(Direction::East);
            }
        }
        if self.same_meridian(a.long_min(), b.long_max()) {
            if b.lat_min() == a.lat_max() {
                return Some(Direction::NorthWest);
            }
            if b.lat_max() == a.lat_min() {
                return Some(Direction::SouthWest);
            }
            if overlap(a.lat_min(), a.lat_max(), b.lat_min(), b.lat_max()) > 0.0 {
                return Some(Direction::West);
            }
        }
        if b.lat_min() == a.lat_max() && self.long_overlap(a, b) > 0.0 {
            return Some(Direction::North);
        }
        if b.lat_max() == a.lat_min() && self.long_overlap(a, b) > 0.0 {
            return Some(Direction::South);
        }
        None
    }

    pub(crate) fn same_meridian(&self, x: f64, y: f64) -> bool {
        x == y || (self.wraps_antimeridian && (x - y).abs() == 360.0)
    }

    fn long_overlap(&self, a: &Boundary, b: &Boundary) -> f64 {
        let (a0, a1) = unwrap_long(a.long_min(), a.long_max());
        let (b0, b1) = unwrap_long(b.long_min(), b.long_max());
        let shifts: &[f64] = if self.wraps_antimeridian { &[-360.0, 0.0, 360.0] } else { &[0.0] };
        shifts
            .iter()
            .map(|s| overlap(a0, a1, b0 + s, b1 + s))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Build the graph of a finished set of leaf cellboxes.
    ///
    /// Leaves are bucketed by the base cell they fall in and each is only
    /// compared with the leaves of the surrounding 3x3 block of base cells.
    /// Pairs are classified in parallel and linked afterwards.
    pub fn initialise_neighbour_graph(cellboxes: &[AggregatedCellBox], grid: &BaseGrid) -> MeshResult<Self> {
        let _timer = OperationTimer::with_context("initialise_neighbour_graph", cellboxes.len());
        let mut graph = Self::for_bounds(grid.bounds(), grid.grid_width());
        let (width, height) = (grid.grid_width(), grid.grid_height());

        let mut buckets: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (index, cellbox) in cellboxes.iter().enumerate() {
            buckets.entry(grid.cell_of(cellbox.boundary())).or_default().push(index);
            graph.add_node(cellbox.id(), NeighbourMap::new());
        }

        let wrap_columns = graph.is_global_mesh;
        let candidates = |(col, row): (usize, usize)| {
            let rows = row.saturating_sub(1)..=(row + 1).min(height - 1);
            let mut cols: Vec<usize> = if wrap_columns {
                [width - 1, 0, 1].iter().map(|d| (col + d) % width).collect()
            } else {
                (col.saturating_sub(1)..=(col + 1).min(width - 1)).collect()
            };
            cols.sort_unstable();
            cols.dedup();
            rows.flat_map(move |r| cols.clone().into_iter().map(move |c| (c, r)))
                .collect::<Vec<_>>()
        };

        let pairs: Vec<(CellId, Direction, CellId)> = cellboxes
            .par_iter()
            .enumerate()
            .flat_map_iter(|(i, a)| {
                let mut found = Vec::new();
                for key in candidates(grid.cell_of(a.boundary())) {
                    let Some(bucket) = buckets.get(&key) else {
                        continue;
                    };
                    for &j in bucket.iter().filter(|&&j| j > i) {
                        let b = &cellboxes[j];
                        if let Some(direction) = graph.get_neighbour_case(a, b) {
                            found.push((a.id(), direction, b.id()));
                        }
                    }
                }
                found
            })
            .collect();

        for (a, direction, b) in pairs {
            graph.link(a, direction, b)?;
        }

        debug!(
            target: "env_mesh::graph",
            nodes = graph.len(),
            grid_width = width,
            global = graph.is_global_mesh,
            "Initialised neighbour graph"
        );
        log_graph_check(graph.asymmetries().len(), "initialise_neighbour_graph");
        Ok(graph)
    }

    /// One-sided edges: `(a, d, b)` where `b` lists no `a` in `d.opposite()`.
    pub fn asymmetries(&self) -> Vec<(CellId, Direction, CellId)> {
        let mut found = Vec::new();
        for (&id, map) in &self.graph {
            for (direction, ids) in map.iter() {
                for &neighbour in ids {
                    let reciprocal = self
                        .graph
                        .get(&neighbour)
                        .is_some_and(|m| m.contains(direction.opposite(), id));
                    if !reciprocal {
                        found.push((id, direction, neighbour));
                    }
                }
            }
        }
        found
    }

    pub fn is_symmetric(&self) -> bool {
        self.asymmetries().is_empty()
    }
}

#[inline]
fn overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    a1.min(b1) - a0.max(b0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::AggData;
    use serde_json::json;

    fn bounds(lat: [f64; 2], long: [f64; 2]) -> Boundary {
        Boundary::new(lat, long, None).unwrap()
    }

    fn graph_over(lat: [f64; 2], long: [f64; 2]) -> NeighbourGraph {
        NeighbourGraph::for_bounds(&bounds(lat, long), 2)
    }

    fn basic_cellboxes() -> Vec<AggregatedCellBox> {
        let grid = BaseGrid::new(bounds([-10.0, 10.0], [-10.0, 10.0]), 10.0, 10.0).unwrap();
        grid.cells()
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(id, b)| AggregatedCellBox::new(b, AggData::new(), id))
            .collect()
    }

    #[test]
    fn test_neighbour_case_edges_and_corners() {
        let g = graph_over([-10.0, 10.0], [-10.0, 10.0]);
        let a = bounds([0.0, 5.0], [0.0, 5.0]);
        assert_eq!(g.get_neighbour_case_bounds(&a, &bounds([0.0, 5.0], [5.0, 10.0])), Some(Direction::East));
        assert_eq!(g.get_neighbour_case_bounds(&a, &bounds([5.0, 10.0], [5.0, 10.0])), Some(Direction::NorthEast));
        assert_eq!(g.get_neighbour_case_bounds(&a, &bounds([-5.0, 0.0], [5.0, 10.0])), Some(Direction::SouthEast));
        assert_eq!(g.get_neighbour_case_bounds(&a, &bounds([-5.0, 0.0], [0.0, 5.0])), Some(Direction::South));
        assert_eq!(g.get_neighbour_case_bounds(&a, &bounds([-5.0, 0.0], [-5.0, 0.0])), Some(Direction::SouthWest));
        assert_eq!(g.get_neighbour_case_bounds(&a, &bounds([2.0, 3.0], [-5.0, 0.0])), Some(Direction::West));
        assert_eq!(g.get_neighbour_case_bounds(&a, &bounds([5.0, 10.0], [-5.0, 0.0])), Some(Direction::NorthWest));
        assert_eq!(g.get_neighbour_case_bounds(&a, &bounds([5.0, 10.0], [1.0, 2.0])), Some(Direction::North));
        assert_eq!(g.get_neighbour_case_bounds(&a, &bounds([6.0, 10.0], [0.0, 5.0])), None);
        assert_eq!(g.get_neighbour_case_bounds(&a, &a.clone()), None);
    }

    #[test]
    fn test_neighbour_case_is_antisymmetric() {
        let g = graph_over([-10.0, 10.0], [-10.0, 10.0]);
        let a = bounds([0.0, 5.0], [0.0, 5.0]);
        let others = [
            bounds([0.0, 2.5], [5.0, 7.5]),
            bounds([5.0, 7.5], [-2.5, 0.0]),
            bounds([5.0, 10.0], [2.5, 5.0]),
            bounds([-5.0, 0.0], [-5.0, 0.0]),
        ];
        for b in &others {
            let forward = g.get_neighbour_case_bounds(&a, b).unwrap();
            assert_eq!(g.get_neighbour_case_bounds(b, &a), Some(forward.opposite()));
        }
    }

    #[test]
    fn test_global_wraparound() {
        let west = bounds([0.0, 10.0], [-180.0, -170.0]);
        let east = bounds([0.0, 10.0], [170.0, 180.0]);

        let global = graph_over([-90.0, 90.0], [-180.0, 180.0]);
        assert!(global.is_global_mesh());
        assert_eq!(global.get_neighbour_case_bounds(&east, &west), Some(Direction::East));
        assert_eq!(global.get_neighbour_case_bounds(&west, &east), Some(Direction::West));

        let regional = graph_over([-10.0, 10.0], [-180.0, -170.0]);
        assert!(!regional.wraps_antimeridian());
        assert_eq!(regional.get_neighbour_case_bounds(&east, &west), None);
    }

    #[test]
    fn test_north_overlap_across_antimeridian() {
        let g = graph_over([0.0, 20.0], [170.0, -170.0]);
        assert!(g.wraps_antimeridian());
        let below = bounds([0.0, 10.0], [170.0, 180.0]);
        let above = bounds([10.0, 20.0], [175.0, -175.0]);
        assert_eq!(g.get_neighbour_case_bounds(&below, &above), Some(Direction::North));
        assert_eq!(g.get_neighbour_case_bounds(&above, &below), Some(Direction::South));
    }

    #[test]
    fn test_initialise_basic_mesh() {
        let cellboxes = basic_cellboxes();
        let grid = BaseGrid::new(bounds([-10.0, 10.0], [-10.0, 10.0]), 10.0, 10.0).unwrap();
        let g = NeighbourGraph::initialise_neighbour_graph(&cellboxes, &grid).unwrap();

        let expected = json!({
            "0": {"1": [3], "2": [1], "3": [], "4": [], "-1": [], "-2": [], "-3": [], "-4": [2]},
            "1": {"1": [], "2": [], "3": [], "4": [], "-1": [], "-2": [0], "-3": [2], "-4": [3]},
            "2": {"1": [], "2": [3], "3": [1], "4": [0], "-1": [], "-2": [], "-3": [], "-4": []},
            "3": {"1": [], "2": [], "3": [], "4": [1], "-1": [0], "-2": [2], "-3": [], "-4": []}
        });
        assert_eq!(g.to_json().unwrap(), expected);
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_json_roundtrip() {
        let cellboxes = basic_cellboxes();
        let grid = BaseGrid::new(bounds([-10.0, 10.0], [-10.0, 10.0]), 10.0, 10.0).unwrap();
        let g = NeighbourGraph::initialise_neighbour_graph(&cellboxes, &grid).unwrap();
        let restored = NeighbourGraph::from_json(&g.to_json().unwrap(), grid.bounds(), 2).unwrap();
        assert_eq!(restored, g);
        assert!(NeighbourGraph::from_json(&json!({"0": {"7": []}}), grid.bounds(), 2).is_err());
    }

    #[test]
    fn test_get_neighbours_unknown_node() {
        let g = graph_over([-10.0, 10.0], [-10.0, 10.0]);
        assert!(matches!(
            g.get_neighbours(5, Direction::North),
            Err(MeshError::NodeNotFound { id: 5 })
        ));
    }

    #[test]
    fn test_remove_node_and_update_neighbours() {
        let cellboxes = basic_cellboxes();
        let grid = BaseGrid::new(bounds([-10.0, 10.0], [-10.0, 10.0]), 10.0, 10.0).unwrap();
        let mut g = NeighbourGraph::initialise_neighbour_graph(&cellboxes, &grid).unwrap();
        g.remove_node_and_update_neighbours(3).unwrap();
        assert_eq!(g.len(), 3);
        assert!(g.get_neighbours(0, Direction::NorthEast).unwrap().is_empty());
        assert!(g.get_neighbours(1, Direction::North).unwrap().is_empty());
        assert!(g.get_neighbours(2, Direction::East).unwrap().is_empty());
        assert!(g.is_symmetric());
        assert!(g.remove_node_and_update_neighbours(3).is_err());
    }

    #[test]
    fn test_split_node() {
        let cellboxes = basic_cellboxes();
        let grid = BaseGrid::new(bounds([-10.0, 10.0], [-10.0, 10.0]), 10.0, 10.0).unwrap();
        let mut g = NeighbourGraph::initialise_neighbour_graph(&cellboxes, &grid).unwrap();

        // Split the south-west cell
        let parent = cellboxes[0].boundary().clone();
        let [sw, nw, se, ne] = parent.split();
        let children = [(4, sw), (5, nw), (6, se), (7, ne)];
        let edge_neighbours = vec![(1, cellboxes[1].boundary().clone()), (2, cellboxes[2].boundary().clone())];
        g.split_node(0, &children, &edge_neighbours).unwrap();

        assert!(!g.contains(0));
        assert!(g.is_symmetric());
        assert_eq!(g.get_neighbours(4, Direction::North).unwrap(), &[5]);
        assert_eq!(g.get_neighbours(4, Direction::NorthEast).unwrap(), &[7]);
        assert_eq!(g.get_neighbours(7, Direction::NorthEast).unwrap(), &[3]);
        assert_eq!(g.get_neighbours(7, Direction::East).unwrap(), &[1]);
        assert_eq!(g.get_neighbours(6, Direction::East).unwrap(), &[1]);
        assert_eq!(g.get_neighbours(1, Direction::West).unwrap(), &[6, 7]);
        assert_eq!(g.get_neighbours(2, Direction::South).unwrap(), &[5, 7]);
        assert_eq!(g.get_neighbours(3, Direction::SouthWest).unwrap(), &[7]);
        // Untouched corner
        assert_eq!(g.get_neighbours(1, Direction::NorthWest).unwrap(), &[2]);
    }

    #[test]
    fn test_increment_ids() {
        let cellboxes = basic_cellboxes();
        let grid = BaseGrid::new(bounds([-10.0, 10.0], [-10.0, 10.0]), 10.0, 10.0).unwrap();
        let mut g = NeighbourGraph::initialise_neighbour_graph(&cellboxes, &grid).unwrap();
        g.increment_ids(10);
        assert_eq!(g.ids().collect::<Vec<_>>(), vec![10, 11, 12, 13]);
        assert_eq!(g.get_neighbours(10, Direction::NorthEast).unwrap(), &[13]);
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_asymmetry_detection() {
        let mut g = graph_over([-10.0, 10.0], [-10.0, 10.0]);
        g.add_node(0, NeighbourMap::new());
        g.add_node(1, NeighbourMap::new());
        g.add_neighbour(0, Direction::East, 1).unwrap();
        assert_eq!(g.asymmetries(), vec![(0, Direction::East, 1)]);
        g.add_neighbour(1, Direction::West, 0).unwrap();
        assert!(g.is_symmetric());
        g.update_neighbour(0, Direction::East, vec![]).unwrap();
        assert!(!g.is_symmetric());
    }

    #[test]
    fn test_neighbour_map_ordering() {
        let mut map = NeighbourMap::new();
        assert!(map.insert(Direction::North, 5));
        assert!(map.insert(Direction::North, 2));
        assert!(!map.insert(Direction::North, 5));
        assert_eq!(map.get(Direction::North), &[2, 5]);
        assert!(map.remove(Direction::North, 2));
        assert!(!map.remove(Direction::North, 2));
        assert_eq!(map.len(), 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"1":[],"2":[],"3":[],"4":[],"-1":[],"-2":[],"-3":[],"-4":[5]}"#);
    }
}

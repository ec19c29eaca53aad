//! Cells and the arena that owns them during a build.
//!
//! A [`Cell`] is the unit of refinement. It either stays a leaf or is
//! replaced by exactly four children covering its quarters. Cells refer to
//! their parent by id into a [`CellArena`]; split parents stay in the arena
//! so that children can fall back to their values.

use crate::CellId;
use crate::aggregated::{AggValue, AggregatedCellBox};
use crate::boundary::Boundary;
use crate::dataloader::{AggData, HomCondition, ValueFillType};
use crate::error::{MeshError, MeshResult};
use crate::metadata::Metadata;

/// A rectangular cell with the data sources evaluated over it.
#[derive(Debug, Clone)]
pub struct Cell {
    id: CellId,
    bounds: Boundary,
    data_source: Vec<Metadata>,
    parent: Option<CellId>,
    split_depth: u32,
    minimum_datapoints: u32,
}

impl Cell {
    /// A root cell with no data sources.
    pub fn new(bounds: Boundary, id: CellId) -> Self {
        Self {
            id,
            bounds,
            data_source: Vec::new(),
            parent: None,
            split_depth: 0,
            minimum_datapoints: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> CellId {
        self.id
    }

    #[inline]
    pub fn bounds(&self) -> &Boundary {
        &self.bounds
    }

    #[inline]
    pub fn data_source(&self) -> &[Metadata] {
        &self.data_source
    }

    pub fn set_data_source(&mut self, data_source: Vec<Metadata>) {
        self.data_source = data_source;
    }

    #[inline]
    pub fn parent(&self) -> Option<CellId> {
        self.parent
    }

    pub fn set_parent(&mut self, parent: Option<CellId>) {
        self.parent = parent;
    }

    #[inline]
    pub fn split_depth(&self) -> u32 {
        self.split_depth
    }

    /// # Errors
    ///
    /// [`MeshError::InvalidArgument`] for a negative or oversized depth.
    pub fn set_split_depth(&mut self, split_depth: i64) -> MeshResult<()> {
        self.split_depth = u32::try_from(split_depth).map_err(|_| {
            MeshError::invalid_argument("split_depth", format!("{} is not a valid split depth", split_depth))
        })?;
        Ok(())
    }

    #[inline]
    pub fn minimum_datapoints(&self) -> u32 {
        self.minimum_datapoints
    }

    /// # Errors
    ///
    /// [`MeshError::InvalidArgument`] for a negative or oversized count.
    pub fn set_minimum_datapoints(&mut self, minimum_datapoints: i64) -> MeshResult<()> {
        self.minimum_datapoints = u32::try_from(minimum_datapoints).map_err(|_| {
            MeshError::invalid_argument(
                "minimum_datapoints",
                format!("{} is not a valid datapoint count", minimum_datapoints),
            )
        })?;
        Ok(())
    }

    /// Whether the data sources call for a split, ignoring depth.
    ///
    /// Any `HOM` verdict forbids the split outright. Otherwise a single `HET`
    /// verdict is enough. `MIN` and `CLR` never trigger a split.
    pub fn should_split_breadth_first(&self) -> MeshResult<bool> {
        let mut heterogeneous = false;
        for metadata in &self.data_source {
            for condition in metadata.hom_conditions(&self.bounds)? {
                match condition {
                    HomCondition::Hom => return Ok(false),
                    HomCondition::Het => heterogeneous = true,
                    HomCondition::Clr | HomCondition::Min => {}
                }
            }
        }
        Ok(heterogeneous)
    }

    /// Whether the cell should split, given the mesh's maximum split depth.
    pub fn should_split(&self, max_split_depth: u32) -> MeshResult<bool> {
        if self.split_depth >= max_split_depth {
            return Ok(false);
        }
        self.should_split_breadth_first()
    }

    /// Quarter the cell into children with ids `first_id..first_id + 4`.
    ///
    /// Children come in SW, NW, SE, NE order, each with its parent's data
    /// sources trimmed to its own bounds.
    pub fn split(&self, first_id: CellId) -> [Cell; 4] {
        let [sw, nw, se, ne] = self.bounds.split();
        let child = |bounds: Boundary, offset: CellId| Cell {
            id: first_id + offset,
            data_source: self.data_source.iter().map(|m| m.for_bounds(&bounds)).collect(),
            bounds,
            parent: Some(self.id),
            split_depth: self.split_depth + 1,
            minimum_datapoints: self.minimum_datapoints,
        };
        [child(sw, 0), child(nw, 1), child(se, 2), child(ne, 3)]
    }
}

/// Owner of every cell created during a build, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct CellArena {
    cells: Vec<Cell>,
}

impl CellArena {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Id the next inserted cell will receive.
    #[inline]
    pub fn next_id(&self) -> CellId {
        self.cells.len()
    }

    /// Add a cell, renumbering it to the next free id.
    pub fn insert(&mut self, mut cell: Cell) -> CellId {
        let id = self.next_id();
        cell.id = id;
        self.cells.push(cell);
        id
    }

    pub fn get(&self, id: CellId) -> MeshResult<&Cell> {
        self.cells.get(id).ok_or(MeshError::CellNotFound { id })
    }

    pub fn get_mut(&mut self, id: CellId) -> MeshResult<&mut Cell> {
        self.cells.get_mut(id).ok_or(MeshError::CellNotFound { id })
    }

    /// Ids of the cells that were never split, in ascending order.
    pub fn leaves(&self) -> Vec<CellId> {
        let mut split = vec![false; self.cells.len()];
        for cell in &self.cells {
            if let Some(parent) = cell.parent {
                split[parent] = true;
            }
        }
        (0..self.cells.len()).filter(|&id| !split[id]).collect()
    }

    /// Split cell `id`, appending its four children. Returns their ids.
    pub fn split(&mut self, id: CellId) -> MeshResult<[CellId; 4]> {
        let first = self.next_id();
        let children = self.get(id)?.split(first);
        self.cells.extend(children);
        Ok([first, first + 1, first + 2, first + 3])
    }

    /// Aggregate every data source of cell `id` over its bounds.
    ///
    /// NaN values are filled according to each source's [`ValueFillType`].
    pub fn aggregate(&self, id: CellId) -> MeshResult<AggregatedCellBox> {
        let cell = self.get(id)?;
        let mut agg_data = AggData::new();

        for (index, metadata) in cell.data_source.iter().enumerate() {
            let loader = metadata.data_loader();
            let values = loader.get_value(&cell.bounds, metadata.data_subset());

            let values = if loader.is_vector() {
                self.check_vector_data(cell, index, values)?
            } else {
                let mut filled = AggData::new();
                for (name, value) in values {
                    let value = if value.is_nan() {
                        match metadata.value_fill_type() {
                            ValueFillType::Parent => self.parent_value(cell, index, &name)?,
                            ValueFillType::Zero => AggValue::Scalar(0.0),
                            ValueFillType::Nan => value,
                        }
                    } else {
                        value
                    };
                    filled.insert(name, value);
                }
                filled
            };
            agg_data.extend(values);
        }

        Ok(AggregatedCellBox::new(cell.bounds.clone(), agg_data, cell.id))
    }

    /// First non-NaN value of `name` up the parent chain of `cell`.
    fn parent_value(&self, cell: &Cell, index: usize, name: &str) -> MeshResult<AggValue> {
        let mut current = cell;
        while let Some(parent_id) = current.parent {
            let parent = self.get(parent_id)?;
            let metadata = Self::metadata_at(parent, index)?;
            let values = metadata.data_loader().get_value(&parent.bounds, metadata.data_subset());
            if let Some(value) = values.get(name)
                && !value.is_nan()
            {
                return Ok(value.clone());
            }
            current = parent;
        }
        Ok(AggValue::Scalar(f64::NAN))
    }

    /// Validate the components of a vector source for `cell`.
    ///
    /// Finite vectors are kept. A vector with a NaN component is replaced as
    /// a whole according to the source's fill type; with `Parent` the first
    /// finite vector up the parent chain is used, and a root keeps NaN.
    ///
    /// # Errors
    ///
    /// [`MeshError::InvalidArgument`] if a parent on the chain does not
    /// strictly enclose its child.
    pub fn check_vector_data(&self, cell: &Cell, index: usize, values: AggData) -> MeshResult<AggData> {
        let finite = |data: &AggData| data.values().all(|v| !v.is_nan());
        if finite(&values) {
            return Ok(values);
        }

        let metadata = Self::metadata_at(cell, index)?;
        match metadata.value_fill_type() {
            ValueFillType::Nan => return Ok(values),
            ValueFillType::Zero => {
                return Ok(values.into_keys().map(|k| (k, AggValue::Scalar(0.0))).collect());
            }
            ValueFillType::Parent => {}
        }

        let mut current = cell;
        while let Some(parent_id) = current.parent {
            let parent = self.get(parent_id)?;
            if parent.bounds == current.bounds || !parent.bounds.encloses(&current.bounds) {
                return Err(MeshError::invalid_argument(
                    "parent",
                    format!(
                        "cell {} ({}) does not strictly enclose its child {} ({})",
                        parent.id, parent.bounds, current.id, current.bounds
                    ),
                ));
            }
            let parent_metadata = Self::metadata_at(parent, index)?;
            let parent_values = parent_metadata
                .data_loader()
                .get_value(&parent.bounds, parent_metadata.data_subset());
            if finite(&parent_values) {
                return Ok(parent_values);
            }
            current = parent;
        }

        Ok(values)
    }

    fn metadata_at(cell: &Cell, index: usize) -> MeshResult<&Metadata> {
        cell.data_source.get(index).ok_or_else(|| {
            MeshError::invalid_argument(
                "data_source",
                format!("cell {} has no data source at position {}", cell.id, index),
            )
        })
    }
}

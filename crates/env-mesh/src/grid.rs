//! The regular base grid a mesh is refined from.

use crate::boundary::{Boundary, unwrap_long, wrap_meridian};
use crate::error::{MeshError, MeshResult};

const EPS: f64 = 1e-9;

/// Regular grid of `cell_width x cell_height` cells over a region.
///
/// Cells are numbered row-major from the south-west corner, running east
/// then north. Where the region is not a whole multiple of the cell size the
/// last row and column are clipped to the region edge.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseGrid {
    bounds: Boundary,
    cell_width: f64,
    cell_height: f64,
}

impl BaseGrid {
    /// # Errors
    ///
    /// [`MeshError::InvalidConfig`] if a cell dimension is not positive.
    pub fn new(bounds: Boundary, cell_width: f64, cell_height: f64) -> MeshResult<Self> {
        if !(cell_width > 0.0) || !(cell_height > 0.0) {
            return Err(MeshError::invalid_config(format!(
                "cell_width ({}) and cell_height ({}) must be positive",
                cell_width, cell_height
            )));
        }
        Ok(Self {
            bounds,
            cell_width,
            cell_height,
        })
    }

    #[inline]
    pub fn bounds(&self) -> &Boundary {
        &self.bounds
    }

    #[inline]
    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    #[inline]
    pub fn cell_height(&self) -> f64 {
        self.cell_height
    }

    /// Number of columns.
    pub fn grid_width(&self) -> usize {
        count(self.bounds.width(), self.cell_width)
    }

    /// Number of rows.
    pub fn grid_height(&self) -> usize {
        count(self.bounds.height(), self.cell_height)
    }

    /// Boundaries of every base cell, in id order.
    pub fn cells(&self) -> MeshResult<Vec<Boundary>> {
        let (long_min, long_max) = unwrap_long(self.bounds.long_min(), self.bounds.long_max());
        let time_range = self.bounds.time_range().copied();
        let (width, height) = (self.grid_width(), self.grid_height());

        let mut cells = Vec::with_capacity(width * height);
        for row in 0..height {
            let lat_min = self.bounds.lat_min() + row as f64 * self.cell_height;
            let lat_max = (lat_min + self.cell_height).min(self.bounds.lat_max());
            for col in 0..width {
                let west = long_min + col as f64 * self.cell_width;
                let east = (west + self.cell_width).min(long_max);
                let (_, west) = wrap_meridian(west);
                let (east, _) = wrap_meridian(east);
                cells.push(Boundary::new([lat_min, lat_max], [west, east], time_range)?);
            }
        }
        Ok(cells)
    }

    /// `(column, row)` of the base cell holding `cell`'s south-west corner.
    pub fn cell_of(&self, cell: &Boundary) -> (usize, usize) {
        let mut dx = cell.long_min() - self.bounds.long_min();
        if dx < 0.0 {
            dx += 360.0;
        }
        let dy = cell.lat_min() - self.bounds.lat_min();
        let col = ((dx / self.cell_width) + EPS).floor().max(0.0) as usize;
        let row = ((dy / self.cell_height) + EPS).floor().max(0.0) as usize;
        (
            col.min(self.grid_width().saturating_sub(1)),
            row.min(self.grid_height().saturating_sub(1)),
        )
    }
}

/// Cells of `size` needed to cover `extent`, allowing for float noise.
fn count(extent: f64, size: f64) -> usize {
    ((extent / size) - EPS).ceil().max(1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(lat: [f64; 2], long: [f64; 2], w: f64, h: f64) -> BaseGrid {
        BaseGrid::new(Boundary::new(lat, long, None).unwrap(), w, h).unwrap()
    }

    #[test]
    fn test_basic_grid() {
        let g = grid([-10.0, 10.0], [-10.0, 10.0], 10.0, 10.0);
        assert_eq!((g.grid_width(), g.grid_height()), (2, 2));
        let cells = g.cells().unwrap();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0], Boundary::new([-10.0, 0.0], [-10.0, 0.0], None).unwrap());
        assert_eq!(cells[1], Boundary::new([-10.0, 0.0], [0.0, 10.0], None).unwrap());
        assert_eq!(cells[2], Boundary::new([0.0, 10.0], [-10.0, 0.0], None).unwrap());
    }

    #[test]
    fn test_global_grid_width() {
        let g = grid([-90.0, 90.0], [-180.0, 180.0], 5.0, 5.0);
        assert_eq!(g.grid_width(), 72);
        assert_eq!(g.grid_height(), 36);
        let cells = g.cells().unwrap();
        assert_eq!(cells[71].long_max(), 180.0);
        assert_eq!(cells[72].lat_min(), -85.0);
    }

    #[test]
    fn test_partial_cells_are_clipped() {
        let g = grid([0.0, 25.0], [0.0, 25.0], 10.0, 10.0);
        assert_eq!(g.grid_width(), 3);
        let cells = g.cells().unwrap();
        assert_eq!(cells[2].long_max(), 25.0);
        assert_eq!(cells[8].lat_max(), 25.0);
    }

    #[test]
    fn test_antimeridian_grid() {
        let g = grid([0.0, 10.0], [170.0, -170.0], 10.0, 10.0);
        let cells = g.cells().unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!((cells[0].long_min(), cells[0].long_max()), (170.0, 180.0));
        assert_eq!((cells[1].long_min(), cells[1].long_max()), (-180.0, -170.0));
        assert_eq!(g.cell_of(&cells[1]), (1, 0));
    }

    #[test]
    fn test_cell_of() {
        let g = grid([-10.0, 10.0], [-10.0, 10.0], 10.0, 10.0);
        let leaf = Boundary::new([2.5, 5.0], [-5.0, -2.5], None).unwrap();
        assert_eq!(g.cell_of(&leaf), (0, 1));
        assert!(BaseGrid::new(g.bounds().clone(), 0.0, 1.0).is_err());
    }
}

//! In-memory datasets behind the data loaders.
//!
//! Two layouts are supported, both exposed through [`TabularSource`]:
//!
//! - [`PointTable`]: scattered rows of lat/long (and optionally a date)
//! - [`GriddedField`]: regular lat/long axes with row-major variables
//!
//! [`Dataset`] is the tagged variant the loaders hold. The layout is fixed
//! when a loader is built and every later call dispatches on the tag.

use chrono::NaiveDate;

use super::aggregation::{AggregationType, aggregate};
use crate::boundary::Boundary;

/// Operations every dataset layout supports.
pub trait TabularSource {
    /// Number of datapoints.
    fn len(&self) -> usize;

    /// Whether the dataset holds no datapoints.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the data variables.
    fn variables(&self) -> &[String];

    /// Subset restricted to `bounds`.
    fn trim(&self, bounds: &Boundary) -> Self
    where
        Self: Sized;

    /// `(lat, long)` of every datapoint, in datapoint order.
    fn positions(&self) -> Vec<(f64, f64)>;

    /// Values of one variable, in datapoint order.
    fn column(&self, variable: &str) -> Option<Vec<f64>>;

    /// Number of datapoints inside `bounds`.
    fn coverage(&self, bounds: &Boundary) -> usize;

    /// Aggregate one variable. Unknown variables aggregate to NaN.
    fn aggregate(&self, variable: &str, agg_type: AggregationType) -> f64 {
        match self.column(variable) {
            Some(values) => aggregate(&values, agg_type),
            None => f64::NAN,
        }
    }
}

/// Scattered datapoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointTable {
    lat: Vec<f64>,
    long: Vec<f64>,
    time: Option<Vec<NaiveDate>>,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl PointTable {
    /// Empty table with the given variables.
    pub fn new(names: Vec<String>, with_time: bool) -> Self {
        let columns = vec![Vec::new(); names.len()];
        Self {
            lat: Vec::new(),
            long: Vec::new(),
            time: with_time.then(Vec::new),
            names,
            columns,
        }
    }

    /// Append a row. `values` must follow the variable order.
    pub fn push(&mut self, lat: f64, long: f64, date: Option<NaiveDate>, values: &[f64]) {
        debug_assert_eq!(values.len(), self.names.len());
        self.lat.push(lat);
        self.long.push(long);
        if let Some(times) = &mut self.time {
            times.push(date.unwrap_or_default());
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push(*value);
        }
    }

    /// Append every row of `other`. Variables must match.
    pub fn extend(&mut self, other: PointTable) {
        self.lat.extend(other.lat);
        self.long.extend(other.long);
        match (&mut self.time, other.time) {
            (Some(times), Some(other_times)) => times.extend(other_times),
            (Some(times), None) => times.resize(self.lat.len(), NaiveDate::default()),
            _ => {}
        }
        for (column, other_column) in self.columns.iter_mut().zip(other.columns) {
            column.extend(other_column);
        }
    }

    fn date(&self, row: usize) -> Option<NaiveDate> {
        self.time.as_ref().map(|t| t[row])
    }

    fn inside<'a>(&'a self, bounds: &'a Boundary) -> impl Iterator<Item = usize> + 'a {
        (0..self.lat.len())
            .filter(move |&i| bounds.contains_datapoint(self.lat[i], self.long[i], self.date(i)))
    }
}

impl TabularSource for PointTable {
    fn len(&self) -> usize {
        self.lat.len()
    }

    fn variables(&self) -> &[String] {
        &self.names
    }

    fn trim(&self, bounds: &Boundary) -> Self {
        let rows: Vec<usize> = self.inside(bounds).collect();
        let pick = |v: &Vec<f64>| rows.iter().map(|&i| v[i]).collect::<Vec<_>>();
        Self {
            lat: pick(&self.lat),
            long: pick(&self.long),
            time: self.time.as_ref().map(|t| rows.iter().map(|&i| t[i]).collect()),
            names: self.names.clone(),
            columns: self.columns.iter().map(pick).collect(),
        }
    }

    fn positions(&self) -> Vec<(f64, f64)> {
        self.lat.iter().copied().zip(self.long.iter().copied()).collect()
    }

    fn column(&self, variable: &str) -> Option<Vec<f64>> {
        let index = self.names.iter().position(|n| n == variable)?;
        Some(self.columns[index].clone())
    }

    fn coverage(&self, bounds: &Boundary) -> usize {
        self.inside(bounds).count()
    }
}

/// Variables sampled on a regular lat/long grid.
///
/// Each variable is stored row-major: `values[lat_index * long.len() + long_index]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GriddedField {
    lat: Vec<f64>,
    long: Vec<f64>,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl GriddedField {
    /// Build a grid from axes and row-major variables.
    ///
    /// Returns `None` if any variable does not have `lat.len() * long.len()` values.
    pub fn new(lat: Vec<f64>, long: Vec<f64>, variables: Vec<(String, Vec<f64>)>) -> Option<Self> {
        let size = lat.len() * long.len();
        if variables.iter().any(|(_, v)| v.len() != size) {
            return None;
        }
        let (names, columns) = variables.into_iter().unzip();
        Some(Self {
            lat,
            long,
            names,
            columns,
        })
    }

    #[inline]
    pub fn lat_axis(&self) -> &[f64] {
        &self.lat
    }

    #[inline]
    pub fn long_axis(&self) -> &[f64] {
        &self.long
    }

    fn lat_indices(&self, bounds: &Boundary) -> Vec<usize> {
        (0..self.lat.len())
            .filter(|&i| self.lat[i] > bounds.lat_min() && self.lat[i] <= bounds.lat_max())
            .collect()
    }

    fn long_indices(&self, bounds: &Boundary) -> Vec<usize> {
        let (min, max) = (bounds.long_min(), bounds.long_max());
        (0..self.long.len())
            .filter(|&j| {
                let x = self.long[j];
                if bounds.crosses_antimeridian() {
                    x > min || x <= max
                } else {
                    x > min && x <= max
                }
            })
            .collect()
    }
}

impl TabularSource for GriddedField {
    fn len(&self) -> usize {
        self.lat.len() * self.long.len()
    }

    fn variables(&self) -> &[String] {
        &self.names
    }

    fn trim(&self, bounds: &Boundary) -> Self {
        let rows = self.lat_indices(bounds);
        let cols = self.long_indices(bounds);
        let width = self.long.len();
        let columns = self
            .columns
            .iter()
            .map(|values| {
                rows.iter()
                    .flat_map(|&i| cols.iter().map(move |&j| values[i * width + j]))
                    .collect()
            })
            .collect();

        Self {
            lat: rows.iter().map(|&i| self.lat[i]).collect(),
            long: cols.iter().map(|&j| self.long[j]).collect(),
            names: self.names.clone(),
            columns,
        }
    }

    fn positions(&self) -> Vec<(f64, f64)> {
        self.lat
            .iter()
            .flat_map(|&lat| self.long.iter().map(move |&long| (lat, long)))
            .collect()
    }

    fn column(&self, variable: &str) -> Option<Vec<f64>> {
        let index = self.names.iter().position(|n| n == variable)?;
        Some(self.columns[index].clone())
    }

    fn coverage(&self, bounds: &Boundary) -> usize {
        self.lat_indices(bounds).len() * self.long_indices(bounds).len()
    }
}

/// A dataset in one of the supported layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Points(PointTable),
    Grid(GriddedField),
}

impl From<PointTable> for Dataset {
    fn from(table: PointTable) -> Self {
        Dataset::Points(table)
    }
}

impl From<GriddedField> for Dataset {
    fn from(grid: GriddedField) -> Self {
        Dataset::Grid(grid)
    }
}

impl TabularSource for Dataset {
    fn len(&self) -> usize {
        match self {
            Dataset::Points(t) => t.len(),
            Dataset::Grid(g) => g.len(),
        }
    }

    fn variables(&self) -> &[String] {
        match self {
            Dataset::Points(t) => t.variables(),
            Dataset::Grid(g) => g.variables(),
        }
    }

    fn trim(&self, bounds: &Boundary) -> Self {
        match self {
            Dataset::Points(t) => Dataset::Points(t.trim(bounds)),
            Dataset::Grid(g) => Dataset::Grid(g.trim(bounds)),
        }
    }

    fn positions(&self) -> Vec<(f64, f64)> {
        match self {
            Dataset::Points(t) => t.positions(),
            Dataset::Grid(g) => g.positions(),
        }
    }

    fn column(&self, variable: &str) -> Option<Vec<f64>> {
        match self {
            Dataset::Points(t) => t.column(variable),
            Dataset::Grid(g) => g.column(variable),
        }
    }

    fn coverage(&self, bounds: &Boundary) -> usize {
        match self {
            Dataset::Points(t) => t.coverage(bounds),
            Dataset::Grid(g) => g.coverage(bounds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(lat: [f64; 2], long: [f64; 2]) -> Boundary {
        Boundary::new(lat, long, None).unwrap()
    }

    fn sample_grid() -> GriddedField {
        // 3 x 3 grid at -1, 0, 1 with value = row * 3 + col
        let axis = vec![-1.0, 0.0, 1.0];
        let values = (0..9).map(f64::from).collect();
        GriddedField::new(axis.clone(), axis, vec![("v".into(), values)]).unwrap()
    }

    #[test]
    fn test_grid_trim_is_half_open() {
        let grid = sample_grid();
        // (min, max] keeps 0 and 1 on both axes
        let trimmed = grid.trim(&bounds([-1.0, 1.0], [-1.0, 1.0]));
        assert_eq!(trimmed.len(), 4);
        assert_eq!(trimmed.column("v").unwrap(), vec![4.0, 5.0, 7.0, 8.0]);
        assert_eq!(grid.coverage(&bounds([-1.0, 1.0], [-1.0, 1.0])), 4);
    }

    #[test]
    fn test_grid_rejects_bad_shape() {
        assert!(GriddedField::new(vec![0.0], vec![0.0, 1.0], vec![("v".into(), vec![1.0])]).is_none());
    }

    #[test]
    fn test_point_trim_with_time() {
        let mut table = PointTable::new(vec!["v".into()], true);
        let jan = NaiveDate::from_ymd_opt(2000, 1, 15);
        let jul = NaiveDate::from_ymd_opt(2000, 7, 15);
        table.push(0.5, 0.5, jan, &[1.0]);
        table.push(0.5, 0.5, jul, &[2.0]);
        table.push(5.0, 5.0, jan, &[3.0]);

        let b = Boundary::with_dates([0.0, 1.0], [0.0, 1.0], "2000-01-01", "2000-01-31").unwrap();
        let trimmed = table.trim(&b);
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed.column("v").unwrap(), vec![1.0]);

        // No time range on the boundary keeps every date
        assert_eq!(table.coverage(&bounds([0.0, 1.0], [0.0, 1.0])), 2);
    }

    #[test]
    fn test_point_trim_across_antimeridian() {
        let mut table = PointTable::new(vec!["v".into()], false);
        table.push(1.0, 179.0, None, &[1.0]);
        table.push(1.0, -179.0, None, &[2.0]);
        table.push(1.0, 0.0, None, &[3.0]);
        let trimmed = table.trim(&bounds([0.0, 2.0], [170.0, -170.0]));
        assert_eq!(trimmed.column("v").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_dataset_dispatch() {
        let dataset = Dataset::from(sample_grid());
        assert_eq!(dataset.variables(), ["v".to_string()]);
        assert_eq!(dataset.aggregate("v", AggregationType::Max), 8.0);
        assert!(dataset.aggregate("missing", AggregationType::Mean).is_nan());
    }
}

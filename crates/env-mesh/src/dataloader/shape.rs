//! Synthetic datasets for testing and demonstrating the mesh builder.
//!
//! Every shape is sampled on an `ny` x `nx` grid spanning the initial
//! boundary, with values in `[0, 1]` scaled by a multiplier.

use super::GriddedField;
use super::factory::Params;
use crate::boundary::{Boundary, unwrap_long};
use crate::error::{MeshError, MeshResult};

const DEFAULT_RESOLUTION: usize = 101;

/// Default data name of scalar shapes.
pub(crate) const SCALAR_DATA_NAME: &str = "dummy_data";

/// Default data names of vector shapes.
pub(crate) const VECTOR_DATA_NAMES: [&str; 2] = ["dummy_data_u", "dummy_data_v"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Circle { centre: Option<[f64; 2]>, radius: f64 },
    Rectangle { centre: Option<[f64; 2]>, width: f64, height: f64 },
    Gradient { vertical: bool },
    Checkerboard { gridsize: [f64; 2] },
}

/// Sample positions of a shape. `long` is unwrapped across the antimeridian.
struct Axes {
    lat: Vec<f64>,
    long: Vec<f64>,
}

impl Axes {
    fn new(bounds: &Boundary, nx: usize, ny: usize) -> Self {
        let (long_min, long_max) = unwrap_long(bounds.long_min(), bounds.long_max());
        Self {
            lat: linspace(bounds.lat_min(), bounds.lat_max(), ny),
            long: linspace(long_min, long_max, nx),
        }
    }

    /// Longitude axis mapped back into `[-180, 180]`.
    fn wrapped_long(&self) -> Vec<f64> {
        self.long
            .iter()
            .map(|&x| if x > 180.0 { x - 360.0 } else { x })
            .collect()
    }

    fn centre(&self) -> [f64; 2] {
        [self.lat[self.lat.len() / 2], self.long[self.long.len() / 2]]
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

impl Shape {
    fn from_params(kind: &str, params: &Params<'_>) -> MeshResult<Self> {
        let shape = match kind {
            "circle" => Shape::Circle {
                centre: params.pair("centre")?,
                radius: params.f64_or("radius", 1.0)?,
            },
            "rectangle" => Shape::Rectangle {
                centre: params.pair("centre")?,
                width: params.f64_or("width", 1.0)?,
                height: params.f64_or("height", 1.0)?,
            },
            "gradient" => Shape::Gradient {
                vertical: params.bool_or("vertical", true),
            },
            "checkerboard" => Shape::Checkerboard {
                gridsize: params.pair("gridsize")?.unwrap_or([1.0, 1.0]),
            },
            other => return Err(MeshError::UnknownDataLoader { name: other.to_string() }),
        };
        Ok(shape)
    }

    /// Value at grid position `(i, j)`, before scaling.
    fn sample(&self, axes: &Axes, i: usize, j: usize) -> f64 {
        let (lat, long) = (axes.lat[i], axes.long[j]);
        let inside = |b: bool| if b { 1.0 } else { 0.0 };
        match *self {
            Shape::Circle { centre, radius } => {
                let [cy, cx] = centre.unwrap_or_else(|| axes.centre());
                inside((long - cx).hypot(lat - cy) <= radius)
            }
            Shape::Rectangle { centre, width, height } => {
                let [cy, cx] = centre.unwrap_or_else(|| axes.centre());
                inside((long - cx).abs() <= width && (lat - cy).abs() <= height)
            }
            Shape::Gradient { vertical } => {
                let (index, n) = if vertical { (i, axes.lat.len()) } else { (j, axes.long.len()) };
                if n == 1 { 0.0 } else { index as f64 / (n - 1) as f64 }
            }
            Shape::Checkerboard { gridsize: [gx, gy] } => {
                let col = ((long - axes.long[0]) / gx).floor() as i64;
                let row = ((lat - axes.lat[0]) / gy).floor() as i64;
                inside((row + col).rem_euclid(2) == 1)
            }
        }
    }

    fn sample_all(&self, axes: &Axes) -> Vec<f64> {
        (0..axes.lat.len())
            .flat_map(|i| (0..axes.long.len()).map(move |j| (i, j)))
            .map(|(i, j)| self.sample(axes, i, j))
            .collect()
    }
}

fn resolution(params: &Params<'_>) -> MeshResult<(usize, usize)> {
    let nx = params.usize_or("nx", DEFAULT_RESOLUTION)?;
    let ny = params.usize_or("ny", DEFAULT_RESOLUTION)?;
    if nx == 0 || ny == 0 {
        return Err(MeshError::invalid_argument("nx/ny", "shape resolution must be at least 1"));
    }
    Ok((nx, ny))
}

/// Sample a scalar shape (`circle`, `rectangle`, `gradient`, `checkerboard`).
pub(crate) fn scalar_shape(kind: &str, bounds: &Boundary, params: &Params<'_>) -> MeshResult<(String, GriddedField)> {
    let shape = Shape::from_params(kind, params)?;
    let (nx, ny) = resolution(params)?;
    let multiplier = params.f64_or("multiplier", 1.0)?;
    let data_name = params.str("data_name").unwrap_or(SCALAR_DATA_NAME).to_string();

    let axes = Axes::new(bounds, nx, ny);
    let values = shape.sample_all(&axes).into_iter().map(|v| v * multiplier).collect();
    let grid = GriddedField::new(axes.lat.clone(), axes.wrapped_long(), vec![(data_name.clone(), values)])
        .ok_or_else(|| MeshError::invalid_argument(kind, "shape grid has inconsistent dimensions"))?;
    Ok((data_name, grid))
}

/// Sample a vector shape (`vector_circle`, `vector_rectangle`, `vector_gradient`).
///
/// Circles and rectangles set both components to the mask. Gradients run
/// along `v` when vertical and along `u` otherwise.
pub(crate) fn vector_shape(
    kind: &str,
    bounds: &Boundary,
    params: &Params<'_>,
) -> MeshResult<([String; 2], GriddedField)> {
    let base = kind.strip_prefix("vector_").unwrap_or(kind);
    let shape = Shape::from_params(base, params)?;
    let (nx, ny) = resolution(params)?;
    let multiplier = params.f64_or("multiplier", 1.0)?;
    let multiplier_u = params.f64_or("multiplier_u", multiplier)?;
    let multiplier_v = params.f64_or("multiplier_v", multiplier)?;

    let names: [String; 2] = match params.str("data_name") {
        Some(joined) => {
            let mut parts = joined.split(',').map(|s| s.trim().to_string());
            match (parts.next(), parts.next(), parts.next()) {
                (Some(u), Some(v), None) => [u, v],
                _ => {
                    return Err(MeshError::invalid_argument(
                        "data_name",
                        format!("'{}' should name two components separated by a comma", joined),
                    ));
                }
            }
        }
        None => VECTOR_DATA_NAMES.map(String::from),
    };

    let axes = Axes::new(bounds, nx, ny);
    let samples = shape.sample_all(&axes);
    let (u, v): (Vec<f64>, Vec<f64>) = match shape {
        Shape::Gradient { vertical: true } => samples.iter().map(|s| (0.0, s * multiplier_v)).unzip(),
        Shape::Gradient { vertical: false } => samples.iter().map(|s| (s * multiplier_u, 0.0)).unzip(),
        _ => samples.iter().map(|s| (s * multiplier_u, s * multiplier_v)).unzip(),
    };

    let grid = GriddedField::new(
        axes.lat.clone(),
        axes.wrapped_long(),
        vec![(names[0].clone(), u), (names[1].clone(), v)],
    )
    .ok_or_else(|| MeshError::invalid_argument(kind, "shape grid has inconsistent dimensions"))?;
    Ok((names, grid))
}

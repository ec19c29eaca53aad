//! Data sources evaluated by the mesh builder.
//!
//! The builder never reads files itself. Every data source is a
//! [`DataLoader`] that answers three questions about a boundary:
//!
//! - which datapoints fall inside it ([`DataLoader::trim_datapoints`])
//! - what the aggregated value is ([`DataLoader::get_value`])
//! - whether the datapoints are homogeneous ([`DataLoader::get_hom_condition`])
//!
//! Loaders are created by [`DataLoaderFactory`] from the `data_sources`
//! section of a config.

mod aggregation;
mod dataset;
mod factory;
mod files;
mod scalar;
mod shape;
mod vector;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use aggregation::{AggregationType, HomCondition, aggregate};
pub use dataset::{Dataset, GriddedField, PointTable, TabularSource};
pub use factory::DataLoaderFactory;
pub use scalar::ScalarLoader;
pub use vector::VectorLoader;

use crate::aggregated::AggValue;
use crate::boundary::Boundary;
use crate::error::{MeshError, MeshResult};

/// Loader names accepted by [`DataLoaderFactory`].
pub const KNOWN_LOADERS: &[&str] = &[
    "circle",
    "rectangle",
    "gradient",
    "checkerboard",
    "scalar_csv",
    "scalar_grid",
    "vector_circle",
    "vector_rectangle",
    "vector_gradient",
    "vector_csv",
    "vector_grid",
];

/// Aggregated values keyed by data name.
pub type AggData = BTreeMap<String, AggValue>;

/// A criterion for deciding whether a cellbox should split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SplittingCondition {
    /// Split on the share of datapoints above `threshold`.
    Threshold {
        threshold: f64,
        upper_bound: f64,
        lower_bound: f64,
        #[serde(default)]
        split_lock: bool,
    },
    /// Split on properties of a vector field.
    Vector {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        curl: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dmag: Option<f64>,
    },
}

impl SplittingCondition {
    const THRESHOLD_KEYS: [&'static str; 4] = ["threshold", "upper_bound", "lower_bound", "split_lock"];
    const VECTOR_KEYS: [&'static str; 2] = ["curl", "dmag"];

    /// Parse one entry of a `splitting_conditions` list.
    ///
    /// The entry may be the condition itself or a single-key object wrapping
    /// it under the data name, e.g. `{"elevation": {"threshold": ..}}`.
    pub fn from_value(value: &Value) -> MeshResult<Self> {
        let mut object = value
            .as_object()
            .ok_or_else(|| MeshError::invalid_config(format!("splitting condition {} is not an object", value)))?;
        if object.len() == 1
            && let Some(Value::Object(inner)) = object.values().next()
        {
            object = inner;
        }

        for key in object.keys() {
            if !Self::THRESHOLD_KEYS.contains(&key.as_str()) && !Self::VECTOR_KEYS.contains(&key.as_str()) {
                return Err(MeshError::UnknownHomogeneityCondition { key: key.clone() });
            }
        }

        let number = |key: &str| -> MeshResult<Option<f64>> {
            match object.get(key) {
                None => Ok(None),
                Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                    MeshError::invalid_config(format!("splitting condition '{}' must be a number", key))
                }),
            }
        };

        if object.contains_key("threshold") {
            let required = |key: &str| -> MeshResult<f64> {
                number(key)?.ok_or_else(|| {
                    MeshError::invalid_config(format!("threshold splitting condition is missing '{}'", key))
                })
            };
            return Ok(SplittingCondition::Threshold {
                threshold: required("threshold")?,
                upper_bound: required("upper_bound")?,
                lower_bound: required("lower_bound")?,
                split_lock: object.get("split_lock").and_then(Value::as_bool).unwrap_or(false),
            });
        }

        let curl = number("curl")?;
        let dmag = number("dmag")?;
        if curl.is_none() && dmag.is_none() {
            return Err(MeshError::invalid_config(
                "splitting condition needs 'threshold', 'curl' or 'dmag'",
            ));
        }
        Ok(SplittingCondition::Vector { curl, dmag })
    }

    /// Parse the `splitting_conditions` list of a loader's params, if any.
    pub fn list_from_params(params: &Map<String, Value>) -> MeshResult<Vec<Self>> {
        match params.get("splitting_conditions") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items.iter().map(Self::from_value).collect(),
            Some(other) => Ok(vec![Self::from_value(other)?]),
        }
    }
}

/// How a cellbox is filled when its data source has no value for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFillType {
    /// Walk up the parent chain until a value is found.
    #[default]
    Parent,
    /// Use 0.
    Zero,
    /// Leave the value as NaN.
    Nan,
}

impl ValueFillType {
    /// Parse the `value_fill_type(s)` param of a loader. Defaults to `Parent`.
    pub fn from_params(params: &Map<String, Value>) -> MeshResult<Self> {
        let raw = params
            .get("value_fill_type")
            .or_else(|| params.get("value_fill_types"));
        match raw {
            None | Some(Value::Null) => Ok(ValueFillType::Parent),
            Some(Value::String(s)) => match s.to_lowercase().as_str() {
                "parent" => Ok(ValueFillType::Parent),
                "zero" | "0" => Ok(ValueFillType::Zero),
                "nan" => Ok(ValueFillType::Nan),
                _ => Err(MeshError::invalid_argument("value_fill_type", format!("'{}' is not parent, zero or nan", s))),
            },
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Ok(ValueFillType::Zero),
            Some(other) => Err(MeshError::invalid_argument(
                "value_fill_type",
                format!("{} is not parent, zero or nan", other),
            )),
        }
    }
}

impl fmt::Display for ValueFillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueFillType::Parent => "parent",
            ValueFillType::Zero => "zero",
            ValueFillType::Nan => "nan",
        };
        write!(f, "{}", name)
    }
}

/// A source of geophysical data the mesh can be refined against.
///
/// Loaders are shared read-only between every cellbox of a build; the
/// per-cellbox subset of datapoints is passed in explicitly as `data`.
pub trait DataLoader: Send + Sync + fmt::Debug {
    /// Loader name as given in the config.
    fn name(&self) -> &str;

    /// Names of the values this loader produces.
    fn data_names(&self) -> &[String];

    /// Datapoints trimmed to the mesh region.
    fn dataset(&self) -> &Dataset;

    /// Aggregation applied by [`DataLoader::get_value`].
    fn aggregate_type(&self) -> AggregationType;

    /// Datapoints a boundary needs before its homogeneity is judged.
    fn min_dp(&self) -> usize;

    /// Whether the values form a vector (one component per data name).
    fn is_vector(&self) -> bool {
        false
    }

    /// Subset of `data` inside `bounds`.
    fn trim_datapoints(&self, bounds: &Boundary, data: &Dataset) -> Dataset {
        data.trim(bounds)
    }

    /// Number of the loader's datapoints inside `bounds`.
    fn calculate_coverage(&self, bounds: &Boundary) -> usize {
        self.dataset().coverage(bounds)
    }

    /// Aggregated value of each data name over the datapoints in `bounds`.
    fn get_value(&self, bounds: &Boundary, data: &Dataset) -> AggData {
        let trimmed = self.trim_datapoints(bounds, data);
        self.data_names()
            .iter()
            .map(|name| {
                let value = trimmed.aggregate(name, self.aggregate_type());
                (name.clone(), AggValue::Scalar(value))
            })
            .collect()
    }

    /// Homogeneity of the datapoints in `bounds` against one condition.
    fn get_hom_condition(
        &self,
        bounds: &Boundary,
        data: &Dataset,
        condition: &SplittingCondition,
    ) -> MeshResult<HomCondition>;
}

/// Classify the share of values above `threshold`.
///
/// Shared by the scalar loader and the magnitude test of the vector loader.
pub(crate) fn threshold_condition(values: &[f64], threshold: f64, upper: f64, lower: f64, split_lock: bool) -> HomCondition {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let frac = if finite.is_empty() {
        0.0
    } else {
        finite.iter().filter(|&&v| v > threshold).count() as f64 / finite.len() as f64
    };

    if frac <= lower {
        HomCondition::Clr
    } else if frac >= upper {
        if split_lock { HomCondition::Hom } else { HomCondition::Clr }
    } else {
        HomCondition::Het
    }
}

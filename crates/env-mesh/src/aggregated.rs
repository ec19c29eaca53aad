//! Leaf cellboxes after aggregation.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use crate::CellId;
use crate::boundary::{Boundary, TimeRange};
use crate::dataloader::AggData;
use crate::error::{MeshError, MeshResult};

/// Keys every serialised cellbox carries besides its data.
pub const GEOMETRY_KEYS: [&str; 6] = ["geometry", "cx", "cy", "dcx", "dcy", "id"];

/// One aggregated attribute of a cellbox.
///
/// Serialises untagged: numbers, lists of numbers, booleans or strings.
/// NaN is written as `null` and read back as NaN.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AggValue {
    Scalar(f64),
    Vector(Vec<f64>),
    Bool(bool),
    Text(String),
}

impl AggValue {
    /// Scalar value, if this is a scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AggValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether the value carries no data (a NaN scalar or an all-NaN vector).
    pub fn is_nan(&self) -> bool {
        match self {
            AggValue::Scalar(v) => v.is_nan(),
            AggValue::Vector(v) => v.iter().all(|x| x.is_nan()),
            _ => false,
        }
    }

    pub fn to_json(&self) -> Value {
        let number = |v: f64| Number::from_f64(v).map_or(Value::Null, Value::Number);
        match self {
            AggValue::Scalar(v) => number(*v),
            AggValue::Vector(vs) => Value::Array(vs.iter().map(|v| number(*v)).collect()),
            AggValue::Bool(b) => Value::Bool(*b),
            AggValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl PartialEq for AggValue {
    /// NaN compares equal to NaN so that round-tripped meshes compare equal.
    fn eq(&self, other: &Self) -> bool {
        let same = |a: f64, b: f64| a == b || (a.is_nan() && b.is_nan());
        match (self, other) {
            (AggValue::Scalar(a), AggValue::Scalar(b)) => same(*a, *b),
            (AggValue::Vector(a), AggValue::Vector(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same(*x, *y))
            }
            (AggValue::Bool(a), AggValue::Bool(b)) => a == b,
            (AggValue::Text(a), AggValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl TryFrom<Value> for AggValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(AggValue::Scalar(f64::NAN)),
            Value::Bool(b) => Ok(AggValue::Bool(b)),
            Value::Number(n) => n
                .as_f64()
                .map(AggValue::Scalar)
                .ok_or_else(|| format!("{} is not representable as f64", n)),
            Value::String(s) => Ok(AggValue::Text(s)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Null => Ok(f64::NAN),
                    Value::Number(n) => n.as_f64().ok_or_else(|| format!("{} is not representable as f64", n)),
                    other => Err(format!("vector component {} is not a number", other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(AggValue::Vector),
            Value::Object(_) => Err("nested objects are not cellbox attributes".to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for AggValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        AggValue::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl From<f64> for AggValue {
    fn from(v: f64) -> Self {
        AggValue::Scalar(v)
    }
}

impl From<bool> for AggValue {
    fn from(v: bool) -> Self {
        AggValue::Bool(v)
    }
}

impl From<&str> for AggValue {
    fn from(v: &str) -> Self {
        AggValue::Text(v.to_string())
    }
}

impl fmt::Display for AggValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggValue::Scalar(v) => write!(f, "{}", v),
            AggValue::Vector(vs) => write!(f, "{:?}", vs),
            AggValue::Bool(b) => write!(f, "{}", b),
            AggValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A leaf cellbox with the aggregated value of every data source.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedCellBox {
    id: CellId,
    boundary: Boundary,
    agg_data: AggData,
}

impl AggregatedCellBox {
    pub fn new(boundary: Boundary, agg_data: AggData, id: CellId) -> Self {
        Self { id, boundary, agg_data }
    }

    #[inline]
    pub fn id(&self) -> CellId {
        self.id
    }

    #[inline]
    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    #[inline]
    pub fn agg_data(&self) -> &AggData {
        &self.agg_data
    }

    pub fn get(&self, name: &str) -> Option<&AggValue> {
        self.agg_data.get(name)
    }

    /// Merge `values` into the aggregated data, overwriting existing keys.
    pub fn update(&mut self, values: AggData) {
        self.agg_data.extend(values);
    }

    pub(crate) fn set_id(&mut self, id: CellId) {
        self.id = id;
    }

    /// Whether `(lat, long)` lies in the cellbox (south/west edges inclusive).
    pub fn contains_point(&self, lat: f64, long: f64) -> bool {
        self.boundary.contains_point(lat, long)
    }

    /// JSON object with the geometry, centroid, half-widths, id and data.
    pub fn to_json(&self) -> Map<String, Value> {
        let b = &self.boundary;
        let mut object = Map::new();
        for (name, value) in &self.agg_data {
            object.insert(name.clone(), value.to_json());
        }
        object.insert("geometry".into(), Value::String(b.to_poly_string()));
        object.insert("cx".into(), AggValue::Scalar(b.cx()).to_json());
        object.insert("cy".into(), AggValue::Scalar(b.cy()).to_json());
        object.insert("dcx".into(), AggValue::Scalar(b.dcx()).to_json());
        object.insert("dcy".into(), AggValue::Scalar(b.dcy()).to_json());
        object.insert("id".into(), Value::String(self.id.to_string()));
        object
    }

    /// Rebuild a cellbox from [`AggregatedCellBox::to_json`] output.
    ///
    /// The geometry does not record time, so the boundary takes `time_range`.
    pub fn from_json(object: &Map<String, Value>, time_range: Option<TimeRange>) -> MeshResult<Self> {
        let id = match object.get("id") {
            Some(Value::String(s)) => s
                .parse::<CellId>()
                .map_err(|_| MeshError::invalid_argument("id", format!("'{}' is not a cellbox id", s)))?,
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|n| n as CellId)
                .ok_or_else(|| MeshError::invalid_argument("id", format!("{} is not a cellbox id", n)))?,
            _ => return Err(MeshError::invalid_argument("id", "cellbox has no id")),
        };
        let geometry = object
            .get("geometry")
            .and_then(Value::as_str)
            .ok_or_else(|| MeshError::invalid_argument("geometry", format!("cellbox {} has no geometry", id)))?;
        let boundary = Boundary::from_poly_string(geometry)?.with_time_range(time_range);

        let mut agg_data = AggData::new();
        for (name, value) in object {
            if GEOMETRY_KEYS.contains(&name.as_str()) {
                continue;
            }
            let value = AggValue::try_from(value.clone())
                .map_err(|details| MeshError::invalid_argument(name.as_str(), details))?;
            agg_data.insert(name.clone(), value);
        }

        Ok(Self { id, boundary, agg_data })
    }
}

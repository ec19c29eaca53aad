//! Mesh export to JSON and GeoJSON files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::aggregated::{AggValue, AggregatedCellBox};
use crate::environment_mesh::EnvironmentMesh;
use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::{OperationTimer, log_io_operation};

/// Keys dropped from GeoJSON properties.
const DROPPED_PROPERTIES: [&str; 5] = ["geometry", "cx", "cy", "dcx", "dcy"];

/// Output formats accepted by [`EnvironmentMesh::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    GeoJson,
}

impl ExportFormat {
    /// Parse a format name, case-insensitively.
    ///
    /// # Errors
    ///
    /// [`MeshError::UnsupportedFormat`] for anything but JSON and GEOJSON.
    pub fn parse(name: &str) -> MeshResult<Self> {
        match name.to_ascii_uppercase().as_str() {
            "JSON" => Ok(Self::Json),
            "GEOJSON" => Ok(Self::GeoJson),
            _ => Err(MeshError::UnsupportedFormat {
                format: name.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::GeoJson => "GEOJSON",
        }
    }
}

/// Extra export options, read from a format-params file.
///
/// ```json
/// { "data_name": ["SIC", "elevation"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FormatParams {
    /// Attributes to keep in GeoJSON properties. All are kept when unset.
    #[serde(default, deserialize_with = "one_or_many")]
    pub data_name: Option<Vec<String>>,
}

impl FormatParams {
    pub fn from_file(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| MeshError::io_read(path, e))?;
        serde_json::from_str(&contents).map_err(|e| MeshError::parse_error(path, e.to_string()))
    }
}

fn one_or_many<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    }))
}

impl EnvironmentMesh {
    /// The mesh as a GeoJSON `FeatureCollection`, one feature per cellbox.
    ///
    /// Vector attributes are reduced to their mean, booleans to 1 or NaN,
    /// and non-finite numbers to NaN. NaN is written as `null`. When
    /// `data_names` is given only those attributes (and `id`) are kept.
    pub fn to_geojson(&self, data_names: Option<&[String]>) -> MeshResult<Value> {
        let collection = FeatureCollection {
            bbox: None,
            features: self
                .cellboxes()
                .iter()
                .map(|cellbox| geojson_feature(cellbox, data_names))
                .collect(),
            foreign_members: None,
        };
        serde_json::to_value(&collection).map_err(|e| MeshError::serialize("GeoJSON feature collection", e))
    }

    /// Write the mesh to `path` as `format` (JSON or GEOJSON).
    pub fn save(&self, path: impl AsRef<Path>, format: &str, params: Option<&FormatParams>) -> MeshResult<()> {
        let path = path.as_ref();
        let format = ExportFormat::parse(format)?;
        let _timer = OperationTimer::with_context("save_mesh", self.cellboxes().len());

        let value = match format {
            ExportFormat::Json => self.to_json()?,
            ExportFormat::GeoJson => self.to_geojson(params.and_then(|p| p.data_name.as_deref()))?,
        };

        let result = write_json(path, &value);
        log_io_operation("save", path, Some(format.as_str()), result.is_ok());
        result
    }
}

fn geojson_feature(cellbox: &AggregatedCellBox, data_names: Option<&[String]>) -> Feature {
    let mut properties = JsonObject::new();
    for (name, value) in cellbox.to_json() {
        if DROPPED_PROPERTIES.contains(&name.as_str()) {
            continue;
        }
        if name != "id" && data_names.is_some_and(|keep| !keep.iter().any(|k| *k == name)) {
            continue;
        }
        let property = match cellbox.get(&name) {
            Some(value) => flatten(value),
            None => value,
        };
        properties.insert(name, property);
    }

    let footprint = cellbox.boundary().to_polygon();
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&footprint))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Single-valued form of an attribute for GeoJSON properties.
fn flatten(value: &AggValue) -> Value {
    let number = match value {
        AggValue::Scalar(v) => *v,
        AggValue::Vector(vs) if vs.is_empty() => f64::NAN,
        AggValue::Vector(vs) => vs.iter().sum::<f64>() / vs.len() as f64,
        AggValue::Bool(true) => 1.0,
        AggValue::Bool(false) => f64::NAN,
        AggValue::Text(s) => return Value::String(s.clone()),
    };
    if number.is_finite() { json!(number) } else { Value::Null }
}

fn write_json(path: &Path, value: &Value) -> MeshResult<()> {
    let file = File::create(path).map_err(|e| MeshError::io_write(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| MeshError::io_write(path, e.into()))?;
    writer.flush().map_err(|e| MeshError::io_write(path, e))?;
    debug!(target: "env_mesh::io", path = %path.display(), "Wrote JSON");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MeshBuilder;
    use crate::config::{MeshConfig, Region, SplittingConfig};
    use crate::dataloader::AggData;
    use tempfile::{NamedTempFile, TempDir};

    fn basic_mesh() -> EnvironmentMesh {
        let config = MeshConfig::new(
            Region {
                lat_min: -10.0,
                lat_max: 10.0,
                long_min: -10.0,
                long_max: 10.0,
                start_time: Some("2000-01-01".into()),
                end_time: Some("2000-12-31".into()),
                cell_width: 10.0,
                cell_height: 10.0,
            },
            SplittingConfig {
                split_depth: 1,
                minimum_datapoints: 5,
            },
        );
        let mut mesh = MeshBuilder::new(config).unwrap().build_environmental_mesh().unwrap();
        let mut values = AggData::new();
        values.insert("uC".into(), AggValue::Vector(vec![1.0, 3.0]));
        values.insert("land".into(), AggValue::Bool(true));
        values.insert("SIC".into(), AggValue::Scalar(f64::NAN));
        mesh.update_cellbox(0, values).unwrap();
        mesh
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!(ExportFormat::parse("geojson").unwrap(), ExportFormat::GeoJson);
        assert_eq!(ExportFormat::parse("JSON").unwrap(), ExportFormat::Json);
        assert!(matches!(ExportFormat::parse("TIF"), Err(MeshError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_to_geojson_properties() {
        let geojson = basic_mesh().to_geojson(None).unwrap();
        assert_eq!(geojson["type"], "FeatureCollection");
        let features = geojson["features"].as_array().unwrap();
        assert_eq!(features.len(), 4);

        let first = &features[0];
        assert_eq!(first["type"], "Feature");
        assert_eq!(first["geometry"]["type"], "Polygon");
        assert_eq!(
            first["geometry"]["coordinates"],
            json!([[[-10.0, -10.0], [-10.0, 0.0], [0.0, 0.0], [0.0, -10.0], [-10.0, -10.0]]])
        );
        let props = first["properties"].as_object().unwrap();
        assert_eq!(props["uC"], json!(2.0));
        assert_eq!(props["land"], json!(1.0));
        assert_eq!(props["SIC"], Value::Null);
        assert_eq!(props["id"], "0");
        assert!(!props.contains_key("cx"));
        assert!(!props.contains_key("geometry"));
    }

    #[test]
    fn test_flatten() {
        assert_eq!(flatten(&AggValue::Scalar(f64::INFINITY)), Value::Null);
        assert_eq!(flatten(&AggValue::Bool(false)), Value::Null);
        assert_eq!(flatten(&AggValue::Vector(vec![])), Value::Null);
        assert_eq!(flatten(&AggValue::Text("5".into())), json!("5"));
    }

    #[test]
    fn test_to_geojson_filter() {
        let names = vec!["uC".to_string()];
        let geojson = basic_mesh().to_geojson(Some(&names)).unwrap();
        let props = geojson["features"][0]["properties"].as_object().unwrap();
        let mut keys: Vec<&str> = props.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["id", "uC"]);
    }

    #[test]
    fn test_geojson_antimeridian_cell() {
        let boundary = crate::boundary::Boundary::new([0.0, 10.0], [170.0, -170.0], None).unwrap();
        let cellbox = AggregatedCellBox::new(boundary, AggData::new(), 9);
        let feature = serde_json::to_value(geojson_feature(&cellbox, None)).unwrap();
        assert_eq!(feature["geometry"]["type"], "MultiPolygon");
        assert_eq!(feature["geometry"]["coordinates"].as_array().unwrap().len(), 2);
        assert_eq!(feature["properties"]["id"], "9");
    }

    #[test]
    fn test_format_params_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"data_name": "SIC"}}"#).unwrap();
        let params = FormatParams::from_file(file.path()).unwrap();
        assert_eq!(params.data_name, Some(vec!["SIC".to_string()]));

        let empty: FormatParams = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.data_name, None);
    }

    #[test]
    fn test_save_and_load() {
        let mesh = basic_mesh();
        let dir = TempDir::new().unwrap();

        let json_path = dir.path().join("mesh.json");
        mesh.save(&json_path, "JSON", None).unwrap();
        assert_eq!(EnvironmentMesh::load(&json_path).unwrap(), mesh);

        let geojson_path = dir.path().join("mesh.geojson");
        mesh.save(&geojson_path, "GEOJSON", None).unwrap();
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&geojson_path).unwrap()).unwrap();
        assert_eq!(written["type"], "FeatureCollection");

        let err = mesh.save(dir.path().join("mesh.png"), "PNG", None).unwrap_err();
        assert_eq!(err.code().as_str(), "MESH-4005");
    }
}

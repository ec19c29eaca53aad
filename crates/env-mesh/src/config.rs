//! Mesh configuration.
//!
//! A config describes the region to mesh, the data sources to evaluate and
//! the splitting limits. It can be written as JSON or TOML and is embedded,
//! unchanged, in every mesh built from it so that the mesh can be rebuilt.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "region": {
//!     "lat_min": -10, "lat_max": 10, "long_min": -10, "long_max": 10,
//!     "start_time": "2000-01-01", "end_time": "2000-12-31",
//!     "cell_width": 10, "cell_height": 10
//!   },
//!   "data_sources": [
//!     { "loader": "gradient", "params": { "data_name": "ice", "vertical": true } }
//!   ],
//!   "splitting": { "split_depth": 4, "minimum_datapoints": 5 }
//! }
//! ```
//!
//! # TOML Format
//!
//! ```toml
//! [region]
//! lat_min = -10.0
//! lat_max = 10.0
//! long_min = -10.0
//! long_max = 10.0
//! start_time = "2000-01-01"
//! end_time = "2000-12-31"
//! cell_width = 10.0
//! cell_height = 10.0
//!
//! [[data_sources]]
//! loader = "gradient"
//! params = { data_name = "ice", vertical = true }
//!
//! [splitting]
//! split_depth = 4
//! minimum_datapoints = 5
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::boundary::{Boundary, TimeRange};
use crate::dataloader::KNOWN_LOADERS;
use crate::error::{MeshError, MeshResult};

/// Geographic extent, time window and base cell size of a mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub lat_min: f64,
    pub lat_max: f64,
    pub long_min: f64,
    pub long_max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl Region {
    /// Boundary covering the whole region, time range included.
    pub fn bounds(&self) -> MeshResult<Boundary> {
        let time_range = match (&self.start_time, &self.end_time) {
            (Some(start), Some(end)) => Some(TimeRange::parse(start, end)?),
            _ => None,
        };
        Boundary::new(
            [self.lat_min, self.lat_max],
            [self.long_min, self.long_max],
            time_range,
        )
    }
}

/// One data source: a loader name and its free-form parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub loader: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Limits on adaptive refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplittingConfig {
    /// Maximum number of times a base cell may be quartered.
    pub split_depth: u32,
    /// Datapoints a cell needs before its homogeneity is judged.
    pub minimum_datapoints: u32,
}

impl Default for SplittingConfig {
    fn default() -> Self {
        Self {
            split_depth: 4,
            minimum_datapoints: 5,
        }
    }
}

/// Everything needed to build (or rebuild) a mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub region: Region,
    #[serde(default)]
    pub data_sources: Vec<DataSourceConfig>,
    #[serde(default)]
    pub splitting: SplittingConfig,
    /// Configs of meshes merged into this one, in merge order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged: Vec<MeshConfig>,
}

impl MeshConfig {
    /// Config with no data sources over `region`.
    pub fn new(region: Region, splitting: SplittingConfig) -> Self {
        Self {
            region,
            data_sources: Vec::new(),
            splitting,
            merged: Vec::new(),
        }
    }

    /// Parse from a JSON string.
    ///
    /// Accepts a bare config, a `{"mesh_info": ..}` wrapper, or a whole mesh
    /// document (`{"config": {"mesh_info": ..}, ..}`).
    pub fn from_json(json_str: &str) -> MeshResult<Self> {
        let value: Value = serde_json::from_str(json_str)
            .map_err(|e| MeshError::parse_error("<json>", e.to_string()))?;
        Self::from_json_value(value).map_err(|e| MeshError::parse_error("<json>", e.to_string()))
    }

    /// Parse from an already decoded JSON value (see [`MeshConfig::from_json`]).
    pub fn from_json_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Some(config) = value.get_mut("config").map(Value::take) {
            value = config;
        }
        if let Some(info) = value.get_mut("mesh_info").map(Value::take) {
            value = info;
        }
        serde_json::from_value(value)
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> MeshResult<Self> {
        toml::from_str(toml_str).map_err(|e| MeshError::parse_error("<toml>", e.to_string()))
    }

    /// Load a JSON config file. Mesh files are accepted too.
    pub fn from_json_file(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| MeshError::io_read(path, e))?;
        serde_json::from_str::<Value>(&contents)
            .and_then(Self::from_json_value)
            .map_err(|e| MeshError::parse_error(path, e.to_string()))
    }

    /// Load a TOML config file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| MeshError::io_read(path, e))?;
        toml::from_str(&contents).map_err(|e| MeshError::parse_error(path, e.to_string()))
    }

    /// Load from a `.json` or `.toml` file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::from_toml_file(path)
        } else {
            Self::from_json_file(path)
        }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Boundary of the configured region.
    pub fn bounds(&self) -> MeshResult<Boundary> {
        self.region.bounds()
    }

    /// Check the config before any data is loaded.
    ///
    /// Loader-specific parameters are checked later by the loader factory.
    pub fn validate(&self) -> MeshResult<()> {
        let region = &self.region;
        if !(region.cell_width > 0.0) || !(region.cell_height > 0.0) {
            return Err(MeshError::invalid_config(format!(
                "cell_width ({}) and cell_height ({}) must be positive",
                region.cell_width, region.cell_height
            )));
        }
        if region.start_time.is_some() != region.end_time.is_some() {
            return Err(MeshError::invalid_config(
                "start_time and end_time must be given together",
            ));
        }

        let bounds = self.bounds()?;
        if region.cell_width > bounds.width() || region.cell_height > bounds.height() {
            return Err(MeshError::invalid_config(format!(
                "cells of {} x {} do not fit in a region of {} x {}",
                region.cell_width,
                region.cell_height,
                bounds.width(),
                bounds.height()
            )));
        }

        for source in &self.data_sources {
            if !KNOWN_LOADERS.contains(&source.loader.to_lowercase().as_str()) {
                return Err(MeshError::UnknownDataLoader {
                    name: source.loader.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"{
        "region": {
            "lat_min": -10, "lat_max": 10, "long_min": -10, "long_max": 10,
            "start_time": "2000-01-01", "end_time": "2000-12-31",
            "cell_width": 10, "cell_height": 10
        },
        "data_sources": [],
        "splitting": { "split_depth": 1, "minimum_datapoints": 5 }
    }"#;

    #[test]
    fn test_from_json() {
        let config = MeshConfig::from_json(BASIC).unwrap();
        assert_eq!(config.region.cell_width, 10.0);
        assert_eq!(config.splitting.split_depth, 1);
        assert!(config.merged.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_from_wrapped_json() {
        let wrapped = format!(r#"{{"config": {{"mesh_info": {}}}, "cellboxes": []}}"#, BASIC);
        let config = MeshConfig::from_json(&wrapped).unwrap();
        assert_eq!(config, MeshConfig::from_json(BASIC).unwrap());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = MeshConfig::from_json(BASIC).unwrap();
        let toml_str = config.to_toml().unwrap();
        assert_eq!(MeshConfig::from_toml(&toml_str).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(BASIC.as_bytes()).unwrap();
        let config = MeshConfig::from_file(file.path()).unwrap();
        assert_eq!(config.region.lat_min, -10.0);

        let err = MeshConfig::from_file("/nonexistent/config.json").unwrap_err();
        assert_eq!(err.code().as_str(), "MESH-1001");
    }

    #[test]
    fn test_from_toml_file() {
        let config = MeshConfig::from_json(BASIC).unwrap();
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();
        assert_eq!(MeshConfig::from_file(file.path()).unwrap(), config);
        assert!(MeshConfig::from_json_file(file.path()).is_err());
    }

    #[test]
    fn test_negative_split_depth_rejected() {
        let bad = BASIC.replace("\"split_depth\": 1", "\"split_depth\": -1");
        assert!(MeshConfig::from_json(&bad).is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = MeshConfig::from_json(BASIC).unwrap();
        config.region.cell_width = 0.0;
        assert!(config.validate().is_err());

        let mut config = MeshConfig::from_json(BASIC).unwrap();
        config.region.lat_min = 20.0;
        assert!(matches!(config.validate(), Err(MeshError::InvalidBoundary { .. })));

        let mut config = MeshConfig::from_json(BASIC).unwrap();
        config.data_sources.push(DataSourceConfig {
            loader: "no_such_loader".into(),
            params: Map::new(),
        });
        assert!(matches!(config.validate(), Err(MeshError::UnknownDataLoader { .. })));
    }
}

//! Construction of data loaders from config entries.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::files::{list_folder, read_csv_files, read_grid_file};
use super::shape::{scalar_shape, vector_shape};
use super::{AggregationType, DataLoader, Dataset, ScalarLoader, TabularSource, VectorLoader};
use crate::boundary::Boundary;
use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::OperationTimer;

/// Typed access to a loader's free-form `params`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Params<'a> {
    loader: &'a str,
    map: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    pub(crate) fn new(loader: &'a str, map: &'a Map<String, Value>) -> Self {
        Self { loader, map }
    }

    fn wrong_type(&self, key: &str, expected: &str) -> MeshError {
        MeshError::invalid_argument(key, format!("{} expects {} for '{}'", self.loader, expected, key))
    }

    pub(crate) fn str(&self, key: &str) -> Option<&'a str> {
        self.map.get(key).and_then(Value::as_str)
    }

    pub(crate) fn f64_or(&self, key: &str, default: f64) -> MeshResult<f64> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| self.wrong_type(key, "a number")),
        }
    }

    pub(crate) fn usize_or(&self, key: &str, default: usize) -> MeshResult<usize> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| self.wrong_type(key, "a non-negative integer")),
        }
    }

    pub(crate) fn bool_or(&self, key: &str, default: bool) -> bool {
        self.map.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// A `[a, b]` pair. JSON `null` entries count as absent.
    pub(crate) fn pair(&self, key: &str) -> MeshResult<Option<[f64; 2]>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) if items.len() == 2 => {
                if items.iter().any(Value::is_null) {
                    return Ok(None);
                }
                match (items[0].as_f64(), items[1].as_f64()) {
                    (Some(a), Some(b)) => Ok(Some([a, b])),
                    _ => Err(self.wrong_type(key, "a pair of numbers")),
                }
            }
            Some(_) => Err(self.wrong_type(key, "a pair of numbers")),
        }
    }

    fn files(&self) -> MeshResult<Vec<PathBuf>> {
        match self.map.get("files") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(PathBuf::from).ok_or_else(|| self.wrong_type("files", "a list of paths")))
                .collect(),
            Some(Value::String(s)) => Ok(vec![PathBuf::from(s)]),
            Some(_) => Err(self.wrong_type("files", "a list of paths")),
            None => Err(MeshError::missing_parameter(self.loader, "files")),
        }
    }

    fn data_names(&self) -> Vec<String> {
        self.str("data_name")
            .map(|s| s.split(',').map(|n| n.trim().to_string()).filter(|n| !n.is_empty()).collect())
            .unwrap_or_default()
    }

    fn aggregate_type(&self) -> MeshResult<AggregationType> {
        match self.map.get("aggregate_type") {
            None | Some(Value::Null) => Ok(AggregationType::default()),
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(MeshError::UnknownAggregationType { value: other.to_string() }),
        }
    }
}

/// Creates [`DataLoader`]s by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataLoaderFactory {
    /// Fail with [`MeshError::InsufficientData`] when a source has no
    /// datapoints in the initial boundary, instead of warning.
    pub strict_coverage: bool,
}

impl DataLoaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict_coverage: bool) -> Self {
        self.strict_coverage = strict_coverage;
        self
    }

    /// Replace `file` or `folder` params with an equivalent `files` list.
    pub fn translate_file_input(params: &mut Map<String, Value>) -> MeshResult<()> {
        if let Some(file) = params.remove("file") {
            params.insert("files".into(), Value::Array(vec![file]));
        } else if let Some(folder) = params.remove("folder") {
            let folder = folder
                .as_str()
                .ok_or_else(|| MeshError::invalid_argument("folder", "expected a directory path"))?;
            let files = list_folder(folder.as_ref())?
                .into_iter()
                .map(|p| Value::String(p.to_string_lossy().into_owned()))
                .collect();
            params.insert("files".into(), Value::Array(files));
        }
        Ok(())
    }

    /// Build the loader called `name` (case-insensitive), trimmed to `bounds`.
    ///
    /// # Errors
    ///
    /// - [`MeshError::UnknownDataLoader`] for an unrecognised name
    /// - [`MeshError::MissingParameter`] when a required param is absent
    /// - [`MeshError::InsufficientData`] for zero coverage when strict
    pub fn get_dataloader(
        &self,
        name: &str,
        bounds: &Boundary,
        params: &Map<String, Value>,
        min_dp: usize,
    ) -> MeshResult<Arc<dyn DataLoader>> {
        let name = name.to_lowercase();
        let _timer = OperationTimer::new("load_data_source");

        let mut params = params.clone();
        Self::translate_file_input(&mut params)?;
        let p = Params::new(&name, &params);
        let aggregate_type = p.aggregate_type()?;

        let loader: Arc<dyn DataLoader> = match name.as_str() {
            "circle" | "rectangle" | "gradient" | "checkerboard" => {
                let (data_name, grid) = scalar_shape(&name, bounds, &p)?;
                Arc::new(ScalarLoader::new(&name, data_name, grid.into(), aggregate_type, min_dp))
            }
            "vector_circle" | "vector_rectangle" | "vector_gradient" => {
                let (names, grid) = vector_shape(&name, bounds, &p)?;
                Arc::new(VectorLoader::new(&name, names, grid.into(), aggregate_type, min_dp))
            }
            "scalar_csv" | "scalar_grid" => {
                let wanted = p.data_names();
                let dataset = Self::read_files(&name, &p, &wanted)?;
                let data_name = match wanted.as_slice() {
                    [] => dataset.variables().first().cloned().ok_or_else(|| {
                        MeshError::insufficient_data(&name, "data files hold no data columns")
                    })?,
                    [single] => single.clone(),
                    _ => {
                        return Err(MeshError::invalid_argument("data_name", "a scalar source takes one data name"));
                    }
                };
                Arc::new(ScalarLoader::new(&name, data_name, dataset.trim(bounds), aggregate_type, min_dp))
            }
            "vector_csv" | "vector_grid" => {
                let wanted = p.data_names();
                let dataset = Self::read_files(&name, &p, &wanted)?;
                let names = match (wanted.as_slice(), dataset.variables()) {
                    ([u, v], _) | ([], [u, v, ..]) => [u.clone(), v.clone()],
                    _ => {
                        return Err(MeshError::invalid_argument(
                            "data_name",
                            "a vector source needs two components",
                        ));
                    }
                };
                Arc::new(VectorLoader::new(&name, names, dataset.trim(bounds), aggregate_type, min_dp))
            }
            _ => return Err(MeshError::UnknownDataLoader { name: name.clone() }),
        };

        let coverage = loader.calculate_coverage(bounds);
        debug!(loader = %name, datapoints = coverage, "Data source loaded");
        if coverage == 0 {
            let strict = self.strict_coverage || p.bool_or("strict_coverage", false);
            if strict {
                return Err(MeshError::insufficient_data(&name, bounds.to_string()));
            }
            warn!(loader = %name, bounds = %bounds, "Data source has no datapoints within the initial boundary");
        }
        info!(loader = %name, data = ?loader.data_names(), "Initialised data source");

        Ok(loader)
    }

    fn read_files(name: &str, params: &Params<'_>, wanted: &[String]) -> MeshResult<Dataset> {
        let files = params.files()?;
        if name.ends_with("_grid") {
            match files.as_slice() {
                [file] => Ok(read_grid_file(name, file, wanted)?.into()),
                _ => Err(MeshError::invalid_argument("files", "a grid source reads exactly one file")),
            }
        } else {
            Ok(read_csv_files(name, &files, wanted)?.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn bounds() -> Boundary {
        Boundary::new([-10.0, 10.0], [-10.0, 10.0], None).unwrap()
    }

    #[test]
    fn test_shape_loaders() {
        let factory = DataLoaderFactory::new();
        let loader = factory
            .get_dataloader("Gradient", &bounds(), &params(json!({"nx": 11, "ny": 11})), 5)
            .unwrap();
        assert_eq!(loader.name(), "gradient");
        assert_eq!(loader.data_names(), ["dummy_data".to_string()]);
        assert!(!loader.is_vector());

        let loader = factory
            .get_dataloader("vector_circle", &bounds(), &params(json!({"nx": 11, "ny": 11})), 5)
            .unwrap();
        assert!(loader.is_vector());
        assert_eq!(loader.data_names().len(), 2);
    }

    #[test]
    fn test_unknown_loader() {
        let err = DataLoaderFactory::new()
            .get_dataloader("amsr", &bounds(), &Map::new(), 5)
            .unwrap_err();
        assert!(matches!(err, MeshError::UnknownDataLoader { .. }));
    }

    #[test]
    fn test_missing_files() {
        let err = DataLoaderFactory::new()
            .get_dataloader("scalar_csv", &bounds(), &Map::new(), 5)
            .unwrap_err();
        assert!(matches!(err, MeshError::MissingParameter { .. }));
    }

    #[test]
    fn test_csv_loader_with_file_param() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        file.write_all(b"lat,long,elevation\n1,1,-5\n2,2,-7\n50,50,3\n").unwrap();
        let p = params(json!({"file": file.path().to_str().unwrap(), "aggregate_type": "MIN"}));
        let loader = DataLoaderFactory::new().get_dataloader("scalar_csv", &bounds(), &p, 1).unwrap();
        assert_eq!(loader.aggregate_type(), AggregationType::Min);
        // Point at (50, 50) trimmed away
        assert_eq!(loader.dataset().len(), 2);
    }

    #[test]
    fn test_zero_coverage() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        file.write_all(b"lat,long,elevation\n50,50,3\n").unwrap();
        let p = params(json!({"files": [file.path().to_str().unwrap()]}));

        let loader = DataLoaderFactory::new().get_dataloader("scalar_csv", &bounds(), &p, 1).unwrap();
        assert_eq!(loader.calculate_coverage(&bounds()), 0);

        let err = DataLoaderFactory::new()
            .strict(true)
            .get_dataloader("scalar_csv", &bounds(), &p, 1)
            .unwrap_err();
        assert!(matches!(err, MeshError::InsufficientData { .. }));
    }

    #[test]
    fn test_bad_aggregate_type() {
        let err = DataLoaderFactory::new()
            .get_dataloader("circle", &bounds(), &params(json!({"aggregate_type": "MODE"})), 5)
            .unwrap_err();
        assert!(matches!(err, MeshError::UnknownAggregationType { .. }));
    }
}

//! File-backed datasets: CSV point tables and JSON grids.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::{GriddedField, PointTable, TabularSource};
use crate::boundary::parse_datetime;
use crate::error::{MeshError, MeshResult};

const COORDINATE_COLUMNS: [&str; 3] = ["lat", "long", "time"];

/// Read CSV files with `lat`, `long`, optional `time` and data columns.
///
/// With `wanted` empty, every non-coordinate column is loaded. Empty cells
/// load as NaN. All files must share the same header.
pub(crate) fn read_csv_files(loader: &str, files: &[PathBuf], wanted: &[String]) -> MeshResult<PointTable> {
    let mut table: Option<PointTable> = None;

    for path in files {
        let part = read_csv(loader, path, wanted)?;
        debug!(file = %path.display(), rows = part.len(), "Read CSV data file");
        match &mut table {
            Some(t) => {
                if t.variables() != part.variables() {
                    return Err(MeshError::parse_error(path, "columns differ from the previous data files"));
                }
                t.extend(part);
            }
            None => table = Some(part),
        }
    }

    table.ok_or_else(|| MeshError::missing_parameter(loader, "files"))
}

fn read_csv(loader: &str, path: &Path, wanted: &[String]) -> MeshResult<PointTable> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();

    let index_of = |name: &str| headers.iter().position(|h| h.trim() == name);
    let lat_index = index_of("lat").ok_or_else(|| MeshError::parse_error(path, "missing 'lat' column"))?;
    let long_index = index_of("long").ok_or_else(|| MeshError::parse_error(path, "missing 'long' column"))?;
    let time_index = index_of("time");

    let names: Vec<String> = if wanted.is_empty() {
        headers
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !COORDINATE_COLUMNS.contains(&h.as_str()))
            .collect()
    } else {
        wanted.to_vec()
    };
    let data_indices = names
        .iter()
        .map(|name| {
            index_of(name).ok_or_else(|| {
                MeshError::insufficient_data(loader, format!("{} has no column '{}'", path.display(), name))
            })
        })
        .collect::<MeshResult<Vec<_>>>()?;

    let mut table = PointTable::new(names, time_index.is_some());
    let mut values = vec![f64::NAN; data_indices.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let field = |i: usize| record.get(i).map(str::trim).unwrap_or("");
        let number = |i: usize| -> MeshResult<f64> {
            let text = field(i);
            if text.is_empty() || text.eq_ignore_ascii_case("nan") {
                return Ok(f64::NAN);
            }
            text.parse().map_err(|_| {
                MeshError::parse_error(path, format!("row {}: '{}' is not a number", row + 1, text))
            })
        };

        let lat = number(lat_index)?;
        let long = number(long_index)?;
        let date = match time_index {
            Some(i) => Some(parse_datetime(field(i).get(..10).unwrap_or(field(i)))?),
            None => None,
        };
        for (slot, &i) in values.iter_mut().zip(&data_indices) {
            *slot = number(i)?;
        }
        table.push(lat, long, date, &values);
    }

    Ok(table)
}

fn csv_error(path: &Path, err: csv::Error) -> MeshError {
    match err.into_kind() {
        csv::ErrorKind::Io(source) => MeshError::io_read(path, source),
        other => MeshError::parse_error(path, format!("{:?}", other)),
    }
}

#[derive(Debug, Deserialize)]
struct GridFile {
    lat: Vec<f64>,
    long: Vec<f64>,
    variables: BTreeMap<String, Vec<Vec<Option<f64>>>>,
}

/// Read a JSON grid: `{"lat": [..], "long": [..], "variables": {name: [[..]]}}`.
///
/// Each variable is indexed `[lat][long]`; `null` loads as NaN.
pub(crate) fn read_grid_file(loader: &str, path: &Path, wanted: &[String]) -> MeshResult<GriddedField> {
    let contents = std::fs::read_to_string(path).map_err(|e| MeshError::io_read(path, e))?;
    let mut file: GridFile =
        serde_json::from_str(&contents).map_err(|e| MeshError::parse_error(path, e.to_string()))?;

    let names: Vec<String> = if wanted.is_empty() {
        file.variables.keys().cloned().collect()
    } else {
        wanted.to_vec()
    };

    let mut variables = Vec::with_capacity(names.len());
    for name in names {
        let rows = file.variables.remove(&name).ok_or_else(|| {
            MeshError::insufficient_data(loader, format!("{} has no variable '{}'", path.display(), name))
        })?;
        if rows.len() != file.lat.len() || rows.iter().any(|r| r.len() != file.long.len()) {
            return Err(MeshError::parse_error(
                path,
                format!(
                    "variable '{}' should be {} x {} to match the lat/long axes",
                    name,
                    file.lat.len(),
                    file.long.len()
                ),
            ));
        }
        let values = rows.into_iter().flatten().map(|v| v.unwrap_or(f64::NAN)).collect();
        variables.push((name, values));
    }

    GriddedField::new(file.lat, file.long, variables)
        .ok_or_else(|| MeshError::parse_error(path, "variables do not match the lat/long axes"))
}

/// Sorted regular files inside `folder`.
pub(crate) fn list_folder(folder: &Path) -> MeshResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(folder).map_err(|e| MeshError::io_read(folder, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| MeshError::io_read(folder, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_csv() {
        let file = csv_file("lat,long,time,elevation\n0.5,0.5,2000-01-01,-10\n1.5,0.5,2000-01-02,\n");
        let table = read_csv_files("scalar_csv", &[file.path().to_path_buf()], &[]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.variables(), ["elevation".to_string()]);
        let values = table.column("elevation").unwrap();
        assert_eq!(values[0], -10.0);
        assert!(values[1].is_nan());
    }

    #[test]
    fn test_read_csv_missing_column() {
        let file = csv_file("lat,long,elevation\n0.5,0.5,1\n");
        let err = read_csv_files("scalar_csv", &[file.path().to_path_buf()], &["depth".into()]).unwrap_err();
        assert!(matches!(err, MeshError::InsufficientData { .. }));

        let no_lat = csv_file("latitude,long,elevation\n0.5,0.5,1\n");
        let err = read_csv_files("scalar_csv", &[no_lat.path().to_path_buf()], &[]).unwrap_err();
        assert!(matches!(err, MeshError::ParseError { .. }));
    }

    #[test]
    fn test_read_multiple_csv() {
        let a = csv_file("lat,long,uC,vC\n0.5,0.5,1,2\n");
        let b = csv_file("lat,long,uC,vC\n1.5,1.5,3,4\n");
        let table = read_csv_files("vector_csv", &[a.path().to_path_buf(), b.path().to_path_buf()], &[]).unwrap();
        assert_eq!(table.column("vC").unwrap(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_read_grid() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(br#"{"lat": [0, 1], "long": [0, 1, 2], "variables": {"sic": [[1, 2, 3], [4, null, 6]]}}"#)
            .unwrap();
        let grid = read_grid_file("scalar_grid", file.path(), &[]).unwrap();
        assert_eq!(grid.len(), 6);
        let values = grid.column("sic").unwrap();
        assert_eq!(values[3], 4.0);
        assert!(values[4].is_nan());
    }

    #[test]
    fn test_list_folder() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.csv"), "").unwrap();
        std::fs::write(dir.path().join("a.csv"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let files = list_folder(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.csv"), dir.path().join("b.csv")]);
    }
}

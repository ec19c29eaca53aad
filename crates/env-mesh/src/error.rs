//! Error types for mesh construction with rich diagnostics.
//!
//! Every error carries:
//! - A machine-readable code for programmatic handling
//! - Context (which cell, which point, which data source)
//! - A recovery suggestion for the common cases
//! - Terminal display via miette
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `MESH-XXXX`:
//! - `MESH-1xxx`: I/O errors (file reading, writing, parsing)
//! - `MESH-2xxx`: Validation errors (boundaries, arguments, config, graph lookups)
//! - `MESH-3xxx`: Construction errors (coverage, point queries, merging)
//! - `MESH-4xxx`: Data source errors (aggregation, splitting conditions, loaders)
//!
//! # Example
//!
//! ```rust,ignore
//! use env_mesh::{MeshError, ErrorCode};
//!
//! let err = MeshError::invalid_boundary("lat_min 20 is greater than lat_max 10");
//! println!("Error code: {}", err.code()); // MESH-2001
//! println!("Recovery: {}", err.recovery_suggestion());
//! ```

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::CellId;

/// Result type alias for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Machine-readable error codes for mesh operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // I/O errors (1xxx)
    /// MESH-1001: Failed to read file
    IoRead = 1001,
    /// MESH-1002: Failed to write file
    IoWrite = 1002,
    /// MESH-1003: Failed to parse file contents
    ParseError = 1003,
    /// MESH-1004: Failed to serialise mesh state
    Serialize = 1004,

    // Validation errors (2xxx)
    /// MESH-2001: Malformed lat/long/time range
    InvalidBoundary = 2001,
    /// MESH-2002: Argument outside its permitted domain
    InvalidArgument = 2002,
    /// MESH-2003: Config failed schema checks
    InvalidConfig = 2003,
    /// MESH-2004: No cellbox with the requested id
    CellNotFound = 2004,
    /// MESH-2005: No neighbour graph node with the requested id
    NodeNotFound = 2005,

    // Construction errors (3xxx)
    /// MESH-3001: Data source has no coverage of the region
    InsufficientData = 3001,
    /// MESH-3002: Point lies in zero or several cellboxes
    AmbiguousPointLocation = 3002,
    /// MESH-3003: Meshes cannot be merged
    MergeIncompatible = 3003,
    /// MESH-3004: Build cancelled from a progress callback
    Cancelled = 3004,

    // Data source errors (4xxx)
    /// MESH-4001: Aggregation type not recognised
    UnknownAggregationType = 4001,
    /// MESH-4002: Splitting condition not recognised
    UnknownHomogeneityCondition = 4002,
    /// MESH-4003: Data loader name not recognised
    UnknownDataLoader = 4003,
    /// MESH-4004: Data loader parameter missing
    MissingParameter = 4004,
    /// MESH-4005: Export format not supported
    UnsupportedFormat = 4005,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `MESH-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "MESH-1001",
            ErrorCode::IoWrite => "MESH-1002",
            ErrorCode::ParseError => "MESH-1003",
            ErrorCode::Serialize => "MESH-1004",
            ErrorCode::InvalidBoundary => "MESH-2001",
            ErrorCode::InvalidArgument => "MESH-2002",
            ErrorCode::InvalidConfig => "MESH-2003",
            ErrorCode::CellNotFound => "MESH-2004",
            ErrorCode::NodeNotFound => "MESH-2005",
            ErrorCode::InsufficientData => "MESH-3001",
            ErrorCode::AmbiguousPointLocation => "MESH-3002",
            ErrorCode::MergeIncompatible => "MESH-3003",
            ErrorCode::Cancelled => "MESH-3004",
            ErrorCode::UnknownAggregationType => "MESH-4001",
            ErrorCode::UnknownHomogeneityCondition => "MESH-4002",
            ErrorCode::UnknownDataLoader => "MESH-4003",
            ErrorCode::MissingParameter => "MESH-4004",
            ErrorCode::UnsupportedFormat => "MESH-4005",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for mesh errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Fix one or more config fields.
    FixConfig { fields: Vec<String> },
    /// Check a file or its contents.
    CheckInput { checks: Vec<String> },
    /// Adjust parameters for the operation.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Use one of the supported values instead.
    UseSupported { supported: Vec<String> },
    /// Manual intervention may be required.
    ManualIntervention { description: String },
    /// No automatic recovery available.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::FixConfig { fields } => {
                write!(f, "Check these config fields: {}", fields.join(", "))
            }
            RecoverySuggestion::CheckInput { checks } => {
                write!(f, "Check the input for: {}", checks.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::UseSupported { supported } => {
                write!(f, "Use one of: {}", supported.join(", "))
            }
            RecoverySuggestion::ManualIntervention { description } => {
                write!(f, "{}", description)
            }
            RecoverySuggestion::None => {
                write!(f, "No automatic recovery available")
            }
        }
    }
}

/// Location information for mesh errors.
#[derive(Debug, Clone)]
pub enum MeshLocation {
    /// Error at a specific cellbox.
    Cell { id: CellId },
    /// Error at a geographic point.
    Point { lat: f64, long: f64 },
    /// Error in a file.
    File { path: PathBuf },
    /// Error in a named data source.
    DataSource { loader: String },
    /// No specific location.
    Unknown,
}

impl std::fmt::Display for MeshLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshLocation::Cell { id } => write!(f, "cellbox {}", id),
            MeshLocation::Point { lat, long } => {
                write!(f, "point (lat {:.4}, long {:.4})", lat, long)
            }
            MeshLocation::File { path } => write!(f, "{}", path.display()),
            MeshLocation::DataSource { loader } => write!(f, "data source '{}'", loader),
            MeshLocation::Unknown => write!(f, "unknown location"),
        }
    }
}

/// Errors that can occur while building, editing or serialising a mesh.
#[derive(Debug, Error, Diagnostic)]
pub enum MeshError {
    /// Error reading from a file.
    #[error("failed to read {path}")]
    #[diagnostic(
        code(mesh::io::read),
        help("Check that the file exists and is readable. Try: ls -la {}", path.display())
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write {path}")]
    #[diagnostic(
        code(mesh::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing a config, mesh or data file.
    #[error("failed to parse {path}: {details}")]
    #[diagnostic(
        code(mesh::parse::error),
        help("The file may be truncated or not match the expected layout.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Mesh state that cannot be turned into JSON.
    #[error("failed to serialise {what}")]
    #[diagnostic(code(mesh::io::serialize))]
    Serialize {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// Malformed lat/long/time range.
    #[error("invalid boundary: {details}")]
    #[diagnostic(
        code(mesh::validation::boundary),
        help(
            "Latitudes need lat_min <= lat_max, longitudes must lie in [-180, 180] and start_time must not be after end_time."
        )
    )]
    InvalidBoundary { details: String },

    /// Argument outside its permitted domain.
    #[error("invalid argument '{name}': {details}")]
    #[diagnostic(code(mesh::validation::argument))]
    InvalidArgument { name: String, details: String },

    /// Config failed schema checks.
    #[error("invalid config: {details}")]
    #[diagnostic(
        code(mesh::validation::config),
        help("Compare the config against the region / data_sources / splitting layout.")
    )]
    InvalidConfig { details: String },

    /// No cellbox with the requested id.
    #[error("no cellbox with id {id}")]
    #[diagnostic(code(mesh::validation::cell))]
    CellNotFound { id: CellId },

    /// No neighbour graph node with the requested id.
    #[error("neighbour graph has no node {id}")]
    #[diagnostic(
        code(mesh::graph::node),
        help("The cellbox may have been split or removed; re-query its replacement.")
    )]
    NodeNotFound { id: CellId },

    /// Data source has no coverage of the region.
    #[error("data source '{loader}' has no datapoints within {details}")]
    #[diagnostic(
        code(mesh::build::insufficient_data),
        help("Check that the data files cover the region and time range of the mesh.")
    )]
    InsufficientData { loader: String, details: String },

    /// A point lies in zero or several cellboxes.
    #[error("point (lat {lat}, long {long}) lies within {matches} cellboxes")]
    #[diagnostic(
        code(mesh::build::point_location),
        help("Zero matches means the point is outside the mesh; several means overlapping cellboxes.")
    )]
    AmbiguousPointLocation { lat: f64, long: f64, matches: usize },

    /// Meshes cannot be merged.
    #[error("meshes cannot be merged: {details}")]
    #[diagnostic(
        code(mesh::merge::incompatible),
        help("The merged mesh must align with, and be a whole multiple of, the base cell grid.")
    )]
    MergeIncompatible { details: String },

    /// Build cancelled from a progress callback.
    #[error("mesh build cancelled after {generation} refinement generations")]
    #[diagnostic(code(mesh::build::cancelled))]
    Cancelled { generation: usize },

    /// Aggregation type not recognised.
    #[error("unknown aggregation type '{value}'")]
    #[diagnostic(
        code(mesh::data::aggregation),
        help("Supported: MEAN, MEDIAN, MIN, MAX, STD, COUNT")
    )]
    UnknownAggregationType { value: String },

    /// Splitting condition not recognised.
    #[error("unknown homogeneity condition '{key}'")]
    #[diagnostic(code(mesh::data::homogeneity))]
    UnknownHomogeneityCondition { key: String },

    /// Data loader name not recognised.
    #[error("'{name}' is not a known data loader")]
    #[diagnostic(code(mesh::data::loader))]
    UnknownDataLoader { name: String },

    /// Data loader parameter missing.
    #[error("data loader '{loader}' requires parameter '{parameter}'")]
    #[diagnostic(code(mesh::data::parameter))]
    MissingParameter { loader: String, parameter: String },

    /// Export format not supported.
    #[error("cannot save mesh in '{format}' format")]
    #[diagnostic(code(mesh::format::unsupported), help("Supported formats: JSON, GEOJSON"))]
    UnsupportedFormat { format: String },
}

impl MeshError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MeshError::IoRead { .. } => ErrorCode::IoRead,
            MeshError::IoWrite { .. } => ErrorCode::IoWrite,
            MeshError::ParseError { .. } => ErrorCode::ParseError,
            MeshError::Serialize { .. } => ErrorCode::Serialize,
            MeshError::InvalidBoundary { .. } => ErrorCode::InvalidBoundary,
            MeshError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            MeshError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            MeshError::CellNotFound { .. } => ErrorCode::CellNotFound,
            MeshError::NodeNotFound { .. } => ErrorCode::NodeNotFound,
            MeshError::InsufficientData { .. } => ErrorCode::InsufficientData,
            MeshError::AmbiguousPointLocation { .. } => ErrorCode::AmbiguousPointLocation,
            MeshError::MergeIncompatible { .. } => ErrorCode::MergeIncompatible,
            MeshError::Cancelled { .. } => ErrorCode::Cancelled,
            MeshError::UnknownAggregationType { .. } => ErrorCode::UnknownAggregationType,
            MeshError::UnknownHomogeneityCondition { .. } => {
                ErrorCode::UnknownHomogeneityCondition
            }
            MeshError::UnknownDataLoader { .. } => ErrorCode::UnknownDataLoader,
            MeshError::MissingParameter { .. } => ErrorCode::MissingParameter,
            MeshError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            MeshError::IoRead { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            MeshError::IoWrite { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["directory exists".into(), "write permissions".into()],
            },
            MeshError::ParseError { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["valid JSON/TOML/CSV".into(), "expected keys".into()],
            },
            MeshError::Serialize { .. } => RecoverySuggestion::ManualIntervention {
                description: "Check the mesh config and attributes for values JSON cannot hold"
                    .into(),
            },
            MeshError::InvalidBoundary { .. } => RecoverySuggestion::FixConfig {
                fields: vec![
                    "region.lat_min".into(),
                    "region.lat_max".into(),
                    "region.long_min".into(),
                    "region.long_max".into(),
                    "region.start_time".into(),
                    "region.end_time".into(),
                ],
            },
            MeshError::InvalidArgument { name, .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![(name.clone(), "a value within range".into())],
            },
            MeshError::InvalidConfig { .. } => RecoverySuggestion::FixConfig {
                fields: vec!["region".into(), "data_sources".into(), "splitting".into()],
            },
            MeshError::CellNotFound { .. } | MeshError::NodeNotFound { .. } => {
                RecoverySuggestion::ManualIntervention {
                    description: "Reload the mesh; the id may refer to a cellbox that was split"
                        .into(),
                }
            }
            MeshError::InsufficientData { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["data coverage of region".into(), "time range".into()],
            },
            MeshError::AmbiguousPointLocation { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["point lies within the mesh bounds".into()],
            },
            MeshError::MergeIncompatible { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![
                    ("region".into(), "align with the base mesh grid".into()),
                    ("cell_width / cell_height".into(), "match the base mesh".into()),
                ],
            },
            MeshError::Cancelled { .. } => RecoverySuggestion::None,
            MeshError::UnknownAggregationType { .. } => RecoverySuggestion::UseSupported {
                supported: ["MEAN", "MEDIAN", "MIN", "MAX", "STD", "COUNT"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            MeshError::UnknownHomogeneityCondition { .. } => RecoverySuggestion::UseSupported {
                supported: ["threshold", "upper_bound", "lower_bound", "split_lock", "curl", "dmag"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            MeshError::UnknownDataLoader { .. } => RecoverySuggestion::UseSupported {
                supported: crate::dataloader::KNOWN_LOADERS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            MeshError::MissingParameter { parameter, .. } => RecoverySuggestion::FixConfig {
                fields: vec![format!("data_sources[].params.{}", parameter)],
            },
            MeshError::UnsupportedFormat { .. } => RecoverySuggestion::UseSupported {
                supported: vec!["JSON".into(), "GEOJSON".into()],
            },
        }
    }

    /// Returns location information if available.
    pub fn location(&self) -> Option<MeshLocation> {
        match self {
            MeshError::IoRead { path, .. }
            | MeshError::IoWrite { path, .. }
            | MeshError::ParseError { path, .. } => Some(MeshLocation::File { path: path.clone() }),
            MeshError::CellNotFound { id } | MeshError::NodeNotFound { id } => {
                Some(MeshLocation::Cell { id: *id })
            }
            MeshError::AmbiguousPointLocation { lat, long, .. } => Some(MeshLocation::Point {
                lat: *lat,
                long: *long,
            }),
            MeshError::InsufficientData { loader, .. }
            | MeshError::MissingParameter { loader, .. } => Some(MeshLocation::DataSource {
                loader: loader.clone(),
            }),
            _ => None,
        }
    }

    // Constructor helpers for common error patterns

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a ParseError.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        MeshError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create a Serialize error.
    pub fn serialize(what: impl Into<String>, source: serde_json::Error) -> Self {
        MeshError::Serialize {
            what: what.into(),
            source,
        }
    }

    /// Create an InvalidBoundary error.
    pub fn invalid_boundary(details: impl Into<String>) -> Self {
        MeshError::InvalidBoundary {
            details: details.into(),
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(name: impl Into<String>, details: impl Into<String>) -> Self {
        MeshError::InvalidArgument {
            name: name.into(),
            details: details.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(details: impl Into<String>) -> Self {
        MeshError::InvalidConfig {
            details: details.into(),
        }
    }

    /// Create an InsufficientData error.
    pub fn insufficient_data(loader: impl Into<String>, details: impl Into<String>) -> Self {
        MeshError::InsufficientData {
            loader: loader.into(),
            details: details.into(),
        }
    }

    /// Create a MergeIncompatible error.
    pub fn merge_incompatible(details: impl Into<String>) -> Self {
        MeshError::MergeIncompatible {
            details: details.into(),
        }
    }

    /// Create a MissingParameter error.
    pub fn missing_parameter(loader: impl Into<String>, parameter: impl Into<String>) -> Self {
        MeshError::MissingParameter {
            loader: loader.into(),
            parameter: parameter.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = MeshError::invalid_boundary("lat_min > lat_max");
        assert_eq!(err.code(), ErrorCode::InvalidBoundary);
        assert_eq!(err.code().as_str(), "MESH-2001");

        let err = MeshError::merge_incompatible("misaligned");
        assert_eq!(err.code().to_string(), "MESH-3003");

        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = MeshError::serialize("neighbour graph", source);
        assert_eq!(err.code().as_str(), "MESH-1004");
        assert_eq!(err.to_string(), "failed to serialise neighbour graph");
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = MeshError::UnknownAggregationType {
            value: "MODE".into(),
        };
        match err.recovery_suggestion() {
            RecoverySuggestion::UseSupported { supported } => {
                assert!(supported.contains(&"MEDIAN".to_string()));
            }
            _ => panic!("Expected UseSupported suggestion"),
        }
    }

    #[test]
    fn test_location_info() {
        let err = MeshError::AmbiguousPointLocation {
            lat: 1.5,
            long: -2.5,
            matches: 0,
        };
        match err.location() {
            Some(MeshLocation::Point { lat, long }) => {
                assert_eq!(lat, 1.5);
                assert_eq!(long, -2.5);
            }
            _ => panic!("Expected Point location"),
        }

        assert!(MeshError::invalid_config("x").location().is_none());
    }

    #[test]
    fn test_error_display() {
        let err = MeshError::missing_parameter("scalar_csv", "files");
        let display = format!("{}", err);
        assert!(display.contains("scalar_csv"));
        assert!(display.contains("files"));

        let err = MeshError::NodeNotFound { id: 42 };
        assert_eq!(format!("{}", err), "neighbour graph has no node 42");
    }
}

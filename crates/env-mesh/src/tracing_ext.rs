//! Tracing extensions for mesh construction.
//!
//! Structured logging and timing for the build, split and merge paths,
//! on top of the `tracing` ecosystem.
//!
//! # Usage
//!
//! Enable tracing by initializing a subscriber in your application:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//!
//! // Set RUST_LOG=env_mesh=debug for per-generation output
//! ```
//!
//! # Log Levels
//!
//! - **WARN**: data sources without coverage, cancelled builds
//! - **INFO**: operation summaries and timing
//! - **DEBUG**: per-generation refinement, loader details
//! - **TRACE**: per-cell decisions

use std::time::Instant;
use tracing::{Span, debug, info, warn};

use crate::environment_mesh::EnvironmentMesh;
use crate::progress::Progress;

/// A performance timer that logs duration on drop.
///
/// ```rust,ignore
/// use env_mesh::tracing_ext::OperationTimer;
///
/// fn expensive_operation() {
///     let _timer = OperationTimer::new("expensive_operation");
///     // ... do work ...
/// } // Timer logs duration when dropped
/// ```
pub struct OperationTimer {
    name: &'static str,
    cells: Option<usize>,
    start: Instant,
    span: Span,
}

impl OperationTimer {
    pub fn new(name: &'static str) -> Self {
        Self::start(name, None)
    }

    /// Timer that also records how many cells the operation touches.
    pub fn with_context(name: &'static str, cell_count: usize) -> Self {
        Self::start(name, Some(cell_count))
    }

    fn start(name: &'static str, cells: Option<usize>) -> Self {
        let span = tracing::info_span!("mesh_operation", operation = name, cells = cells);
        span.in_scope(|| debug!(target: "env_mesh::timing", operation = name, cells = cells, "Starting operation"));
        Self {
            name,
            cells,
            start: Instant::now(),
            span,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        self.span.in_scope(|| {
            info!(
                target: "env_mesh::timing",
                operation = self.name,
                cells = self.cells,
                elapsed_ms = format!("{:.2}", elapsed_ms),
                "Operation completed"
            )
        });
    }
}

/// Log a summary of a finished mesh at debug level.
pub fn log_mesh_stats(mesh: &EnvironmentMesh, context: &str) {
    let bounds = mesh.bounds();
    debug!(
        target: "env_mesh::mesh_state",
        context = context,
        cellboxes = mesh.cellboxes().len(),
        graph_nodes = mesh.neighbour_graph().len(),
        max_id = mesh.get_max_cellbox_id(),
        bounds = %bounds,
        "Mesh state"
    );
}

/// Log one refinement generation of a build.
pub fn log_generation(generation: usize, candidates: usize, splitting: usize) {
    debug!(
        target: "env_mesh::build",
        generation = generation,
        candidates = candidates,
        splitting = splitting,
        "Refinement generation"
    );
}

/// Log the result of a neighbour-graph symmetry check.
pub fn log_graph_check(asymmetries: usize, context: &str) {
    if asymmetries == 0 {
        debug!(target: "env_mesh::graph", context = context, "Neighbour graph is symmetric");
    } else {
        warn!(
            target: "env_mesh::graph",
            context = context,
            asymmetries = asymmetries,
            "Neighbour graph has one-sided edges"
        );
    }
}

/// Log a progress report.
pub fn log_progress(progress: &Progress) {
    debug!(
        target: "env_mesh::progress",
        generation = progress.generation,
        generations = progress.generations,
        active_cells = progress.active_cells,
        elapsed_ms = progress.elapsed.as_secs_f64() * 1000.0,
        "{}",
        progress.message
    );
}

/// Log the outcome of merging one mesh into another.
pub fn log_merge_result(removed: usize, added: usize, edges_tied: usize) {
    info!(
        target: "env_mesh::graph",
        removed = removed,
        added = added,
        edges_tied = edges_tied,
        "Merged mesh"
    );
}

/// Log a file I/O operation.
pub fn log_io_operation(operation: &str, path: &std::path::Path, format: Option<&str>, success: bool) {
    if success {
        info!(
            target: "env_mesh::io",
            operation = operation,
            path = path.display().to_string(),
            format = format.unwrap_or("auto"),
            "I/O operation completed"
        );
    } else {
        warn!(
            target: "env_mesh::io",
            operation = operation,
            path = path.display().to_string(),
            format = format.unwrap_or("auto"),
            "I/O operation failed"
        );
    }
}

//! Subcommand implementations.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use env_mesh::EnvironmentMesh;
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

pub mod create;
pub mod export;
pub mod info;
pub mod merge;
pub mod rebuild;
pub mod split;

/// Summary printed after a command writes a mesh.
#[derive(Serialize)]
pub struct MeshSummary {
    output: String,
    cellboxes: usize,
    max_id: usize,
    bounds: String,
    symmetric: bool,
}

impl MeshSummary {
    pub fn new(mesh: &EnvironmentMesh, output: &Path) -> Self {
        Self {
            output: output.display().to_string(),
            cellboxes: mesh.cellboxes().len(),
            max_id: mesh.get_max_cellbox_id(),
            bounds: mesh.bounds().to_string(),
            symmetric: mesh.neighbour_graph().is_symmetric(),
        }
    }

    /// Report in the requested format, headed by `message` in text mode.
    pub fn report(&self, message: &str, cli: &Cli) {
        match cli.format {
            OutputFormat::Json => output::print(self, cli.format, cli.quiet),
            OutputFormat::Text => {
                if cli.quiet {
                    return;
                }
                output::success(message, cli.format, cli.quiet);
                println!("  {}: {}", "Output".cyan(), self.output);
                println!("  {}: {}", "Cellboxes".cyan(), self.cellboxes);
                println!("  {}: {}", "Bounds".cyan(), self.bounds);
                if !self.symmetric {
                    println!("  {}: neighbour graph is not symmetric", "Warning".yellow());
                }
            }
        }
    }
}

pub fn load_mesh(path: &Path) -> Result<EnvironmentMesh> {
    EnvironmentMesh::load(path).with_context(|| format!("Failed to load mesh from {:?}", path))
}

pub fn save_mesh(mesh: &EnvironmentMesh, path: &Path) -> Result<()> {
    mesh.save(path, "JSON", None)
        .with_context(|| format!("Failed to save mesh to {:?}", path))
}

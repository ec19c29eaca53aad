//! env-mesh rebuild command - rebuild a mesh from its embedded config.

use std::path::Path;

use anyhow::{Context, Result};
use env_mesh::{MeshBuilder, MeshConfig};

use super::{MeshSummary, save_mesh};
use crate::{Cli, output};

pub fn run(mesh_path: &Path, output_path: &Path, cli: &Cli) -> Result<()> {
    // Mesh files wrap their config as {"config": {"mesh_info": ..}}
    let config = MeshConfig::from_json_file(mesh_path)
        .with_context(|| format!("Failed to read mesh config from {:?}", mesh_path))?;

    output::info("Rebuilding mesh...", cli.format, cli.quiet);
    let mesh = MeshBuilder::new(config)
        .and_then(|builder| builder.build_environmental_mesh())
        .context("Failed to rebuild mesh")?;

    save_mesh(&mesh, output_path)?;
    MeshSummary::new(&mesh, output_path).report(&format!("Rebuilt mesh from {}", mesh_path.display()), cli);
    Ok(())
}

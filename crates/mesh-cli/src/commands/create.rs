//! env-mesh create command - build a mesh from a config.

use std::path::Path;

use anyhow::{Context, Result};
use env_mesh::{MeshBuilder, MeshConfig};

use super::{MeshSummary, save_mesh};
use crate::{Cli, output};

pub fn run(config_path: &Path, output_path: &Path, cli: &Cli) -> Result<()> {
    let config = MeshConfig::from_file(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    output::info("Building mesh...", cli.format, cli.quiet);
    let mesh = MeshBuilder::new(config)
        .and_then(|builder| builder.build_environmental_mesh())
        .context("Failed to build mesh")?;

    save_mesh(&mesh, output_path)?;
    MeshSummary::new(&mesh, output_path).report(&format!("Built mesh from {}", config_path.display()), cli);
    Ok(())
}

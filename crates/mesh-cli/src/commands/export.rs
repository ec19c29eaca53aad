//! env-mesh export command - write a mesh in another format.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use env_mesh::{ExportFormat, FormatParams};
use serde::Serialize;

use super::load_mesh;
use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct ExportResult {
    input: String,
    output: String,
    format: String,
    features: usize,
}

pub fn run(
    mesh_path: &Path,
    format: &str,
    output_path: Option<&Path>,
    format_conf: Option<&Path>,
    cli: &Cli,
) -> Result<()> {
    let export_format = ExportFormat::parse(format)?;
    let output_path = output_path.map(Path::to_path_buf).unwrap_or_else(|| default_output(export_format));

    let params = format_conf
        .map(FormatParams::from_file)
        .transpose()
        .context("Failed to read export parameters")?;

    let mesh = load_mesh(mesh_path)?;
    mesh.save(&output_path, export_format.as_str(), params.as_ref())
        .with_context(|| format!("Failed to export mesh to {:?}", output_path))?;

    let result = ExportResult {
        input: mesh_path.display().to_string(),
        output: output_path.display().to_string(),
        format: export_format.as_str().to_string(),
        features: mesh.cellboxes().len(),
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Exported {} to {}", mesh_path.display(), output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!("  {}: {}", "Format".cyan(), result.format);
                println!("  {}: {} cellboxes", "Size".cyan(), result.features);
            }
        }
    }

    Ok(())
}

fn default_output(format: ExportFormat) -> PathBuf {
    match format {
        ExportFormat::Json => PathBuf::from("mesh.json"),
        ExportFormat::GeoJson => PathBuf::from("mesh_geo.json"),
    }
}

//! env-mesh info command - display mesh statistics.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use env_mesh::{AggValue, EnvironmentMesh};
use serde::Serialize;

use super::load_mesh;
use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct MeshInfo {
    path: String,
    cellboxes: usize,
    max_id: usize,
    bounds: String,
    global: bool,
    min_cell_width: f64,
    max_cell_width: f64,
    split_depth: u32,
    data_sources: Vec<String>,
    merged: usize,
    symmetric: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<BTreeMap<String, AttributeInfo>>,
}

#[derive(Serialize)]
struct AttributeInfo {
    count: usize,
    missing: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
}

pub fn run(mesh_path: &Path, detailed: bool, cli: &Cli) -> Result<()> {
    let mesh = load_mesh(mesh_path)?;

    let widths = mesh.cellboxes().iter().map(|c| c.boundary().width());
    let min_cell_width = widths.clone().fold(f64::INFINITY, f64::min);
    let max_cell_width = widths.fold(0.0, f64::max);
    let config = mesh.config();

    let info = MeshInfo {
        path: mesh_path.display().to_string(),
        cellboxes: mesh.cellboxes().len(),
        max_id: mesh.get_max_cellbox_id(),
        bounds: mesh.bounds().to_string(),
        global: mesh.neighbour_graph().is_global_mesh(),
        min_cell_width,
        max_cell_width,
        split_depth: config.splitting.split_depth,
        data_sources: config.data_sources.iter().map(|s| s.loader.clone()).collect(),
        merged: config.merged.len(),
        symmetric: mesh.neighbour_graph().is_symmetric(),
        attributes: detailed.then(|| attribute_stats(&mesh)),
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&info, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Mesh Information".bold().underline());
                println!("  {}: {}", "File".cyan(), info.path);
                println!("  {}: {}", "Bounds".cyan(), info.bounds);
                println!("  {}: {} (max id {})", "Cellboxes".cyan(), info.cellboxes, info.max_id);
                println!(
                    "  {}: {:.4} to {:.4} degrees",
                    "Cell width".cyan(),
                    info.min_cell_width,
                    info.max_cell_width
                );
                println!("  {}: {}", "Split depth".cyan(), info.split_depth);
                println!("  {}: {}", "Global".cyan(), if info.global { "yes" } else { "no" });
                if !info.data_sources.is_empty() {
                    println!("  {}: {}", "Data sources".cyan(), info.data_sources.join(", "));
                }
                if info.merged > 0 {
                    println!("  {}: {}", "Merged meshes".cyan(), info.merged);
                }
                println!(
                    "  {}: {}",
                    "Graph symmetric".cyan(),
                    if info.symmetric { "yes".green() } else { "no".red() }
                );

                if let Some(attributes) = &info.attributes {
                    println!("{}", "Attributes".bold().underline());
                    for (name, stats) in attributes {
                        print!("  {}: {} values, {} missing", name.cyan(), stats.count, stats.missing);
                        if let (Some(min), Some(max)) = (stats.min, stats.max) {
                            print!(", range {:.4} to {:.4}", min, max);
                        }
                        println!();
                    }
                }
            }
        }
    }

    Ok(())
}

fn attribute_stats(mesh: &EnvironmentMesh) -> BTreeMap<String, AttributeInfo> {
    let mut stats = BTreeMap::new();
    for name in mesh.data_names() {
        let mut info = AttributeInfo {
            count: 0,
            missing: 0,
            min: None,
            max: None,
        };
        for value in mesh.cellboxes().iter().filter_map(|c| c.get(&name)) {
            info.count += 1;
            if value.is_nan() {
                info.missing += 1;
            }
            if let AggValue::Scalar(v) = value
                && v.is_finite()
            {
                info.min = Some(info.min.map_or(*v, |m| m.min(*v)));
                info.max = Some(info.max.map_or(*v, |m| m.max(*v)));
            }
        }
        stats.insert(name, info);
    }
    stats
}

//! env-mesh merge command - splice meshes into a mesh.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::{MeshSummary, load_mesh, save_mesh};
use crate::{Cli, output};

pub fn run(mesh_path: &Path, merge: &Path, directory: bool, output_path: &Path, cli: &Cli) -> Result<()> {
    let mut mesh = load_mesh(mesh_path)?;

    let sources = if directory { mesh_files(merge)? } else { vec![merge.to_path_buf()] };
    for source in &sources {
        debug!(mesh = %source.display(), "Merging mesh");
        let other = load_mesh(source)?;
        mesh.merge_mesh(&other)
            .with_context(|| format!("Failed to merge {:?} into {:?}", source, mesh_path))?;
        output::info(&format!("Merged {}", source.display()), cli.format, cli.quiet);
    }

    save_mesh(&mesh, output_path)?;
    MeshSummary::new(&mesh, output_path).report(&format!("Merged {} mesh(es)", sources.len()), cli);
    Ok(())
}

/// `*.json` files directly inside `dir`, sorted by name.
fn mesh_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))? {
        let path = entry?.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if path.is_file() && is_json {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mesh_files_sorted_json_only() {
        let dir = TempDir::new().unwrap();
        for name in ["b.json", "a.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = mesh_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, ["a.json", "b.json"]);
    }
}

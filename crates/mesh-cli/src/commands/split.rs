//! env-mesh split command - refine a mesh around points.

use std::path::Path;

use anyhow::{Context, Result};

use super::{MeshSummary, load_mesh, save_mesh};
use crate::Cli;

pub fn run(mesh_path: &Path, points: &[(f64, f64)], output_path: &Path, cli: &Cli) -> Result<()> {
    let mut mesh = load_mesh(mesh_path)?;
    let splits = mesh.split_points(points).context("Failed to split mesh")?;

    save_mesh(&mesh, output_path)?;
    MeshSummary::new(&mesh, output_path).report(
        &format!("Split {} cellbox(es) around {} point(s)", splits, points.len()),
        cli,
    );
    Ok(())
}

/// Parse a `LAT,LONG` pair.
pub fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (lat, long) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LONG, got '{}'", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", v.trim()))
    };
    Ok((parse(lat)?, parse(long)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("-5.5, 12").unwrap(), (-5.5, 12.0));
        assert!(parse_point("5").is_err());
        assert!(parse_point("a,1").is_err());
    }
}

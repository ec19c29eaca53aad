//! env-mesh: Command-line interface for building environmental meshes.
//!
//! This tool builds, rebuilds, merges, splits and exports meshes from the
//! command line, suitable for scripting and batch pipelines.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=env_mesh=info` - Basic operation logging
//! - `RUST_LOG=env_mesh=debug` - Per-generation refinement logging
//! - `RUST_LOG=env_mesh::timing=debug` - Performance timing
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # Build a mesh with info logging
//! RUST_LOG=env_mesh=info env-mesh create config.json -o mesh.json
//!
//! # Export for GIS tools
//! env-mesh export mesh.json geojson -o mesh.geojson
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{create, export, info, merge, rebuild, split};

/// env-mesh - A command-line tool for adaptive environmental meshes.
///
/// Discretise a geographic region into cells that refine where the
/// environmental data varies.
#[derive(Parser)]
#[command(name = "env-mesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a mesh from a config file
    #[command(alias = "create_mesh")]
    Create {
        /// Config file (JSON or TOML)
        config: PathBuf,

        /// Output mesh file
        #[arg(short, long, default_value = "create_mesh.output.json")]
        output: PathBuf,
    },

    /// Rebuild a mesh from the config embedded in it
    #[command(alias = "rebuild_mesh")]
    Rebuild {
        /// Input mesh file
        mesh: PathBuf,

        /// Output mesh file
        #[arg(short, long, default_value = "rebuild_mesh.output.json")]
        output: PathBuf,
    },

    /// Export a mesh to another format
    #[command(alias = "export_mesh")]
    Export {
        /// Input mesh file
        mesh: PathBuf,

        /// Export format (JSON or GEOJSON)
        export_format: String,

        /// Output file [default: mesh.json, or mesh_geo.json for GEOJSON]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export parameters file, e.g. {"data_name": "SIC"}
        #[arg(short = 'c', long)]
        format_conf: Option<PathBuf>,
    },

    /// Merge one or more meshes into a mesh
    #[command(alias = "merge_mesh")]
    Merge {
        /// Input mesh file
        mesh: PathBuf,

        /// Mesh to merge in, or a directory of meshes with --directory
        merge: PathBuf,

        /// Treat MERGE as a directory and merge every *.json inside it
        #[arg(short, long)]
        directory: bool,

        /// Output mesh file
        #[arg(short, long, default_value = "merged_mesh.output.json")]
        output: PathBuf,
    },

    /// Refine a mesh around points down to its maximum split depth
    Split {
        /// Input mesh file
        mesh: PathBuf,

        /// Points as LAT,LONG
        #[arg(required = true, value_parser = split::parse_point, allow_hyphen_values = true)]
        points: Vec<(f64, f64)>,

        /// Output mesh file
        #[arg(short, long, default_value = "split_mesh.output.json")]
        output: PathBuf,
    },

    /// Display mesh statistics
    Info {
        /// Input mesh file
        mesh: PathBuf,

        /// Show per-attribute statistics
        #[arg(long)]
        detailed: bool,
    },
}

/// Log filter for a `-v` count. `RUST_LOG` takes precedence when set.
fn log_filter(verbose: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directives = match verbose {
        0 => "warn",
        1 => "warn,env_mesh=info",
        2 => "warn,env_mesh=debug",
        _ => "env_mesh=trace,info",
    };
    EnvFilter::new(directives)
}

fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact().with_target(verbose >= 2))
        .with(log_filter(verbose))
        .init();
}

/// Print a failed command to stderr, with mesh diagnostics when the cause is a `MeshError`.
fn report_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "env-mesh failed:".red().bold(), err);

    let mesh_err = err.chain().find_map(|cause| cause.downcast_ref::<env_mesh::MeshError>());
    if let Some(mesh_err) = mesh_err {
        eprintln!("  {} {}", "code".cyan(), mesh_err.code());
        if let Some(location) = mesh_err.location() {
            eprintln!("  {} {}", "at".yellow(), location);
        }
        eprintln!("  {} {}", "hint".green(), mesh_err.recovery_suggestion());
    }
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Create { config, output } => create::run(config, output, &cli),
        Commands::Rebuild { mesh, output } => rebuild::run(mesh, output, &cli),
        Commands::Export {
            mesh,
            export_format,
            output,
            format_conf,
        } => export::run(mesh, export_format, output.as_deref(), format_conf.as_deref(), &cli),
        Commands::Merge {
            mesh,
            merge,
            directory,
            output,
        } => merge::run(mesh, merge, *directory, output, &cli),
        Commands::Split { mesh, points, output } => split::run(mesh, points, output, &cli),
        Commands::Info { mesh, detailed } => info::run(mesh, *detailed, &cli),
    };

    if let Err(err) = &result {
        if !cli.quiet {
            report_error(err);
        }
        std::process::exit(1);
    }

    Ok(())
}

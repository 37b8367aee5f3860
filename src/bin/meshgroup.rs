// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! meshgroup CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use meshgroup::config::parse_triple;
use meshgroup::geometry::TriangleRef;
use meshgroup::group::GroupHit;
use meshgroup::{io, GroupTree, MeshFormat};
use nalgebra::Point3;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshgroup")]
#[command(about = "Inspect, query and re-save hierarchical triangle mesh groups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Multiply all loaded coordinates by this factor
    #[arg(long, global = true, default_value = "1.0")]
    scale: f64,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the group hierarchy
    Tree {
        /// Group configuration (TOML)
        config: PathBuf,
    },

    /// Show details of one group
    Info {
        config: PathBuf,
        /// Full path or bare name of the group
        group: String,
    },

    /// Range query over the leaves below a group
    Search {
        config: PathBuf,
        group: String,

        /// Lower corner, "x,y,z"
        #[arg(long, allow_hyphen_values = true)]
        min: String,

        /// Upper corner, "x,y,z"
        #[arg(long, allow_hyphen_values = true)]
        max: String,

        /// Require all vertices inside the box instead of box overlap
        #[arg(long)]
        every: bool,

        /// Use the exhaustive scan instead of the index
        #[arg(long)]
        linear: bool,

        /// Print hits as JSON
        #[arg(long)]
        json: bool,
    },

    /// Triangle whose centroid is closest to a point
    Nearest {
        config: PathBuf,
        group: String,

        /// Query point, "x,y,z"
        #[arg(long, allow_hyphen_values = true)]
        point: String,
    },

    /// Write every non-empty leaf and a matching configuration
    Save {
        config: PathBuf,

        #[arg(short, long)]
        out_dir: PathBuf,

        /// stl_a or stl_b
        #[arg(short, long, default_value = "stl_b")]
        format: String,

        /// File name suffix (defaults to a timestamp)
        #[arg(short, long)]
        extend: Option<String>,
    },

    /// Convert a mesh file between STL dialects
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// stl_a or stl_b (defaults to the output extension)
        #[arg(short, long)]
        format: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Tree { config } => {
            let tree = load_tree(config, cli.scale)?;
            print!("{}", tree.show_group_hierarchy());
        }
        Commands::Info { config, group } => {
            let tree = load_tree(config, cli.scale)?;
            println!("{}", tree.group_info(group)?);
        }
        Commands::Search {
            config,
            group,
            min,
            max,
            every,
            linear,
            json,
        } => {
            let tree = load_tree(config, cli.scale)?;
            let min = parse_point(min).context("--min")?;
            let max = parse_point(max).context("--max")?;

            let start = Instant::now();
            let hits = if *linear {
                tree.linear_search_polygons(group, min, max, *every)?
            } else {
                tree.search_polygons(group, min, max, *every)?
            };
            let elapsed = start.elapsed();

            if *json {
                let rows: Vec<_> = hits.iter().map(|hit| hit_json(&tree, hit)).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for hit in &hits {
                    print_hit(&tree, hit);
                }
                println!(
                    "\n{} {} triangles in {:.2?}",
                    "Found".green().bold(),
                    hits.len(),
                    elapsed
                );
            }
        }
        Commands::Nearest {
            config,
            group,
            point,
        } => {
            let tree = load_tree(config, cli.scale)?;
            let point = parse_point(point).context("--point")?;
            match tree.search_nearest_polygon(group, &point)? {
                Some(hit) => print_hit(&tree, &hit),
                None => println!("{}", "No triangles below this group".yellow()),
            }
        }
        Commands::Save {
            config,
            out_dir,
            format,
            extend,
        } => {
            let tree = load_tree(config, cli.scale)?;
            let format: MeshFormat = format.parse()?;
            let written = tree
                .save(out_dir, format, extend.as_deref())
                .with_context(|| format!("Failed to save into {}", out_dir.display()))?;
            println!("{} {}", "Saved".green().bold(), written.display());
        }
        Commands::Convert {
            input,
            output,
            format,
        } => convert_command(input, output, format.as_deref(), cli.scale)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_tree(config: &Path, scale: f64) -> Result<GroupTree> {
    if !config.exists() {
        bail!("Configuration not found: {}", config.display());
    }
    let start = Instant::now();
    let tree = meshgroup::load(config, scale)
        .with_context(|| format!("Failed to load {}", config.display()))?;
    tracing::debug!(
        groups = tree.len(),
        triangles = tree.total_triangle_count(),
        "Loaded in {:.2?}",
        start.elapsed()
    );
    Ok(tree)
}

fn parse_point(text: &str) -> Result<Point3<f64>> {
    let [x, y, z] = parse_triple(text)
        .with_context(|| format!("expected \"x,y,z\", got `{}`", text))?;
    Ok(Point3::new(x, y, z))
}

fn print_hit(tree: &GroupTree, hit: &GroupHit<'_, f64>) {
    let group = tree.get(hit.group).map_or("?", |g| g.full_path());
    let tri: &TriangleRef<'_, f64> = &hit.triangle;
    let c = tri.centroid();
    println!(
        "{} {} {} {} {} ({:.6}, {:.6}, {:.6}) {} {:.6}",
        group.cyan(),
        "id".bright_black(),
        tri.id(),
        "ext".bright_black(),
        tri.external_id(),
        c.x,
        c.y,
        c.z,
        "area".bright_black(),
        tri.area()
    );
}

fn hit_json(tree: &GroupTree, hit: &GroupHit<'_, f64>) -> serde_json::Value {
    let group = tree.get(hit.group).map_or("", |g| g.full_path());
    let vertices: Vec<[f64; 3]> = hit
        .triangle
        .vertices()
        .iter()
        .map(|p| [p.x, p.y, p.z])
        .collect();
    let n = hit.triangle.normal();
    serde_json::json!({
        "group": group,
        "id": hit.triangle.id(),
        "external_id": hit.triangle.external_id(),
        "area": hit.triangle.area(),
        "normal": [n.x, n.y, n.z],
        "vertices": vertices,
    })
}

fn convert_command(input: &Path, output: &Path, format: Option<&str>, scale: f64) -> Result<()> {
    let in_format = MeshFormat::from_path(input)?;
    let out_format = match format {
        Some(name) => name.parse()?,
        None => MeshFormat::for_output(output)?,
    };

    let facets = io::load_stl::<f64>(input, in_format, 0, scale)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    io::save_stl(output, out_format, &facets)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} {} ({}) -> {} ({}), {} triangles",
        "Converted".green().bold(),
        input.display(),
        in_format,
        output.display(),
        out_format,
        facets.len()
    );
    Ok(())
}

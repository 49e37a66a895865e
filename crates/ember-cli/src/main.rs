//! ember CLI - inspect scene spatial data
//!
//! Loads a TOML scene description, builds the static geometry structures
//! and runs queries against them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ember_math::{Point3, Ray};
use ember_scene::SurfelChannel;
use serde::Serialize;
use std::path::{Path, PathBuf};

mod scene_file;

use scene_file::{LoadedScene, SceneFile};

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Build and query ember scene spatial data", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display counts, bounds and octree statistics for a scene
    Info {
        /// Path to the scene .toml
        file: PathBuf,
    },
    /// Cast a ray against the static geometry
    Raycast {
        /// Path to the scene .toml
        file: PathBuf,
        /// Ray origin as x,y,z
        #[arg(long, value_parser = parse_point)]
        origin: Point3,
        /// Point the ray heads toward as x,y,z
        #[arg(long, value_parser = parse_point)]
        target: Point3,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pack the scene's surfels into a GBuffer
    Pack {
        /// Path to the scene .toml
        file: PathBuf,
        /// Write the four channels' raw texels here, one after another
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print every row as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Info { file } => show_info(&file)?,
        Commands::Raycast {
            file,
            origin,
            target,
            json,
        } => raycast(&file, origin, target, json)?,
        Commands::Pack { file, output, json } => pack(&file, output.as_deref(), json)?,
    }

    Ok(())
}

fn parse_point(s: &str) -> std::result::Result<Point3, String> {
    let coords: Vec<f32> = s
        .split(',')
        .map(|c| c.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid coordinate in '{s}': {e}"))?;
    match coords[..] {
        [x, y, z] => Ok(Point3::new(x, y, z)),
        _ => Err(format!("expected x,y,z, got '{s}'")),
    }
}

fn load(file: &Path) -> Result<LoadedScene> {
    SceneFile::load(file)?.build()
}

fn show_info(file: &Path) -> Result<()> {
    let LoadedScene {
        mut scene,
        resources,
    } = load(file)?;

    println!("ember scene: {}", file.display());
    println!("  Meshes: {}", resources.meshes.len());
    println!(
        "  Mesh instances: {} ({} static, {} dynamic)",
        scene.mesh_instances().len(),
        scene.static_mesh_instance_ids().len(),
        scene.dynamic_mesh_instance_ids().len()
    );
    println!(
        "  Lights: {} directional, {} point",
        scene.directional_lights().len(),
        scene.point_lights().len()
    );
    println!("  Surfels: {}", scene.surfels().len());

    let bb = scene.bounding_box();
    if bb.is_inverted() {
        println!("  Bounds: empty");
    } else {
        println!(
            "  Bounds: ({:.3}, {:.3}, {:.3}) .. ({:.3}, {:.3}, {:.3})",
            bb.min.x, bb.min.y, bb.min.z, bb.max.x, bb.max.y, bb.max.z
        );
    }

    scene
        .build_static_geometry_octree(&resources)
        .context("octree build failed")?;
    if let Some(octree) = scene.static_geometry_octree() {
        let stats = octree.stats();
        println!("\nOctree:");
        println!("  Triangles: {}", stats.inserted_items);
        println!("  Stored entries: {}", stats.stored_items);
        println!("  Nodes: {} ({} leaves)", stats.node_count, stats.leaf_count);
        println!(
            "  Depth: {} of {}",
            stats.depth_reached,
            octree.max_depth()
        );
    }

    Ok(())
}

#[derive(Serialize)]
struct RayReport {
    octree: Option<HitReport>,
    raytracer: Option<HitReport>,
}

#[derive(Serialize)]
struct HitReport {
    distance: f32,
    point: [f32; 3],
}

fn raycast(file: &Path, origin: Point3, target: Point3, json: bool) -> Result<()> {
    if origin == target {
        anyhow::bail!("origin and target must differ");
    }
    let LoadedScene {
        mut scene,
        resources,
    } = load(file)?;
    scene.build_static_geometry_octree(&resources)?;
    scene.build_static_geometry_raytracer(&resources)?;

    let ray = Ray::from_points(origin, target);
    let report = RayReport {
        octree: scene.raycast_static_octree(&ray)?.map(|h| HitReport {
            distance: h.distance,
            point: ray.at(h.distance).coords.into(),
        }),
        raytracer: scene
            .raycast_static_raytracer(&ray)?
            .map(|h| HitReport {
                distance: h.distance,
                point: h.point.coords.into(),
            }),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (name, hit) in [("octree", &report.octree), ("raytracer", &report.raytracer)] {
        match hit {
            Some(h) => println!(
                "{name:>9}: hit at distance {:.4}, point ({:.4}, {:.4}, {:.4})",
                h.distance, h.point[0], h.point[1], h.point[2]
            ),
            None => println!("{name:>9}: no hit"),
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PackedRow {
    position: [f32; 3],
    normal: [f32; 3],
    albedo: [f32; 3],
    uv: [f32; 3],
}

fn pack(file: &Path, output: Option<&Path>, json: bool) -> Result<()> {
    let LoadedScene { mut scene, .. } = load(file)?;
    scene.pack_surfels_to_gbuffer()?;
    let gbuffer = scene
        .surfel_gbuffer()
        .context("surfel gbuffer missing after packing")?;

    if let Some(path) = output {
        let mut bytes = Vec::new();
        for channel in SurfelChannel::ALL {
            bytes.extend_from_slice(gbuffer.channel_bytes(channel));
        }
        std::fs::write(path, &bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("wrote {} bytes to {}", bytes.len(), path.display());
    }

    if json {
        let rows: Vec<PackedRow> = (0..gbuffer.rows())
            .map(|row| -> Result<PackedRow> {
                Ok(PackedRow {
                    position: gbuffer.texel(SurfelChannel::Position, row)?,
                    normal: gbuffer.texel(SurfelChannel::Normal, row)?,
                    albedo: gbuffer.texel(SurfelChannel::Albedo, row)?,
                    uv: gbuffer.texel(SurfelChannel::Uv, row)?,
                })
            })
            .collect::<Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!(
            "Surfel GBuffer: {} channels x {} rows",
            SurfelChannel::ALL.len(),
            gbuffer.rows()
        );
    }
    Ok(())
}

/// Headless terrain generation report
/// Builds the terrain subsystem, runs a full generation pass and one
/// terraform edit, and prints timing and mesh statistics.
/// Usage: terrain_report [config.toml]

use anyhow::{Context, Result};
use cgmath::Vector3;
use terra_engine::{TerrainConfig, TerrainSystem};

fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => TerrainConfig::load(std::path::Path::new(&path))
            .with_context(|| format!("loading config from {}", path))?,
        None => TerrainConfig::default(),
    };

    println!(
        "Terrain: {:?} chunks, {:?} points per axis, {:?} bounds",
        config.num_chunks, config.points_per_axis, config.bounds_size
    );

    let mut system = TerrainSystem::new(config).context("initializing terrain subsystem")?;
    println!("Backend: {}", system.backend_label());

    let stats = system.force_generate_all().context("generating terrain")?;
    println!(
        "Generated {} chunks, {} vertices",
        stats.chunk_count, stats.total_vertices
    );
    println!(
        "  noise {:.1} ms | carve {:.1} ms | blur {:.1} ms | mesh {:.1} ms",
        stats.noise_ms, stats.carve_ms, stats.blur_ms, stats.mesh_ms
    );

    let mut non_empty = 0;
    let mut max_triangles = 0;
    for chunk in system.chunks() {
        let triangles = chunk.mesh.triangle_count();
        if triangles > 0 {
            non_empty += 1;
            max_triangles = max_triangles.max(triangles);
        }
    }
    println!(
        "  {} of {} chunks carry a surface, densest chunk has {} triangles (cap {})",
        non_empty,
        stats.chunk_count,
        max_triangles,
        system.max_triangles_per_chunk()
    );

    // Exercise one edit at the world origin and report incrementality
    system.tick(1.0 / 60.0);
    let edit = system
        .terraform_instant(Vector3::new(0.0, 0.0, 0.0), 1.0, 2.0)
        .context("terraforming")?;
    println!(
        "Terraform at origin re-meshed {} of {} chunks ({} vertices)",
        edit.affected.len(),
        stats.chunk_count,
        edit.remeshed_vertices
    );

    system.shutdown();
    Ok(())
}

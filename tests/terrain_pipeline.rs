/// End-To-End Terrain Pipeline Tests
///
/// Exercises the public API only: configuration, full generation,
/// terraform edits and the incremental re-mesh guarantee, all on the
/// CPU backend so they run everywhere.

use cgmath::Vector3;
use terra_engine::terrain::chunk::sphere_intersects_box;
use terra_engine::{CaveConfig, ComputeBackend, TerrainConfig, TerrainSystem};

fn base_config() -> TerrainConfig {
    TerrainConfig {
        terrain_seed: 11,
        num_chunks: [2, 2, 2],
        points_per_axis: [6, 6, 6],
        bounds_size: [20.0, 20.0, 20.0],
        noise_scale: 0.4,
        noise_height_multiplier: 1.0,
        blur_enabled: false,
        backend: ComputeBackend::Cpu,
        caves: CaveConfig {
            enabled: false,
            ..CaveConfig::default()
        },
        ..TerrainConfig::default()
    }
}

#[test]
fn constant_field_produces_no_surface() {
    // One chunk of 3x3x3 cells, density held above the iso level
    let config = TerrainConfig {
        num_chunks: [1, 1, 1],
        points_per_axis: [4, 4, 4],
        bounds_size: [10.0, 10.0, 10.0],
        noise_height_multiplier: 0.0,
        iso_level: -0.5,
        flat_shading: true,
        ..base_config()
    };
    let mut system = TerrainSystem::new(config).unwrap();
    let stats = system.force_generate_all().unwrap();
    assert_eq!(stats.total_vertices, 0);
    assert!(system.chunks().iter().all(|c| c.mesh.is_empty()));
}

#[test]
fn single_corner_below_iso_yields_one_marching_cubes_case() {
    let config = TerrainConfig {
        num_chunks: [1, 1, 1],
        points_per_axis: [4, 4, 4],
        bounds_size: [10.0, 10.0, 10.0],
        noise_height_multiplier: 0.0,
        iso_level: -0.5,
        flat_shading: true,
        ..base_config()
    };
    let mut system = TerrainSystem::new(config).unwrap();
    system.force_generate_all().unwrap();

    // Dig exactly the grid corner: with a one-cell radius only the
    // brush centre itself receives the full weight.
    let corner = Vector3::new(-5.0, -5.0, -5.0);
    let stats = system.terraform_instant(corner, 1.0, 1.0).unwrap();
    assert_eq!(stats.affected.len(), 1);

    let chunk = &system.chunks()[0];
    let triangles = chunk.mesh.triangle_count();
    assert!(
        (1..=5).contains(&triangles),
        "corner case produced {} triangles",
        triangles
    );
    // A single inside corner is the simplest case: one triangle
    assert_eq!(triangles, 1);
    assert_eq!(chunk.mesh.indices.len(), triangles * 3);
}

#[test]
fn full_pipeline_is_deterministic() {
    let config = TerrainConfig {
        blur_enabled: true,
        blur_radius: 2,
        caves: CaveConfig {
            enabled: true,
            seed: 5,
            num_walkers: 2,
            walk_length: 30,
            ..CaveConfig::default()
        },
        ..base_config()
    };

    let mut a = TerrainSystem::new(config.clone()).unwrap();
    let mut b = TerrainSystem::new(config).unwrap();
    a.force_generate_all().unwrap();
    b.force_generate_all().unwrap();

    assert_eq!(a.read_raw_density().unwrap(), b.read_raw_density().unwrap());
    for (ca, cb) in a.chunks().iter().zip(b.chunks().iter()) {
        assert_eq!(ca.mesh.positions, cb.mesh.positions);
        assert_eq!(ca.mesh.normals, cb.mesh.normals);
        assert_eq!(ca.mesh.indices, cb.mesh.indices);
    }
}

#[test]
fn inverted_configuration_is_topologically_equivalent() {
    let normal = base_config();
    let inverted = TerrainConfig {
        invert_density: true,
        ..base_config()
    };

    let mut a = TerrainSystem::new(normal).unwrap();
    let mut b = TerrainSystem::new(inverted).unwrap();
    a.force_generate_all().unwrap();
    b.force_generate_all().unwrap();

    // Pointwise negation of the field
    let raw_a = a.read_raw_density().unwrap();
    let raw_b = b.read_raw_density().unwrap();
    for (&x, &y) in raw_a.iter().zip(raw_b.iter()) {
        assert_eq!(x, -y);
    }

    // Complementary marching cubes cases carry the same triangles
    for (ca, cb) in a.chunks().iter().zip(b.chunks().iter()) {
        assert_eq!(ca.mesh.triangle_count(), cb.mesh.triangle_count());
    }
}

#[test]
fn terraform_remeshes_exactly_the_intersecting_chunks() {
    let mut system = TerrainSystem::new(base_config()).unwrap();
    system.force_generate_all().unwrap();

    // Drain the change signals from initial generation
    for chunk in system.chunks_mut() {
        chunk.take_changed();
    }
    let before: Vec<_> = system
        .chunks()
        .iter()
        .map(|c| (c.coord, c.mesh.clone()))
        .collect();

    // Edit tucked into one corner of the world
    let point = Vector3::new(-8.0, -8.0, -8.0);
    let radius = 1.5;
    let stats = system.terraform_instant(point, 0.8, radius).unwrap();
    assert!(!stats.affected.is_empty());

    // Reconstruct the expected set from the documented margin rule
    let voxel_y = system.dims().voxel_world_size().y;
    let edit_radius = (radius / voxel_y).ceil() as i32;
    let world_radius = (edit_radius + 1) as f32 * voxel_y;

    for (chunk, (coord, old_mesh)) in system.chunks_mut().iter_mut().zip(before.iter()) {
        assert_eq!(chunk.coord, *coord);
        let expected = sphere_intersects_box(point, world_radius, chunk.centre, chunk.size);
        let affected = stats.affected.contains(&chunk.coord);
        assert_eq!(expected, affected, "chunk {:?}", chunk.coord);

        if affected {
            assert!(chunk.take_changed());
        } else {
            // Untouched chunks keep their mesh and signals
            assert!(!chunk.take_changed());
            assert!(!chunk.dirty);
            assert_eq!(chunk.mesh.positions, old_mesh.positions);
            assert_eq!(chunk.mesh.indices, old_mesh.indices);
        }
    }
}

#[test]
fn config_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("terrain.toml");
    std::fs::write(
        &path,
        r#"
terrain_seed = 99
num_chunks = [1, 2, 1]
backend = "cpu"

[caves]
enabled = false
"#,
    )
    .unwrap();

    let config = TerrainConfig::load(&path).unwrap();
    assert_eq!(config.terrain_seed, 99);
    assert_eq!(config.num_chunks, [1, 2, 1]);
    assert_eq!(config.backend, ComputeBackend::Cpu);
    assert!(!config.caves.enabled);

    let mut system = TerrainSystem::new(config).unwrap();
    let stats = system.force_generate_all().unwrap();
    assert_eq!(stats.chunk_count, 2);
}

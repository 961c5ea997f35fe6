use cgmath::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::meshing::MAX_TRIANGLES_PER_CELL;
use crate::error::EngineError;
use crate::terrain::carver::CaveCarver;
use crate::terrain::chunk::sphere_intersects_box;
use crate::terrain::compute::{ComputeBackend, FieldCompute, NoiseParams, VertexData};
use crate::terrain::compute_cpu::CpuFieldCompute;
use crate::terrain::config::{CaveConfig, TerrainConfig};
use crate::terrain::field::{Brush, DensityField, FieldDims, GridRegion, GridSize};
use crate::terrain::mesher::build_mesh;
use crate::terrain::system::TerrainSystem;
use crate::terrain::tables::{EDGE_TABLE, TRI_TABLE};
use crate::terrain::chunk::ChunkMesh;

/// Small CPU-backed config the fast tests share
fn test_config() -> TerrainConfig {
    TerrainConfig {
        terrain_seed: 7,
        num_chunks: [2, 2, 2],
        points_per_axis: [5, 5, 5],
        bounds_size: [20.0, 20.0, 20.0],
        noise_scale: 0.4,
        noise_height_multiplier: 1.0,
        blur_enabled: false,
        blur_radius: 0,
        backend: ComputeBackend::Cpu,
        caves: CaveConfig {
            enabled: false,
            ..CaveConfig::default()
        },
        ..TerrainConfig::default()
    }
}

fn noise_params(seed: u64, invert: bool) -> NoiseParams {
    let mut rng = StdRng::seed_from_u64(seed);
    NoiseParams {
        seed_offset: Vector3::new(
            rng.gen::<f32>() * 10000.0,
            rng.gen::<f32>() * 10000.0,
            rng.gen::<f32>() * 10000.0,
        ),
        noise_scale: 0.4,
        height_multiplier: 1.0,
        invert,
    }
}

fn cpu_backend(config: &TerrainConfig) -> CpuFieldCompute {
    CpuFieldCompute::new(FieldDims::from_config(config), config.blur_enabled)
}

#[test]
fn grid_dimensions_follow_overlap_invariant() {
    let mut config = test_config();
    config.num_chunks = [3, 2, 4];
    config.points_per_axis = [10, 6, 8];
    let dims = FieldDims::from_config(&config);
    assert_eq!(dims.grid, GridSize::new(3 * 9 + 1, 2 * 5 + 1, 4 * 7 + 1));
    assert_eq!(dims.voxels_per_chunk(), 9 * 5 * 7);
}

#[test]
fn world_to_grid_clamps_out_of_bounds() {
    let dims = FieldDims::from_config(&test_config());
    let far = dims.world_to_grid(Vector3::new(1000.0, -1000.0, 0.0));
    assert_eq!(far.x, dims.grid.x - 1);
    assert_eq!(far.y, 0);
    assert_eq!(far.z, (dims.grid.z - 1) / 2);
    let centre = dims.world_to_grid(Vector3::new(0.0, 0.0, 0.0));
    assert_eq!(centre, Vector3::new(4, 4, 4));
}

#[test]
fn config_rejects_degenerate_dimensions() {
    let mut config = test_config();
    config.num_chunks = [0, 1, 1];
    assert!(matches!(
        config.validate(),
        Err(EngineError::InvalidConfig { .. })
    ));

    let mut config = test_config();
    config.points_per_axis = [5, 1, 5];
    assert!(config.validate().is_err());

    let mut config = test_config();
    config.bounds_size = [10.0, 0.0, 10.0];
    assert!(config.validate().is_err());

    let mut config = test_config();
    config.blur_radius = -1;
    assert!(config.validate().is_err());
}

#[test]
fn config_toml_round_trip() {
    let config = test_config();
    let text = toml::to_string(&config).expect("serialize");
    let parsed = TerrainConfig::from_toml_str(&text).expect("parse");
    assert_eq!(parsed.num_chunks, config.num_chunks);
    assert_eq!(parsed.points_per_axis, config.points_per_axis);
    assert_eq!(parsed.backend, ComputeBackend::Cpu);

    // Partial files fall back to defaults
    let partial = TerrainConfig::from_toml_str("terrain_seed = 42\n").expect("partial");
    assert_eq!(partial.terrain_seed, 42);
    assert_eq!(partial.num_chunks, TerrainConfig::default().num_chunks);
}

#[test]
fn noise_is_deterministic_for_a_seed() {
    let config = test_config();
    let params = noise_params(7, false);

    let mut a = cpu_backend(&config);
    let mut b = cpu_backend(&config);
    a.sample_noise(&params).unwrap();
    b.sample_noise(&params).unwrap();
    assert_eq!(a.read_raw().unwrap(), b.read_raw().unwrap());

    // A different seed offset lands on a different volume
    let mut c = cpu_backend(&config);
    c.sample_noise(&noise_params(8, false)).unwrap();
    assert_ne!(a.read_raw().unwrap(), c.read_raw().unwrap());
}

#[test]
fn inverted_density_is_pointwise_negation() {
    let config = test_config();
    let mut normal = cpu_backend(&config);
    let mut inverted = cpu_backend(&config);
    normal.sample_noise(&noise_params(7, false)).unwrap();
    inverted.sample_noise(&noise_params(7, true)).unwrap();

    // Carving with the flipped dig strength keeps the mirror exact
    let brush = |weight| Brush {
        centre: Vector3::new(4, 4, 4),
        radius: 3,
        weight,
    };
    normal.carve_sphere(&brush(1.0), 1.0).unwrap();
    inverted.carve_sphere(&brush(-1.0), 1.0).unwrap();

    let a = normal.read_raw().unwrap();
    let b = inverted.read_raw().unwrap();
    for (&x, &y) in a.iter().zip(b.iter()) {
        assert_eq!(x, -y);
    }
}

#[test]
fn blur_radius_zero_is_identity() {
    let mut config = test_config();
    config.blur_enabled = true;
    config.blur_radius = 0;
    let mut backend = cpu_backend(&config);
    backend.sample_noise(&noise_params(7, false)).unwrap();
    backend.blur(0, None).unwrap();
    assert_eq!(backend.read_raw().unwrap(), backend.read_processed().unwrap());
}

#[test]
fn blur_cell_is_neighbourhood_mean() {
    let mut config = test_config();
    config.blur_enabled = true;
    let mut backend = cpu_backend(&config);
    backend.sample_noise(&noise_params(7, false)).unwrap();
    backend.blur(1, None).unwrap();

    let dims = FieldDims::from_config(&config);
    let raw = backend.read_raw().unwrap();
    let processed = backend.read_processed().unwrap();

    let mut sum = 0.0;
    for z in 3..=5 {
        for y in 3..=5 {
            for x in 3..=5 {
                sum += raw[dims.grid.index(x, y, z)];
            }
        }
    }
    let expected = sum / 27.0;
    let got = processed[dims.grid.index(4, 4, 4)];
    assert!((got - expected).abs() < 1e-6, "{} vs {}", got, expected);
}

#[test]
fn region_blur_leaves_outside_untouched() {
    let mut config = test_config();
    config.blur_enabled = true;
    let dims = FieldDims::from_config(&config);
    let mut backend = cpu_backend(&config);
    backend.sample_noise(&noise_params(7, false)).unwrap();

    let region = GridRegion::around(Vector3::new(4, 4, 4), 1, 1, dims.grid);
    backend.blur(1, Some(region)).unwrap();
    let processed = backend.read_processed().unwrap();

    // The processed grid starts zeroed; points outside the region must
    // still be zero while the region holds blurred values.
    assert_ne!(processed[dims.grid.index(4, 4, 4)], 0.0);
    assert_eq!(processed[dims.grid.index(0, 0, 0)], 0.0);
    assert_eq!(processed[dims.grid.index(8, 8, 8)], 0.0);
}

#[test]
fn carving_is_deterministic_and_leaves_other_streams_alone() {
    let mut config = test_config();
    config.caves = CaveConfig {
        enabled: true,
        seed: 3,
        num_walkers: 2,
        walk_length: 40,
        tunnel_radius: 2.0,
        ..CaveConfig::default()
    };
    let dims = FieldDims::from_config(&config);
    let carver = CaveCarver::new(config.caves.clone());

    let mut a = cpu_backend(&config);
    let mut b = cpu_backend(&config);
    a.sample_noise(&noise_params(7, false)).unwrap();
    b.sample_noise(&noise_params(7, false)).unwrap();

    // An unrelated stream must read the same values whether or not a
    // carve runs in between.
    let mut unrelated = StdRng::seed_from_u64(99);
    let before: f32 = unrelated.gen();
    carver.carve(&dims, &mut a, 1.0, 1.0).unwrap();
    let after: f32 = unrelated.gen();
    let mut reference = StdRng::seed_from_u64(99);
    assert_eq!(before, reference.gen::<f32>());
    assert_eq!(after, reference.gen::<f32>());

    carver.carve(&dims, &mut b, 1.0, 1.0).unwrap();
    assert_eq!(a.read_raw().unwrap(), b.read_raw().unwrap());
}

#[test]
fn disabled_carver_is_a_no_op() {
    let config = test_config();
    let dims = FieldDims::from_config(&config);
    let carver = CaveCarver::new(CaveConfig {
        enabled: false,
        ..CaveConfig::default()
    });
    let mut backend = cpu_backend(&config);
    backend.sample_noise(&noise_params(7, false)).unwrap();
    let before = backend.read_raw().unwrap();
    carver.carve(&dims, &mut backend, 1.0, 1.0).unwrap();
    assert_eq!(before, backend.read_raw().unwrap());
}

#[test]
fn carve_crosses_iso_within_radius() {
    // Constant field above the iso level everywhere
    let mut config = test_config();
    config.noise_height_multiplier = 0.0;
    config.iso_level = -0.5;
    let mut system = TerrainSystem::new(config).unwrap();
    system.force_generate_all().unwrap();

    let dims = *system.dims();
    let before = system.read_raw_density().unwrap();
    system.terraform_instant(Vector3::new(0.0, 0.0, 0.0), 1.0, 2.0).unwrap();
    let after = system.read_raw_density().unwrap();

    let centre = dims.world_to_grid(Vector3::new(0.0, 0.0, 0.0));
    let index = dims.grid.index(centre.x, centre.y, centre.z);
    assert!(before[index] >= -0.5, "was solid");
    assert!(after[index] < -0.5, "now empty");
}

#[test]
fn table_sanity() {
    assert_eq!(EDGE_TABLE[0], 0);
    assert_eq!(EDGE_TABLE[255], 0);
    for case in 0..256usize {
        // Complementary cases cross the same edges
        assert_eq!(EDGE_TABLE[case], EDGE_TABLE[255 - case]);

        let row = &TRI_TABLE[case * 16..case * 16 + 16];
        let mut triangles = 0;
        let mut terminated = false;
        for t in (0..16).step_by(3) {
            if t + 2 >= 16 || row[t] == -1 {
                terminated = true;
                break;
            }
            assert!(row[t] >= 0 && row[t] < 12);
            assert!(row[t + 1] >= 0 && row[t + 1] < 12);
            assert!(row[t + 2] >= 0 && row[t + 2] < 12);
            triangles += 1;
        }
        assert!(terminated || triangles == 5);
        assert!(triangles as u32 <= MAX_TRIANGLES_PER_CELL);
    }
}

#[test]
fn sphere_box_intersection() {
    let box_centre = Vector3::new(0.0, 0.0, 0.0);
    let box_size = Vector3::new(2.0, 2.0, 2.0);
    assert!(sphere_intersects_box(Vector3::new(0.0, 0.0, 0.0), 0.1, box_centre, box_size));
    assert!(sphere_intersects_box(Vector3::new(2.0, 0.0, 0.0), 1.1, box_centre, box_size));
    assert!(!sphere_intersects_box(Vector3::new(2.0, 0.0, 0.0), 0.9, box_centre, box_size));
    assert!(!sphere_intersects_box(Vector3::new(3.0, 3.0, 3.0), 1.0, box_centre, box_size));
}

#[test]
fn flat_shading_duplicates_and_smooth_welds() {
    let v = |p: [f32; 3]| VertexData {
        position: p,
        normal: [0.0, 1.0, 0.0],
    };
    // Two triangles sharing the edge (1,0,0)-(0,1,0)
    let soup = [
        v([0.0, 0.0, 0.0]),
        v([1.0, 0.0, 0.0]),
        v([0.0, 1.0, 0.0]),
        v([1.0, 0.0, 0.0]),
        v([1.0, 1.0, 0.0]),
        v([0.0, 1.0, 0.0]),
    ];

    let mut flat = ChunkMesh::default();
    build_mesh(&soup, true, &mut flat);
    assert_eq!(flat.positions.len(), 6);
    assert_eq!(flat.indices.len(), 6);
    assert_eq!(flat.triangle_count(), 2);

    let mut smooth = ChunkMesh::default();
    build_mesh(&soup, false, &mut smooth);
    assert_eq!(smooth.positions.len(), 4);
    assert_eq!(smooth.indices.len(), 6);
    assert_eq!(smooth.triangle_count(), 2);
}

#[test]
fn mesh_capacity_and_vertex_count_invariants() {
    let mut config = test_config();
    config.noise_scale = 0.6;
    let mut system = TerrainSystem::new(config).unwrap();
    system.force_generate_all().unwrap();

    let max_triangles = system.max_triangles_per_chunk() as usize;
    for chunk in system.chunks() {
        assert_eq!(chunk.mesh.indices.len() % 3, 0);
        assert!(chunk.mesh.triangle_count() <= max_triangles);
    }
}

#[test]
fn density_field_aliases_raw_without_blur() {
    let size = GridSize::new(4, 4, 4);
    let mut field = DensityField::new(size, false);
    field.raw_mut()[size.index(1, 2, 3)] = 9.0;
    assert_eq!(field.raw_at(1, 2, 3), 9.0);
    assert_eq!(field.processed_at(1, 2, 3), 9.0);
    assert!(field.blur_pair_mut().is_none());

    let field = DensityField::new(size, true);
    assert_eq!(field.processed().len(), size.len());
}

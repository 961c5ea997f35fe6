/// Terrain Subsystem
///
/// Owns the compute backend, the chunk grid and the shared triangle
/// scratch buffer, and sequences the generation pipeline: noise, then
/// carving, then blur, then per-chunk marching cubes. `terraform` is
/// the sole mutation entry point after initial generation; it re-runs
/// the mesher only for the chunks its edit sphere touches.
///
/// All work is issued from the caller's thread. Chunks are meshed
/// strictly sequentially because every march appends into the one
/// shared triangle buffer.

use std::time::Instant;

use cgmath::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::meshing::MAX_TRIANGLES_PER_CELL;
use crate::constants::noise_gen::SEED_OFFSET_SCALE;
use crate::error::{EngineError, EngineResult};
use crate::terrain::carver::CaveCarver;
use crate::terrain::chunk::{build_chunk_grid, sphere_intersects_box, Chunk, ChunkPos};
use crate::terrain::compute::{
    create_backend, ChunkDispatch, FieldCompute, NoiseParams, VertexData,
};
use crate::terrain::config::TerrainConfig;
use crate::terrain::field::{Brush, FieldDims, GridRegion};
use crate::terrain::mesher::build_mesh;

/// Timing and output of a full generation pass
#[derive(Debug, Clone, Default)]
pub struct GenerationStats {
    pub noise_ms: f64,
    pub carve_ms: f64,
    pub blur_ms: f64,
    pub mesh_ms: f64,
    pub total_vertices: usize,
    pub chunk_count: usize,
}

/// Result of one terraform edit
#[derive(Debug, Clone, Default)]
pub struct TerraformStats {
    /// Chunks that intersected the edit sphere and were re-meshed
    pub affected: Vec<ChunkPos>,
    /// Vertices across the re-meshed chunks
    pub remeshed_vertices: usize,
}

pub struct TerrainSystem {
    config: TerrainConfig,
    dims: FieldDims,
    compute: Box<dyn FieldCompute>,
    carver: CaveCarver,
    chunks: Vec<Chunk>,
    /// Shared triangle readback buffer; one march in flight at a time
    scratch: Vec<VertexData>,
    iso_level: f32,
    dig_strength: f32,
    main_cave_dig_strength: f32,
    seed_offset: Vector3<f32>,
    max_triangles: u32,
    last_dt: f32,
}

impl TerrainSystem {
    /// Validate the config and acquire every resource the subsystem
    /// needs: density grids, chunk grid, compute backend, scratch.
    pub fn new(config: TerrainConfig) -> EngineResult<Self> {
        config.validate()?;
        let dims = FieldDims::from_config(&config);
        let max_triangles = dims.voxels_per_chunk() * MAX_TRIANGLES_PER_CELL;

        let compute = create_backend(config.backend, &dims, config.blur_enabled, max_triangles)?;

        // Inverting the density negates the iso comparison and the dig
        // direction together, so both configurations carve the same
        // shapes.
        let sign = if config.invert_density { -1.0 } else { 1.0 };
        let iso_level = config.iso_level * sign;
        let dig_strength = config.caves.dig_strength * sign;
        let main_cave_dig_strength = config.caves.main_cave_dig_strength * sign;

        // Three uniform draws scaled into a large world-space offset;
        // the same terrain seed always lands on the same noise volume.
        let mut rng = StdRng::seed_from_u64(config.terrain_seed);
        let seed_offset = Vector3::new(
            rng.gen::<f32>() * SEED_OFFSET_SCALE,
            rng.gen::<f32>() * SEED_OFFSET_SCALE,
            rng.gen::<f32>() * SEED_OFFSET_SCALE,
        );

        let chunks = build_chunk_grid(&dims);
        let carver = CaveCarver::new(config.caves.clone());

        log::info!(
            "[TerrainSystem] Initialized on {} backend: {}x{}x{} chunks, {}x{}x{} grid",
            compute.label(),
            dims.num_chunks.x,
            dims.num_chunks.y,
            dims.num_chunks.z,
            dims.grid.x,
            dims.grid.y,
            dims.grid.z
        );

        Ok(Self {
            config,
            dims,
            compute,
            carver,
            chunks,
            scratch: Vec::new(),
            iso_level,
            dig_strength,
            main_cave_dig_strength,
            seed_offset,
            max_triangles,
            last_dt: 0.0,
        })
    }

    /// Record elapsed time for rate-based edits
    pub fn tick(&mut self, dt: f32) {
        self.last_dt = dt;
    }

    /// Release all resources. Dropping the system is equivalent; this
    /// exists so an owner can tear down at a chosen point.
    pub fn shutdown(self) {
        log::info!("[TerrainSystem] Shutdown, releasing device buffers");
    }

    /// Full rebuild: noise, carve, blur, then mesh every chunk
    pub fn force_generate_all(&mut self) -> EngineResult<GenerationStats> {
        let mut stats = GenerationStats::default();

        let start = Instant::now();
        self.compute.sample_noise(&NoiseParams {
            seed_offset: self.seed_offset,
            noise_scale: self.config.noise_scale,
            height_multiplier: self.config.noise_height_multiplier,
            invert: self.config.invert_density,
        })?;
        stats.noise_ms = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        self.carver.carve(
            &self.dims,
            self.compute.as_mut(),
            self.dig_strength,
            self.main_cave_dig_strength,
        )?;
        stats.carve_ms = start.elapsed().as_secs_f64() * 1000.0;

        if self.config.blur_enabled {
            let start = Instant::now();
            self.compute.blur(self.config.blur_radius, None)?;
            stats.blur_ms = start.elapsed().as_secs_f64() * 1000.0;
        }

        let start = Instant::now();
        for index in 0..self.chunks.len() {
            self.chunks[index].mark_dirty();
            self.generate_chunk(index)?;
        }
        stats.mesh_ms = start.elapsed().as_secs_f64() * 1000.0;

        stats.chunk_count = self.chunks.len();
        stats.total_vertices = self.chunks.iter().map(|c| c.mesh.positions.len()).sum();

        log::info!(
            "[TerrainSystem] Generated {} chunks, {} vertices (noise {:.1} ms, carve {:.1} ms, blur {:.1} ms, mesh {:.1} ms)",
            stats.chunk_count,
            stats.total_vertices,
            stats.noise_ms,
            stats.carve_ms,
            stats.blur_ms,
            stats.mesh_ms
        );
        Ok(stats)
    }

    /// Localized edit scaled by the last `tick` delta (rate-based
    /// tools). Positive weight digs; negative weight builds.
    pub fn terraform(
        &mut self,
        world_point: Vector3<f32>,
        weight: f32,
        radius: f32,
    ) -> EngineResult<TerraformStats> {
        let dt = self.last_dt;
        self.apply_edit(world_point, weight, radius, dt)
    }

    /// Localized edit applied as a single instantaneous delta
    pub fn terraform_instant(
        &mut self,
        world_point: Vector3<f32>,
        weight: f32,
        radius: f32,
    ) -> EngineResult<TerraformStats> {
        self.apply_edit(world_point, weight, radius, 1.0)
    }

    fn apply_edit(
        &mut self,
        world_point: Vector3<f32>,
        weight: f32,
        radius: f32,
        dt: f32,
    ) -> EngineResult<TerraformStats> {
        let voxel = self.dims.voxel_world_size();
        // Non-cubic voxels use the Y spacing for the radius on every
        // axis (deliberate simplification).
        let edit_radius = (radius / voxel.y).ceil() as i32;
        let centre = self.dims.world_to_grid(world_point);

        self.compute.carve_sphere(
            &Brush {
                centre,
                radius: edit_radius,
                weight,
            },
            dt,
        )?;

        let blur_pad = if self.config.blur_enabled {
            self.config.blur_radius
        } else {
            0
        };
        if self.config.blur_enabled {
            let region = GridRegion::around(centre, edit_radius, blur_pad, self.dims.grid);
            self.compute.blur(self.config.blur_radius, Some(region))?;
        }

        // Re-mesh exactly the chunks the padded edit sphere touches
        let world_radius = (edit_radius + 1 + blur_pad) as f32 * voxel.y;
        let mut stats = TerraformStats::default();
        for index in 0..self.chunks.len() {
            let (chunk_centre, chunk_size, coord) = {
                let chunk = &self.chunks[index];
                (chunk.centre, chunk.size, chunk.coord)
            };
            if sphere_intersects_box(world_point, world_radius, chunk_centre, chunk_size) {
                self.chunks[index].mark_dirty();
                self.generate_chunk(index)?;
                stats.remeshed_vertices += self.chunks[index].mesh.positions.len();
                stats.affected.push(coord);
            }
        }

        log::debug!(
            "[TerrainSystem] Terraform at ({:.1}, {:.1}, {:.1}) r={:.1}: {} chunks re-meshed",
            world_point.x,
            world_point.y,
            world_point.z,
            radius,
            stats.affected.len()
        );
        Ok(stats)
    }

    /// March one chunk and rebuild its mesh in place
    fn generate_chunk(&mut self, index: usize) -> EngineResult<()> {
        let dispatch = ChunkDispatch {
            grid_offset: self.chunks[index].grid_offset(self.dims.points_per_axis),
            voxels: Vector3::new(
                self.dims.points_per_axis.x - 1,
                self.dims.points_per_axis.y - 1,
                self.dims.points_per_axis.z - 1,
            ),
            iso_level: self.iso_level,
        };

        let triangle_count = self.compute.march_chunk(&dispatch, &mut self.scratch)?;
        if triangle_count > self.max_triangles {
            return Err(EngineError::CapacityExceeded {
                resource: "triangle buffer".to_string(),
                needed: triangle_count as u64,
                capacity: self.max_triangles as u64,
            });
        }

        let chunk = &mut self.chunks[index];
        build_mesh(&self.scratch, self.config.flat_shading, &mut chunk.mesh);
        chunk.dirty = false;
        chunk.mark_changed();
        Ok(())
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn dims(&self) -> &FieldDims {
        &self.dims
    }

    /// Triangle capacity per chunk march
    pub fn max_triangles_per_chunk(&self) -> u32 {
        self.max_triangles
    }

    /// Name of the active compute backend
    pub fn backend_label(&self) -> &'static str {
        self.compute.label()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    pub fn chunk_at(&self, coord: ChunkPos) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.coord == coord)
    }

    /// Read back the raw density grid (diagnostics and tests)
    pub fn read_raw_density(&mut self) -> EngineResult<Vec<f32>> {
        self.compute.read_raw()
    }

    /// Read back the grid the mesher consumes
    pub fn read_processed_density(&mut self) -> EngineResult<Vec<f32>> {
        self.compute.read_processed()
    }
}

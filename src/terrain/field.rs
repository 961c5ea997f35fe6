/// Density Field Storage and Grid Geometry
///
/// The density grid covers the union of all chunks with a one-voxel
/// overlap between neighbours: the last grid point of chunk `i`
/// coincides in world space with the first grid point of chunk `i+1`,
/// so the grid is `num_chunks * (points_per_axis - 1) + 1` points per
/// axis. World bounds are centred on the origin.

use cgmath::{ElementWise, Vector3};

use crate::terrain::config::TerrainConfig;

/// Dimensions of the full density grid, in points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridSize {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Total number of grid points
    pub fn len(&self) -> usize {
        (self.x as usize) * (self.y as usize) * (self.z as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear index for a grid point
    pub fn index(&self, x: i32, y: i32, z: i32) -> usize {
        debug_assert!(self.contains(x, y, z));
        (x as usize) + (y as usize) * (self.x as usize) + (z as usize) * (self.x as usize) * (self.y as usize)
    }

    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0 && y >= 0 && z >= 0 && x < self.x && y < self.y && z < self.z
    }

    pub fn as_vec(&self) -> Vector3<i32> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// An axis-aligned, inclusive box of grid points
#[derive(Debug, Clone, Copy)]
pub struct GridRegion {
    pub min: Vector3<i32>,
    pub max: Vector3<i32>,
}

impl GridRegion {
    /// The whole grid
    pub fn full(size: GridSize) -> Self {
        Self {
            min: Vector3::new(0, 0, 0),
            max: Vector3::new(size.x - 1, size.y - 1, size.z - 1),
        }
    }

    /// Box around a brush centre, padded by `pad` cells on every side,
    /// clamped to the grid.
    pub fn around(centre: Vector3<i32>, radius: i32, pad: i32, size: GridSize) -> Self {
        let r = radius + pad;
        Self {
            min: Vector3::new(
                (centre.x - r).max(0),
                (centre.y - r).max(0),
                (centre.z - r).max(0),
            ),
            max: Vector3::new(
                (centre.x + r).min(size.x - 1),
                (centre.y + r).min(size.y - 1),
                (centre.z + r).min(size.z - 1),
            ),
        }
    }

    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= self.min.x
            && y >= self.min.y
            && z >= self.min.z
            && x <= self.max.x
            && y <= self.max.y
            && z <= self.max.z
    }

    /// Extent per axis in points
    pub fn extent(&self) -> Vector3<i32> {
        Vector3::new(
            self.max.x - self.min.x + 1,
            self.max.y - self.min.y + 1,
            self.max.z - self.min.z + 1,
        )
    }
}

/// Grid and world geometry derived from the config, shared by both
/// compute backends and the chunk grid.
#[derive(Debug, Clone, Copy)]
pub struct FieldDims {
    pub grid: GridSize,
    pub bounds: Vector3<f32>,
    pub num_chunks: Vector3<i32>,
    pub points_per_axis: Vector3<i32>,
}

impl FieldDims {
    pub fn from_config(config: &TerrainConfig) -> Self {
        let num_chunks = Vector3::new(
            config.num_chunks[0],
            config.num_chunks[1],
            config.num_chunks[2],
        );
        let points_per_axis = Vector3::new(
            config.points_per_axis[0],
            config.points_per_axis[1],
            config.points_per_axis[2],
        );
        // One fewer point per added chunk: overlapping boundary points
        // are shared between neighbours.
        let grid = GridSize::new(
            num_chunks.x * (points_per_axis.x - 1) + 1,
            num_chunks.y * (points_per_axis.y - 1) + 1,
            num_chunks.z * (points_per_axis.z - 1) + 1,
        );
        Self {
            grid,
            bounds: Vector3::new(
                config.bounds_size[0],
                config.bounds_size[1],
                config.bounds_size[2],
            ),
            num_chunks,
            points_per_axis,
        }
    }

    /// World-space size of one voxel, per axis
    pub fn voxel_world_size(&self) -> Vector3<f32> {
        self.bounds.div_element_wise(Vector3::new(
            self.grid.x as f32,
            self.grid.y as f32,
            self.grid.z as f32,
        ))
    }

    /// World-space size of one chunk, per axis
    pub fn chunk_world_size(&self) -> Vector3<f32> {
        self.bounds.div_element_wise(Vector3::new(
            self.num_chunks.x as f32,
            self.num_chunks.y as f32,
            self.num_chunks.z as f32,
        ))
    }

    /// Cells per chunk
    pub fn voxels_per_chunk(&self) -> u32 {
        ((self.points_per_axis.x - 1)
            * (self.points_per_axis.y - 1)
            * (self.points_per_axis.z - 1)) as u32
    }

    /// Map a world point to the nearest grid point. Out-of-bounds
    /// points clamp to the boundary rather than erroring.
    pub fn world_to_grid(&self, point: Vector3<f32>) -> Vector3<i32> {
        let t = Vector3::new(
            ((point.x + self.bounds.x / 2.0) / self.bounds.x).clamp(0.0, 1.0),
            ((point.y + self.bounds.y / 2.0) / self.bounds.y).clamp(0.0, 1.0),
            ((point.z + self.bounds.z / 2.0) / self.bounds.z).clamp(0.0, 1.0),
        );
        Vector3::new(
            (t.x * (self.grid.x - 1) as f32).round() as i32,
            (t.y * (self.grid.y - 1) as f32).round() as i32,
            (t.z * (self.grid.z - 1) as f32).round() as i32,
        )
    }

    /// World position of a grid point
    pub fn grid_to_world(&self, x: i32, y: i32, z: i32) -> Vector3<f32> {
        Vector3::new(
            (x as f32 / (self.grid.x - 1) as f32 - 0.5) * self.bounds.x,
            (y as f32 / (self.grid.y - 1) as f32 - 0.5) * self.bounds.y,
            (z as f32 / (self.grid.z - 1) as f32 - 0.5) * self.bounds.z,
        )
    }
}

/// Ephemeral spherical edit: shared by terraforming and cave carving
#[derive(Debug, Clone, Copy)]
pub struct Brush {
    /// Grid-space centre
    pub centre: Vector3<i32>,
    /// Radius in cells
    pub radius: i32,
    /// Density subtracted at the centre (falls off to zero at the edge)
    pub weight: f32,
}

/// CPU-side density storage: the raw grid plus, when blurring is
/// enabled, the processed grid the mesher actually reads. With blur
/// disabled the processed grid aliases raw.
pub struct DensityField {
    size: GridSize,
    raw: Vec<f32>,
    processed: Option<Vec<f32>>,
}

impl DensityField {
    pub fn new(size: GridSize, blurred: bool) -> Self {
        let raw = vec![0.0; size.len()];
        let processed = if blurred { Some(vec![0.0; size.len()]) } else { None };
        Self { size, raw, processed }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn raw(&self) -> &[f32] {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut [f32] {
        &mut self.raw
    }

    /// The grid consumed by meshing: blurred when a processed grid
    /// exists, otherwise the raw grid itself.
    pub fn processed(&self) -> &[f32] {
        self.processed.as_deref().unwrap_or(&self.raw)
    }

    /// Split borrow for the blur pass: raw source, processed target.
    /// Only meaningful when a processed grid exists.
    pub fn blur_pair_mut(&mut self) -> Option<(&[f32], &mut [f32])> {
        match self.processed.as_mut() {
            Some(processed) => Some((&self.raw, processed)),
            None => None,
        }
    }

    pub fn raw_at(&self, x: i32, y: i32, z: i32) -> f32 {
        self.raw[self.size.index(x, y, z)]
    }

    pub fn processed_at(&self, x: i32, y: i32, z: i32) -> f32 {
        self.processed()[self.size.index(x, y, z)]
    }
}

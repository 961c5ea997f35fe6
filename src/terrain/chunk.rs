/// Chunk Grid
///
/// World space is partitioned once at startup into a fixed 3D array
/// of chunks centred on the origin. Chunks are never created or
/// destroyed afterwards; regeneration overwrites a chunk's mesh in
/// place, so vertex capacity is retained across rebuilds.

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::terrain::field::FieldDims;

/// Position of a chunk in the chunk grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Renderable mesh owned by a chunk: flat triangle list or welded
/// vertices with shared indices, depending on the shading mode.
#[derive(Debug, Clone, Default)]
pub struct ChunkMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    /// Empty the mesh without releasing capacity
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.indices.clear();
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// One spatial partition of the terrain, independently re-meshed
pub struct Chunk {
    pub coord: ChunkPos,
    /// World-space centre
    pub centre: Vector3<f32>,
    /// World-space size
    pub size: Vector3<f32>,
    pub mesh: ChunkMesh,
    /// Needs re-meshing
    pub dirty: bool,
    /// Mesh replaced since the signal was last taken
    changed: bool,
}

impl Chunk {
    pub fn new(coord: ChunkPos, centre: Vector3<f32>, size: Vector3<f32>) -> Self {
        Self {
            coord,
            centre,
            size,
            mesh: ChunkMesh::default(),
            dirty: true,
            changed: false,
        }
    }

    /// Grid coordinate of this chunk's first density point
    pub fn grid_offset(&self, points_per_axis: Vector3<i32>) -> Vector3<i32> {
        Vector3::new(
            self.coord.x * (points_per_axis.x - 1),
            self.coord.y * (points_per_axis.y - 1),
            self.coord.z * (points_per_axis.z - 1),
        )
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Incremental-upload signal: true once per mesh replacement
    pub fn take_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }

    /// Peek at the change signal without consuming it
    pub fn has_changed(&self) -> bool {
        self.changed
    }
}

/// Create every chunk for the configured extent, centred on the origin
pub fn build_chunk_grid(dims: &FieldDims) -> Vec<Chunk> {
    let n = dims.num_chunks;
    let chunk_size = dims.chunk_world_size();
    let mut chunks = Vec::with_capacity((n.x * n.y * n.z) as usize);

    for y in 0..n.y {
        for x in 0..n.x {
            for z in 0..n.z {
                let centre = Vector3::new(
                    (-(n.x - 1) as f32 / 2.0 + x as f32) * chunk_size.x,
                    (-(n.y - 1) as f32 / 2.0 + y as f32) * chunk_size.y,
                    (-(n.z - 1) as f32 / 2.0 + z as f32) * chunk_size.z,
                );
                chunks.push(Chunk::new(ChunkPos::new(x, y, z), centre, chunk_size));
            }
        }
    }
    chunks
}

/// Sphere / axis-aligned box intersection in world space
pub fn sphere_intersects_box(
    sphere_centre: Vector3<f32>,
    radius: f32,
    box_centre: Vector3<f32>,
    box_size: Vector3<f32>,
) -> bool {
    let half = box_size / 2.0;
    let dx = (sphere_centre.x - box_centre.x).clamp(-half.x, half.x);
    let dy = (sphere_centre.y - box_centre.y).clamp(-half.y, half.y);
    let dz = (sphere_centre.z - box_centre.z).clamp(-half.z, half.z);
    let closest = box_centre + Vector3::new(dx, dy, dz);
    let to_sphere = sphere_centre - closest;
    to_sphere.x * to_sphere.x + to_sphere.y * to_sphere.y + to_sphere.z * to_sphere.z
        <= radius * radius
}

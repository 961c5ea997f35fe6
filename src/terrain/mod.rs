/// Procedural Voxel Terrain Subsystem
///
/// A 3D scalar density field sampled by seeded noise, carved by
/// random-walk cave generation, smoothed by a box blur and
/// triangulated chunk-by-chunk with marching cubes on a compute
/// backend. Localized edits ("terraforming") re-mesh only the chunks
/// they touch.
///
/// Key pieces:
/// - Density field generation (CPU or GPU backend behind one trait)
/// - Seeded, reproducible cave carving
/// - Boundary-consistent chunking with one-voxel overlap
/// - Incremental re-triangulation driven by dirty chunks

pub mod carver;
pub mod chunk;
pub mod compute;
pub mod compute_cpu;
pub mod compute_gpu;
pub mod config;
pub mod error;
pub mod field;
pub mod mesher;
pub mod system;
pub mod tables;

pub use carver::CaveCarver;
pub use chunk::{Chunk, ChunkMesh, ChunkPos};
pub use compute::{ComputeBackend, FieldCompute, NoiseParams, VertexData};
pub use config::{CaveConfig, TerrainConfig};
pub use field::{Brush, DensityField, FieldDims, GridRegion, GridSize};
pub use mesher::build_mesh;
pub use system::{GenerationStats, TerraformStats, TerrainSystem};

#[cfg(test)]
mod tests;

pub mod constants;
pub mod error;
pub mod terrain;

pub use error::{EngineError, EngineResult};
pub use terrain::chunk::{Chunk, ChunkMesh, ChunkPos};
pub use terrain::compute::{ComputeBackend, VertexData};
pub use terrain::config::{CaveConfig, TerrainConfig};
pub use terrain::system::{GenerationStats, TerraformStats, TerrainSystem};

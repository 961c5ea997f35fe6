/// Field Compute Interface
///
/// The four dispatch-shaped operations the terrain core needs from a
/// compute backend: noise fill, sphere subtraction, box blur and the
/// per-chunk marching cubes pass. Each call is a synchronous
/// dispatch-then-readback unit from the caller's perspective; the
/// caller sequences them (noise before carving, carving before blur,
/// blur before any meshing) and never overlaps two marches, since
/// every march appends into one shared triangle buffer.

use bytemuck::{Pod, Zeroable};
use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::terrain::compute_cpu::CpuFieldCompute;
use crate::terrain::compute_gpu::GpuFieldCompute;
use crate::terrain::field::{Brush, FieldDims, GridRegion};

/// Vertex produced by the marching cubes kernel, in world space.
/// Triples of these form triangles; ownership is transient and the
/// data is copied into chunk-owned storage right after each march.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct VertexData {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Noise dispatch parameters
#[derive(Debug, Clone, Copy)]
pub struct NoiseParams {
    /// Deterministic world-space offset derived from the seed
    pub seed_offset: Vector3<f32>,
    /// Noise frequency
    pub noise_scale: f32,
    /// Density amplitude
    pub height_multiplier: f32,
    /// Negate the sampled density
    pub invert: bool,
}

/// One chunk's marching cubes dispatch
#[derive(Debug, Clone, Copy)]
pub struct ChunkDispatch {
    /// Grid coordinate of the chunk's first point
    pub grid_offset: Vector3<i32>,
    /// Cells per axis in this chunk
    pub voxels: Vector3<i32>,
    /// Surface threshold
    pub iso_level: f32,
}

/// Compute backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeBackend {
    /// Use the GPU when a compute-capable adapter exists, else CPU
    Auto,
    /// CPU reference implementation
    Cpu,
    /// GPU only; construction fails without an adapter
    Gpu,
}

/// A compute backend owning the density grids
pub trait FieldCompute {
    /// Short name for logs
    fn label(&self) -> &'static str;

    /// Whether dispatches run on a GPU device
    fn is_gpu(&self) -> bool;

    /// Fill the raw grid pointwise from coherent noise
    fn sample_noise(&mut self, params: &NoiseParams) -> EngineResult<()>;

    /// Subtract a sphere of density from the raw grid
    fn carve_sphere(&mut self, brush: &Brush, delta_time: f32) -> EngineResult<()>;

    /// Box-blur raw into processed over `region` (whole grid if None).
    /// No-op when the backend was built without a processed grid.
    fn blur(&mut self, radius: i32, region: Option<GridRegion>) -> EngineResult<()>;

    /// March one chunk's cells against the processed grid, replacing
    /// `out` with the resulting vertex triples. Returns the triangle
    /// count; `out.len()` is exactly three times that.
    fn march_chunk(
        &mut self,
        dispatch: &ChunkDispatch,
        out: &mut Vec<VertexData>,
    ) -> EngineResult<u32>;

    /// Read back the raw grid
    fn read_raw(&mut self) -> EngineResult<Vec<f32>>;

    /// Read back the grid meshing consumes (processed, or raw when
    /// blurring is disabled)
    fn read_processed(&mut self) -> EngineResult<Vec<f32>>;
}

/// Build the backend the config asked for. `Auto` logs and falls back
/// to the CPU when the GPU is unavailable; a missing device is a
/// configuration problem, not a reason to abort the subsystem.
pub fn create_backend(
    selection: ComputeBackend,
    dims: &FieldDims,
    blur_enabled: bool,
    max_triangles: u32,
) -> EngineResult<Box<dyn FieldCompute>> {
    match selection {
        ComputeBackend::Cpu => Ok(Box::new(CpuFieldCompute::new(*dims, blur_enabled))),
        ComputeBackend::Gpu => {
            let gpu = GpuFieldCompute::new(*dims, blur_enabled, max_triangles)?;
            Ok(Box::new(gpu))
        }
        ComputeBackend::Auto => match GpuFieldCompute::new(*dims, blur_enabled, max_triangles) {
            Ok(gpu) => Ok(Box::new(gpu)),
            Err(e) => {
                log::warn!("[TerrainCompute] GPU unavailable ({}), falling back to CPU", e);
                Ok(Box::new(CpuFieldCompute::new(*dims, blur_enabled)))
            }
        },
    }
}

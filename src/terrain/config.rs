/// Terrain Configuration
///
/// Plain config structs with defaults plus a TOML loader. Degenerate
/// dimensions are rejected here, at configuration time, before any
/// buffer is sized from them.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::terrain::compute::ComputeBackend;
use crate::terrain::error::TerrainErrorContext;

/// Cave carving parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveConfig {
    /// Master switch; when off the carver is a no-op
    pub enabled: bool,
    /// Seed for the carving-local random stream
    pub seed: u64,
    /// Number of independent random walks
    pub num_walkers: u32,
    /// Steps per walk
    pub walk_length: u32,
    /// Tunnel radius in world units
    pub tunnel_radius: f32,
    /// Density subtracted per dig step
    pub dig_strength: f32,
    /// Forward bias when re-randomizing a walker's direction
    pub movement: f32,
    /// Carve one large sphere near the bottom-middle of the field
    pub main_cave_enabled: bool,
    /// Main cave radius in world units
    pub main_cave_radius: f32,
    /// Density subtracted by the main cave sphere
    pub main_cave_dig_strength: f32,
}

impl Default for CaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: 0,
            num_walkers: 10,
            walk_length: 500,
            tunnel_radius: 2.5,
            dig_strength: 1.0,
            movement: 2.0,
            main_cave_enabled: true,
            main_cave_radius: 15.0,
            main_cave_dig_strength: 1.0,
        }
    }
}

/// Terrain subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Seed for the density noise offset
    pub terrain_seed: u64,
    /// Chunk counts per axis
    pub num_chunks: [i32; 3],
    /// Grid points per chunk axis (cells per axis is one less)
    pub points_per_axis: [i32; 3],
    /// World bounds size per axis, centred on the origin
    pub bounds_size: [f32; 3],
    /// Iso-surface threshold
    pub iso_level: f32,
    /// Negate the density field (and dig strengths / iso to match)
    pub invert_density: bool,
    /// Duplicate vertices with per-face normals instead of welding
    pub flat_shading: bool,
    /// Noise frequency in world units
    pub noise_scale: f32,
    /// Density amplitude
    pub noise_height_multiplier: f32,
    /// Run the box blur pass over the raw field
    pub blur_enabled: bool,
    /// Box blur radius in cells
    pub blur_radius: i32,
    /// Compute backend selection
    pub backend: ComputeBackend,
    /// Cave carving parameters
    pub caves: CaveConfig,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            terrain_seed: 0,
            num_chunks: [4, 4, 4],
            points_per_axis: [10, 10, 10],
            bounds_size: [40.0, 40.0, 40.0],
            iso_level: 0.0,
            invert_density: false,
            flat_shading: false,
            noise_scale: 0.12,
            noise_height_multiplier: 1.0,
            blur_enabled: true,
            blur_radius: 3,
            backend: ComputeBackend::Auto,
            caves: CaveConfig::default(),
        }
    }
}

impl TerrainConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: TerrainConfig = toml::from_str(text).terrain_context("config parse")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path).terrain_context("config read")?;
        Self::from_toml_str(&text)
    }

    /// Reject degenerate dimensions before anything is sized from them
    pub fn validate(&self) -> EngineResult<()> {
        for (axis, &n) in ["x", "y", "z"].iter().zip(self.num_chunks.iter()) {
            if n < 1 {
                return Err(invalid("num_chunks", axis, "must be at least 1"));
            }
        }
        for (axis, &p) in ["x", "y", "z"].iter().zip(self.points_per_axis.iter()) {
            if p < 2 {
                return Err(invalid("points_per_axis", axis, "must be at least 2"));
            }
        }
        for (axis, &b) in ["x", "y", "z"].iter().zip(self.bounds_size.iter()) {
            if !(b > 0.0) {
                return Err(invalid("bounds_size", axis, "must be positive"));
            }
        }
        if self.blur_radius < 0 {
            return Err(EngineError::InvalidConfig {
                field: "blur_radius".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        if self.caves.enabled && !(self.caves.tunnel_radius > 0.0) {
            return Err(EngineError::InvalidConfig {
                field: "caves.tunnel_radius".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.caves.enabled && self.caves.movement < 0.0 {
            return Err(EngineError::InvalidConfig {
                field: "caves.movement".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

fn invalid(field: &str, axis: &str, reason: &str) -> EngineError {
    EngineError::InvalidConfig {
        field: format!("{}.{}", field, axis),
        reason: reason.to_string(),
    }
}

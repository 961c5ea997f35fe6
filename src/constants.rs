// Terra Engine Constants - SINGLE SOURCE OF TRUTH
//
// This file contains the fixed constants used throughout the terrain
// core. CPU and GPU code paths are both sized from these values.

/// Meshing bounds
pub mod meshing {
    /// Marching cubes emits at most 5 triangles per cell; the shared
    /// triangle buffer is sized from this bound and exceeding it is a
    /// fatal invariant violation.
    pub const MAX_TRIANGLES_PER_CELL: u32 = 5;
}

/// Cave carving tunables
pub mod carving {
    /// Walkers start at least this many cells away from every grid
    /// boundary.
    pub const WALKER_BOUNDARY_MARGIN: i32 = 10;

    /// Per-step chance that a walker picks a new direction.
    pub const DIRECTION_CHANGE_CHANCE: f32 = 0.25;

    /// Dig-weight multiplier applied for the single step in which a
    /// walker bounces off the top Y boundary. Carves a wide opening so
    /// caves break out near the terrain surface. Tunable; the surface
    /// still closes correctly at other values.
    pub const SURFACE_BREAKOUT_MULTIPLIER: f32 = 100.0;
}

/// Noise seeding
pub mod noise_gen {
    /// Seed offsets are drawn uniformly in [0,1) and scaled by this
    /// factor, one draw per axis.
    pub const SEED_OFFSET_SCALE: f32 = 10000.0;
}

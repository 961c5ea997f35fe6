/// Random-Walk Cave Carving
///
/// Seeded walkers wander the density grid subtracting spheres of
/// density along their paths, optionally after one large sphere is
/// carved near the bottom-middle of the field. The carver owns its
/// random stream (`StdRng` reseeded per carve), so running it never
/// disturbs randomness used anywhere else and the same cave seed
/// always digs the same caves.

use cgmath::{InnerSpace, Vector3, Zero};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::carving::{
    DIRECTION_CHANGE_CHANCE, SURFACE_BREAKOUT_MULTIPLIER, WALKER_BOUNDARY_MARGIN,
};
use crate::error::EngineResult;
use crate::terrain::compute::FieldCompute;
use crate::terrain::config::CaveConfig;
use crate::terrain::field::{Brush, FieldDims};

pub struct CaveCarver {
    config: CaveConfig,
}

impl CaveCarver {
    pub fn new(config: CaveConfig) -> Self {
        Self { config }
    }

    /// Dig the main cave and all walker tunnels. No-op when disabled.
    /// Dig strengths arrive pre-flipped when the density is inverted.
    pub fn carve(
        &self,
        dims: &FieldDims,
        compute: &mut dyn FieldCompute,
        dig_strength: f32,
        main_cave_dig_strength: f32,
    ) -> EngineResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let grid = dims.grid;
        let world_per_voxel = dims.bounds.y / grid.y as f32;

        if self.config.main_cave_enabled {
            let radius = (self.config.main_cave_radius / world_per_voxel).ceil() as i32;
            let brush = Brush {
                centre: Vector3::new(grid.x / 2, 0, grid.z / 2),
                radius,
                weight: main_cave_dig_strength,
            };
            compute.carve_sphere(&brush, 1.0)?;
        }

        let edit_radius = (self.config.tunnel_radius / world_per_voxel).ceil() as i32;
        let step_length = edit_radius as f32 / 2.0;
        let border = (edit_radius / 2) as f32;

        for _ in 0..self.config.num_walkers {
            let mut pos = Vector3::new(
                start_coordinate(&mut rng, grid.x),
                start_coordinate(&mut rng, grid.y),
                start_coordinate(&mut rng, grid.z),
            );
            let mut dir: Vector3<f32> = Vector3::zero();

            for _ in 0..self.config.walk_length {
                if rng.gen::<f32>() < DIRECTION_CHANGE_CHANCE || dir.is_zero() {
                    let random_dir = Vector3::new(
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    ) + dir * self.config.movement;
                    dir = if random_dir.magnitude2() > 1e-8 {
                        random_dir.normalize()
                    } else {
                        Vector3::unit_y()
                    };
                }

                pos += dir * step_length;

                let mut weight = dig_strength;
                for axis in 0..3 {
                    let high = (grid_axis(grid, axis) - 1) as f32 - border;
                    if pos[axis] < border {
                        pos[axis] = border;
                        dir[axis] = -dir[axis];
                    } else if pos[axis] > high {
                        pos[axis] = high;
                        dir[axis] = -dir[axis];
                        // A bounce off the top carves a wide opening so
                        // tunnels break out near the surface
                        if axis == 1 {
                            weight = dig_strength * SURFACE_BREAKOUT_MULTIPLIER;
                        }
                    }
                }

                let brush = Brush {
                    centre: Vector3::new(
                        pos.x.round() as i32,
                        pos.y.round() as i32,
                        pos.z.round() as i32,
                    ),
                    radius: edit_radius,
                    weight,
                };
                compute.carve_sphere(&brush, 1.0)?;
            }
        }
        Ok(())
    }
}

fn grid_axis(grid: crate::terrain::field::GridSize, axis: usize) -> i32 {
    match axis {
        0 => grid.x,
        1 => grid.y,
        _ => grid.z,
    }
}

/// Uniform start coordinate at least the boundary margin from each
/// face, shrinking the margin on grids too small to honour it.
fn start_coordinate(rng: &mut StdRng, size: i32) -> f32 {
    let margin = WALKER_BOUNDARY_MARGIN.min((size - 1) / 2);
    let low = margin as f32;
    let high = (size - margin) as f32;
    if high > low {
        rng.gen_range(low..high)
    } else {
        size as f32 / 2.0
    }
}

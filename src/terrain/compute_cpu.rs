/// CPU Field Compute Backend
///
/// Reference implementation of the four kernels. Pointwise passes run
/// in parallel over Z slabs; marching cubes walks cells sequentially
/// (one shared output buffer, same discipline as the GPU path).

use cgmath::{InnerSpace, Vector3};
use noise::{NoiseFn, Perlin};
use rayon::prelude::*;

use crate::error::EngineResult;
use crate::terrain::compute::{ChunkDispatch, FieldCompute, NoiseParams, VertexData};
use crate::terrain::field::{Brush, DensityField, FieldDims, GridRegion, GridSize};
use crate::terrain::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};

pub struct CpuFieldCompute {
    dims: FieldDims,
    field: DensityField,
    perlin: Perlin,
}

impl CpuFieldCompute {
    pub fn new(dims: FieldDims, blur_enabled: bool) -> Self {
        Self {
            dims,
            field: DensityField::new(dims.grid, blur_enabled),
            perlin: Perlin::new(0),
        }
    }

    /// Direct access for tests and diagnostics
    pub fn field(&self) -> &DensityField {
        &self.field
    }

    fn gradient(&self, x: i32, y: i32, z: i32) -> Vector3<f32> {
        let g = self.dims.grid;
        let d = self.field.processed();
        let s = |x: i32, y: i32, z: i32| -> f32 {
            d[g.index(
                x.clamp(0, g.x - 1),
                y.clamp(0, g.y - 1),
                z.clamp(0, g.z - 1),
            )]
        };
        Vector3::new(
            s(x + 1, y, z) - s(x - 1, y, z),
            s(x, y + 1, z) - s(x, y - 1, z),
            s(x, y, z + 1) - s(x, y, z - 1),
        )
    }
}

impl FieldCompute for CpuFieldCompute {
    fn label(&self) -> &'static str {
        "cpu"
    }

    fn is_gpu(&self) -> bool {
        false
    }

    fn sample_noise(&mut self, params: &NoiseParams) -> EngineResult<()> {
        let dims = self.dims;
        let grid = dims.grid;
        let perlin = self.perlin.clone();
        let slab = (grid.x as usize) * (grid.y as usize);
        let p = *params;

        self.field
            .raw_mut()
            .par_chunks_mut(slab)
            .enumerate()
            .for_each(|(z, plane)| {
                for y in 0..grid.y {
                    for x in 0..grid.x {
                        let world = dims.grid_to_world(x, y, z as i32);
                        let sample = perlin.get([
                            (world.x * p.noise_scale + p.seed_offset.x) as f64,
                            (world.y * p.noise_scale + p.seed_offset.y) as f64,
                            (world.z * p.noise_scale + p.seed_offset.z) as f64,
                        ]) as f32;
                        let mut density = sample * p.height_multiplier;
                        if p.invert {
                            density = -density;
                        }
                        plane[(x + y * grid.x) as usize] = density;
                    }
                }
            });
        Ok(())
    }

    fn carve_sphere(&mut self, brush: &Brush, delta_time: f32) -> EngineResult<()> {
        let grid = self.field.size();
        let region = GridRegion::around(brush.centre, brush.radius, 0, grid);
        let raw = self.field.raw_mut();
        let radius = brush.radius as f32;

        for z in region.min.z..=region.max.z {
            for y in region.min.y..=region.max.y {
                for x in region.min.x..=region.max.x {
                    let offset = Vector3::new(
                        (x - brush.centre.x) as f32,
                        (y - brush.centre.y) as f32,
                        (z - brush.centre.z) as f32,
                    );
                    let dist = offset.magnitude();
                    if dist <= radius {
                        let falloff = if radius > 0.0 { 1.0 - dist / radius } else { 1.0 };
                        raw[grid.index(x, y, z)] -= brush.weight * delta_time * falloff;
                    }
                }
            }
        }
        Ok(())
    }

    fn blur(&mut self, radius: i32, region: Option<GridRegion>) -> EngineResult<()> {
        let grid = self.field.size();
        let region = region.unwrap_or_else(|| GridRegion::full(grid));
        let Some((raw, processed)) = self.field.blur_pair_mut() else {
            return Ok(());
        };

        if radius == 0 {
            // Identity: propagate raw into processed over the region
            copy_region(grid, raw, processed, &region);
            return Ok(());
        }

        let slab = (grid.x as usize) * (grid.y as usize);
        processed
            .par_chunks_mut(slab)
            .enumerate()
            .for_each(|(z, plane)| {
                let z = z as i32;
                if z < region.min.z || z > region.max.z {
                    return;
                }
                for y in region.min.y..=region.max.y {
                    for x in region.min.x..=region.max.x {
                        plane[(x + y * grid.x) as usize] =
                            neighbourhood_mean(grid, raw, x, y, z, radius);
                    }
                }
            });
        Ok(())
    }

    fn march_chunk(
        &mut self,
        dispatch: &ChunkDispatch,
        out: &mut Vec<VertexData>,
    ) -> EngineResult<u32> {
        out.clear();
        let grid = self.dims.grid;
        let density = self.field.processed();
        let iso = dispatch.iso_level;

        for cz in 0..dispatch.voxels.z {
            for cy in 0..dispatch.voxels.y {
                for cx in 0..dispatch.voxels.x {
                    let cell = dispatch.grid_offset + Vector3::new(cx, cy, cz);

                    let mut corner_density = [0.0f32; 8];
                    for (i, offset) in CORNER_OFFSETS.iter().enumerate() {
                        corner_density[i] = density[grid.index(
                            cell.x + offset[0],
                            cell.y + offset[1],
                            cell.z + offset[2],
                        )];
                    }

                    let mut cube_index = 0usize;
                    for (i, &d) in corner_density.iter().enumerate() {
                        if d < iso {
                            cube_index |= 1 << i;
                        }
                    }
                    let edges = EDGE_TABLE[cube_index];
                    if edges == 0 {
                        continue;
                    }

                    let mut edge_vertex = [VertexData {
                        position: [0.0; 3],
                        normal: [0.0; 3],
                    }; 12];
                    for (i, corners) in EDGE_CORNERS.iter().enumerate() {
                        if edges & (1 << i) == 0 {
                            continue;
                        }
                        let [a, b] = *corners;
                        let pa = cell_corner(cell, a);
                        let pb = cell_corner(cell, b);
                        let da = corner_density[a];
                        let db = corner_density[b];
                        let mu = if (db - da).abs() < 1e-5 {
                            0.0
                        } else {
                            (iso - da) / (db - da)
                        };
                        let grid_pos = pa + (pb - pa) * mu;
                        let na = self.gradient(
                            cell.x + CORNER_OFFSETS[a][0],
                            cell.y + CORNER_OFFSETS[a][1],
                            cell.z + CORNER_OFFSETS[a][2],
                        );
                        let nb = self.gradient(
                            cell.x + CORNER_OFFSETS[b][0],
                            cell.y + CORNER_OFFSETS[b][1],
                            cell.z + CORNER_OFFSETS[b][2],
                        );
                        let gradient = na + (nb - na) * mu;
                        let normal = if gradient.magnitude2() > 1e-8 {
                            -gradient.normalize()
                        } else {
                            Vector3::new(0.0, 1.0, 0.0)
                        };
                        let world = grid_to_world_f(&self.dims, grid_pos);
                        edge_vertex[i] = VertexData {
                            position: [world.x, world.y, world.z],
                            normal: [normal.x, normal.y, normal.z],
                        };
                    }

                    let base = cube_index * 16;
                    let mut t = 0;
                    while t < 16 && TRI_TABLE[base + t] != -1 {
                        out.push(edge_vertex[TRI_TABLE[base + t] as usize]);
                        out.push(edge_vertex[TRI_TABLE[base + t + 1] as usize]);
                        out.push(edge_vertex[TRI_TABLE[base + t + 2] as usize]);
                        t += 3;
                    }
                }
            }
        }
        Ok((out.len() / 3) as u32)
    }

    fn read_raw(&mut self) -> EngineResult<Vec<f32>> {
        Ok(self.field.raw().to_vec())
    }

    fn read_processed(&mut self) -> EngineResult<Vec<f32>> {
        Ok(self.field.processed().to_vec())
    }
}

fn cell_corner(cell: Vector3<i32>, corner: usize) -> Vector3<f32> {
    Vector3::new(
        (cell.x + CORNER_OFFSETS[corner][0]) as f32,
        (cell.y + CORNER_OFFSETS[corner][1]) as f32,
        (cell.z + CORNER_OFFSETS[corner][2]) as f32,
    )
}

/// World position for fractional grid coordinates
fn grid_to_world_f(dims: &FieldDims, p: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(
        (p.x / (dims.grid.x - 1) as f32 - 0.5) * dims.bounds.x,
        (p.y / (dims.grid.y - 1) as f32 - 0.5) * dims.bounds.y,
        (p.z / (dims.grid.z - 1) as f32 - 0.5) * dims.bounds.z,
    )
}

fn neighbourhood_mean(grid: GridSize, raw: &[f32], x: i32, y: i32, z: i32, radius: i32) -> f32 {
    let mut sum = 0.0;
    let mut count = 0u32;
    for oz in (z - radius).max(0)..=(z + radius).min(grid.z - 1) {
        for oy in (y - radius).max(0)..=(y + radius).min(grid.y - 1) {
            for ox in (x - radius).max(0)..=(x + radius).min(grid.x - 1) {
                sum += raw[grid.index(ox, oy, oz)];
                count += 1;
            }
        }
    }
    sum / count as f32
}

fn copy_region(grid: GridSize, raw: &[f32], processed: &mut [f32], region: &GridRegion) {
    for z in region.min.z..=region.max.z {
        for y in region.min.y..=region.max.y {
            let start = grid.index(region.min.x, y, z);
            let end = grid.index(region.max.x, y, z) + 1;
            processed[start..end].copy_from_slice(&raw[start..end]);
        }
    }
}

/// GPU Field Compute Backend
///
/// wgpu implementation of the four kernels. The density grids live in
/// storage buffers on the device; the marching cubes tables are
/// uploaded once as storage buffers; every march appends into one
/// shared triangle buffer guarded by an atomic counter. Readback goes
/// through staging buffers and blocks the control thread until the
/// device catches up, so each dispatch-readback pair behaves as a
/// synchronous unit.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::error::{EngineError, EngineResult};
use crate::terrain::compute::{ChunkDispatch, FieldCompute, NoiseParams, VertexData};
use crate::terrain::error::TerrainErrorContext;
use crate::terrain::field::{Brush, FieldDims, GridRegion};
use crate::terrain::tables::{EDGE_TABLE, TRI_TABLE};

const WORKGROUP_SIZE: u32 = 4;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct NoiseUniforms {
    grid_size: [u32; 4],
    bounds: [f32; 4],
    seed_offset: [f32; 4],
    noise_scale: f32,
    height_multiplier: f32,
    invert: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct EditUniforms {
    grid_size: [u32; 4],
    brush_centre: [i32; 4],
    brush_radius: i32,
    weight: f32,
    delta_time: f32,
    _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct BlurUniforms {
    grid_size: [u32; 4],
    region_min: [i32; 4],
    region_extent: [i32; 4],
    blur_radius: i32,
    _pad: [i32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct MarchUniforms {
    grid_size: [u32; 4],
    chunk_offset: [i32; 4],
    num_voxels: [u32; 4],
    bounds: [f32; 4],
    iso_level: f32,
    max_triangles: u32,
    _pad0: u32,
    _pad1: u32,
}

pub struct GpuFieldCompute {
    dims: FieldDims,
    device: Arc<wgpu::Device>,
    queue: wgpu::Queue,

    noise_pipeline: wgpu::ComputePipeline,
    edit_pipeline: wgpu::ComputePipeline,
    blur_pipeline: wgpu::ComputePipeline,
    march_pipeline: wgpu::ComputePipeline,

    noise_bind_group: wgpu::BindGroup,
    edit_bind_group: wgpu::BindGroup,
    blur_bind_group: Option<wgpu::BindGroup>,
    march_bind_group: wgpu::BindGroup,

    noise_params: wgpu::Buffer,
    edit_params: wgpu::Buffer,
    blur_params: wgpu::Buffer,
    march_params: wgpu::Buffer,

    raw_buffer: wgpu::Buffer,
    processed_buffer: Option<wgpu::Buffer>,
    triangle_buffer: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,

    counter_staging: wgpu::Buffer,
    vertex_staging: wgpu::Buffer,
    field_staging: wgpu::Buffer,

    max_triangles: u32,
}

impl GpuFieldCompute {
    pub fn new(dims: FieldDims, blur_enabled: bool, max_triangles: u32) -> EngineResult<Self> {
        let (device, queue) = request_device()?;
        let device = Arc::new(device);

        let field_bytes = (dims.grid.len() * std::mem::size_of::<f32>()) as u64;
        let vertex_bytes =
            max_triangles as u64 * 3 * std::mem::size_of::<VertexData>() as u64;

        let raw_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Raw Density Buffer"),
            size: field_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        // With blurring disabled the processed grid aliases raw: the
        // march kernel binds the raw buffer directly.
        let processed_buffer = blur_enabled.then(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Processed Density Buffer"),
                size: field_bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        });

        let triangle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Triangle Buffer"),
            size: vertex_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let counter_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Triangle Counter"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let counter_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Counter Staging"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let vertex_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Vertex Staging"),
            size: vertex_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let field_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Field Staging"),
            size: field_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let edge_table = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marching Cubes Edge Table"),
            contents: bytemuck::cast_slice(&EDGE_TABLE),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let tri_table = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marching Cubes Triangle Table"),
            contents: bytemuck::cast_slice(&TRI_TABLE),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let noise_params = uniform_buffer::<NoiseUniforms>(&device, "Noise Params");
        let edit_params = uniform_buffer::<EditUniforms>(&device, "Edit Params");
        let blur_params = uniform_buffer::<BlurUniforms>(&device, "Blur Params");
        let march_params = uniform_buffer::<MarchUniforms>(&device, "March Params");

        // Field + uniform layout shared by the noise and edit kernels
        let field_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Field Kernel Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                uniform_entry(1),
            ],
        });
        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blur Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                uniform_entry(2),
            ],
        });
        let march_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("March Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, false),
                storage_entry(3, true),
                storage_entry(4, true),
                uniform_entry(5),
            ],
        });

        let noise_pipeline = create_pipeline(
            &device,
            &field_layout,
            include_str!("shaders/density.wgsl"),
            "Density",
            "sample_noise",
        );
        let edit_pipeline = create_pipeline(
            &device,
            &field_layout,
            include_str!("shaders/edit.wgsl"),
            "Edit",
            "carve_sphere",
        );
        let blur_pipeline = create_pipeline(
            &device,
            &blur_layout,
            include_str!("shaders/blur.wgsl"),
            "Blur",
            "blur",
        );
        let march_pipeline = create_pipeline(
            &device,
            &march_layout,
            include_str!("shaders/march.wgsl"),
            "March",
            "march",
        );

        let noise_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Noise Bind Group"),
            layout: &field_layout,
            entries: &[
                bind(0, &raw_buffer),
                bind(1, &noise_params),
            ],
        });
        let edit_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Edit Bind Group"),
            layout: &field_layout,
            entries: &[
                bind(0, &raw_buffer),
                bind(1, &edit_params),
            ],
        });
        let blur_bind_group = processed_buffer.as_ref().map(|processed| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Blur Bind Group"),
                layout: &blur_layout,
                entries: &[
                    bind(0, &raw_buffer),
                    bind(1, processed),
                    bind(2, &blur_params),
                ],
            })
        });
        let march_density = processed_buffer.as_ref().unwrap_or(&raw_buffer);
        let march_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("March Bind Group"),
            layout: &march_layout,
            entries: &[
                bind(0, march_density),
                bind(1, &triangle_buffer),
                bind(2, &counter_buffer),
                bind(3, &edge_table),
                bind(4, &tri_table),
                bind(5, &march_params),
            ],
        });

        log::info!(
            "[GpuFieldCompute] Initialized: {}x{}x{} grid, {} max triangles per chunk",
            dims.grid.x,
            dims.grid.y,
            dims.grid.z,
            max_triangles
        );

        Ok(Self {
            dims,
            device,
            queue,
            noise_pipeline,
            edit_pipeline,
            blur_pipeline,
            march_pipeline,
            noise_bind_group,
            edit_bind_group,
            blur_bind_group,
            march_bind_group,
            noise_params,
            edit_params,
            blur_params,
            march_params,
            raw_buffer,
            processed_buffer,
            triangle_buffer,
            counter_buffer,
            counter_staging,
            vertex_staging,
            field_staging,
            max_triangles,
        })
    }

    fn grid_size_uniform(&self) -> [u32; 4] {
        [
            self.dims.grid.x as u32,
            self.dims.grid.y as u32,
            self.dims.grid.z as u32,
            0,
        ]
    }

    fn run_pass(
        &self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        extent: (u32, u32, u32),
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(
                workgroups(extent.0),
                workgroups(extent.1),
                workgroups(extent.2),
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        let _ = self.device.poll(wgpu::Maintain::Wait);
    }

    /// Copy `bytes` out of `source` through `staging`, blocking until
    /// the device has finished.
    fn read_buffer(
        &self,
        source: &wgpu::Buffer,
        staging: &wgpu::Buffer,
        bytes: u64,
    ) -> EngineResult<Vec<u8>> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, staging, 0, bytes);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(0..bytes);
        let (tx, rx) = flume::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .terrain_context("readback channel")?
            .terrain_context("buffer map")?;
        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }

    fn grid_extent(&self) -> (u32, u32, u32) {
        (
            self.dims.grid.x as u32,
            self.dims.grid.y as u32,
            self.dims.grid.z as u32,
        )
    }
}

impl FieldCompute for GpuFieldCompute {
    fn label(&self) -> &'static str {
        "gpu"
    }

    fn is_gpu(&self) -> bool {
        true
    }

    fn sample_noise(&mut self, params: &NoiseParams) -> EngineResult<()> {
        let uniforms = NoiseUniforms {
            grid_size: self.grid_size_uniform(),
            bounds: [self.dims.bounds.x, self.dims.bounds.y, self.dims.bounds.z, 0.0],
            seed_offset: [
                params.seed_offset.x,
                params.seed_offset.y,
                params.seed_offset.z,
                0.0,
            ],
            noise_scale: params.noise_scale,
            height_multiplier: params.height_multiplier,
            invert: params.invert as u32,
            _pad: 0,
        };
        self.queue
            .write_buffer(&self.noise_params, 0, bytemuck::cast_slice(&[uniforms]));
        self.run_pass(
            "Density Pass",
            &self.noise_pipeline,
            &self.noise_bind_group,
            self.grid_extent(),
        );
        Ok(())
    }

    fn carve_sphere(&mut self, brush: &Brush, delta_time: f32) -> EngineResult<()> {
        let uniforms = EditUniforms {
            grid_size: self.grid_size_uniform(),
            brush_centre: [brush.centre.x, brush.centre.y, brush.centre.z, 0],
            brush_radius: brush.radius,
            weight: brush.weight,
            delta_time,
            _pad: 0,
        };
        self.queue
            .write_buffer(&self.edit_params, 0, bytemuck::cast_slice(&[uniforms]));
        self.run_pass(
            "Edit Pass",
            &self.edit_pipeline,
            &self.edit_bind_group,
            self.grid_extent(),
        );
        Ok(())
    }

    fn blur(&mut self, radius: i32, region: Option<GridRegion>) -> EngineResult<()> {
        let Some(bind_group) = self.blur_bind_group.as_ref() else {
            return Ok(());
        };
        let region = region.unwrap_or_else(|| GridRegion::full(self.dims.grid));
        let extent = region.extent();
        let uniforms = BlurUniforms {
            grid_size: self.grid_size_uniform(),
            region_min: [region.min.x, region.min.y, region.min.z, 0],
            region_extent: [extent.x, extent.y, extent.z, 0],
            blur_radius: radius,
            _pad: [0; 3],
        };
        self.queue
            .write_buffer(&self.blur_params, 0, bytemuck::cast_slice(&[uniforms]));
        self.run_pass(
            "Blur Pass",
            &self.blur_pipeline,
            bind_group,
            (extent.x as u32, extent.y as u32, extent.z as u32),
        );
        Ok(())
    }

    fn march_chunk(
        &mut self,
        dispatch: &ChunkDispatch,
        out: &mut Vec<VertexData>,
    ) -> EngineResult<u32> {
        let uniforms = MarchUniforms {
            grid_size: self.grid_size_uniform(),
            chunk_offset: [
                dispatch.grid_offset.x,
                dispatch.grid_offset.y,
                dispatch.grid_offset.z,
                0,
            ],
            num_voxels: [
                dispatch.voxels.x as u32,
                dispatch.voxels.y as u32,
                dispatch.voxels.z as u32,
                0,
            ],
            bounds: [self.dims.bounds.x, self.dims.bounds.y, self.dims.bounds.z, 0.0],
            iso_level: dispatch.iso_level,
            max_triangles: self.max_triangles,
            _pad0: 0,
            _pad1: 0,
        };
        self.queue
            .write_buffer(&self.march_params, 0, bytemuck::cast_slice(&[uniforms]));
        // Reset the shared append counter before the pass
        self.queue
            .write_buffer(&self.counter_buffer, 0, bytemuck::cast_slice(&[0u32]));
        self.run_pass(
            "March Pass",
            &self.march_pipeline,
            &self.march_bind_group,
            (
                dispatch.voxels.x as u32,
                dispatch.voxels.y as u32,
                dispatch.voxels.z as u32,
            ),
        );

        let count_bytes = self.read_buffer(
            &self.counter_buffer,
            &self.counter_staging,
            std::mem::size_of::<u32>() as u64,
        )?;
        let triangle_count: u32 = bytemuck::pod_read_unaligned(&count_bytes);

        if triangle_count > self.max_triangles {
            // The kernel dropped the excess writes; the count proves
            // the configured bound was violated, which is fatal.
            return Err(EngineError::CapacityExceeded {
                resource: "triangle buffer".to_string(),
                needed: triangle_count as u64,
                capacity: self.max_triangles as u64,
            });
        }

        out.clear();
        if triangle_count > 0 {
            let vertex_bytes =
                triangle_count as u64 * 3 * std::mem::size_of::<VertexData>() as u64;
            let data = self.read_buffer(&self.triangle_buffer, &self.vertex_staging, vertex_bytes)?;
            let vertices: Vec<VertexData> = bytemuck::pod_collect_to_vec(&data);
            out.extend_from_slice(&vertices);
        }
        Ok(triangle_count)
    }

    fn read_raw(&mut self) -> EngineResult<Vec<f32>> {
        let bytes = (self.dims.grid.len() * std::mem::size_of::<f32>()) as u64;
        let data = self.read_buffer(&self.raw_buffer, &self.field_staging, bytes)?;
        Ok(bytemuck::pod_collect_to_vec(&data))
    }

    fn read_processed(&mut self) -> EngineResult<Vec<f32>> {
        let bytes = (self.dims.grid.len() * std::mem::size_of::<f32>()) as u64;
        let source = self.processed_buffer.as_ref().unwrap_or(&self.raw_buffer);
        let data = self.read_buffer(source, &self.field_staging, bytes)?;
        Ok(bytemuck::pod_collect_to_vec(&data))
    }
}

/// Acquire a compute-capable device, or report why none exists
fn request_device() -> EngineResult<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok_or_else(|| EngineError::GpuUnavailable("no compute adapter".to_string()))?;

    pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("Terrain Compute Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        },
        None,
    ))
    .map_err(|e| EngineError::GpuUnavailable(e.to_string()))
}

fn workgroups(n: u32) -> u32 {
    (n + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE
}

fn uniform_buffer<T: Pod>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<T>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bind<'a>(binding: u32, buffer: &'a wgpu::Buffer) -> wgpu::BindGroupEntry<'a> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    source: &str,
    name: &str,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{} Shader", name)),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{} Pipeline Layout", name)),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{} Pipeline", name)),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point,
    })
}

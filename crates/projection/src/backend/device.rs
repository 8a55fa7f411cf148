//! wgpu executor for the two projection kernels.
//!
//! Source and destination arrays are uploaded as `vec4` storage buffers, the
//! `flatten` and `project` entry points run as two compute passes in one
//! submission, and the ray buffer is read back once at the end. Nothing is
//! written to the caller's slots until the readback has completed.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use tracing::debug;
use wgpu::util::DeviceExt;

use super::data_parallel::KernelExecutor;
use super::{ProjectionJob, RaySlots};
use crate::error::{ProjectionError, Result};
use crate::types::BackendKind;
use geometry::NormalIndexing;

const SHADER: &str = include_str!("../../shaders/project_normals.wgsl");
const WORKGROUP_SIZE: u32 = 64;
const MAX_GROUPS_PER_DIMENSION: u32 = 65535;
const STORAGE_BUFFERS: u32 = 7;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Params {
    num_triangles: u32,
    num_rays: u32,
    vertex_indexed: u32,
    _pad: u32,
}

/// wgpu device and queue used by the projection kernels.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Request a compute-capable device, blocking on the async wgpu calls.
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| ProjectionError::NoAdapter(e.to_string()))?;

        let limits = adapter.limits();
        if limits.max_storage_buffers_per_shader_stage < STORAGE_BUFFERS {
            return Err(ProjectionError::Unsupported(format!(
                "{} storage buffers per stage, {} needed",
                limits.max_storage_buffers_per_shader_stage, STORAGE_BUFFERS
            )));
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("MeshSync Projection Device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: Default::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| ProjectionError::DeviceRequest(e.to_string()))?;

        debug!("Projection device: {}", adapter.get_info().name);

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("device", &"<wgpu::Device>")
            .field("queue", &"<wgpu::Queue>")
            .finish()
    }
}

/// Runs `flatten` then `project` on a wgpu device.
pub struct WgpuExecutor {
    context: GpuContext,
    bind_group_layout: wgpu::BindGroupLayout,
    flatten_pipeline: wgpu::ComputePipeline,
    project_pipeline: wgpu::ComputePipeline,
}

impl WgpuExecutor {
    pub fn new() -> Result<Self> {
        Ok(Self::with_context(GpuContext::new()?))
    }

    /// Build the pipelines on an existing device.
    pub fn with_context(context: GpuContext) -> Self {
        let device = &context.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Project Normals Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        // Bindings 4 (corners) and 7 (rays) are written by the kernels
        for binding in 1..=STORAGE_BUFFERS {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage {
                        read_only: !matches!(binding, 4 | 7),
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Project Normals Layout"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Project Normals Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |label: &str, entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let flatten_pipeline = pipeline("Flatten Triangles Pipeline", "flatten");
        let project_pipeline = pipeline("Project Rays Pipeline", "project");

        Self {
            context,
            bind_group_layout,
            flatten_pipeline,
            project_pipeline,
        }
    }

    fn storage_buffer<T: Pod>(
        &self,
        label: &str,
        data: &[T],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        // Zero-sized bindings are invalid
        let padding = [T::zeroed()];
        let contents = if data.is_empty() { &padding[..] } else { data };
        self.context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(contents),
            usage: wgpu::BufferUsages::STORAGE | usage,
        })
    }

    /// Run both kernels and return one `vec4` per ray (`w == 1` on hit).
    fn dispatch(&self, job: &ProjectionJob<'_>, directions: &[Vec3]) -> Result<Vec<Vec4>> {
        let device = &self.context.device;
        let num_rays = directions.len();
        let num_triangles = job.num_triangles();

        let params = Params {
            num_triangles: num_triangles as u32,
            num_rays: num_rays as u32,
            vertex_indexed: (job.ray_indexing == NormalIndexing::Vertex) as u32,
            _pad: 0,
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Projection Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let input = wgpu::BufferUsages::empty();
        let src_points = self.storage_buffer("Source Points", &to_vec4(job.src_points), input);
        let src_indices = self.storage_buffer("Source Indices", job.src_indices, input);
        let src_normals = self.storage_buffer("Source Normals", &to_vec4(job.src_normals), input);
        let corners = self.storage_buffer(
            "Flattened Corners",
            &vec![Vec4::ZERO; num_triangles * 3],
            input,
        );
        let ray_points = self.storage_buffer("Ray Points", &to_vec4(job.dst_points), input);
        let ray_indices = self.storage_buffer("Ray Indices", job.dst_indices, input);
        let rays = self.storage_buffer("Rays", &to_vec4(directions), wgpu::BufferUsages::COPY_SRC);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Project Normals Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: src_points.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: src_indices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: src_normals.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: corners.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: ray_points.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: ray_indices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: rays.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Project Normals Encoder"),
        });

        for (label, pipeline, items) in [
            ("Flatten Triangles Pass", &self.flatten_pipeline, num_triangles),
            ("Project Rays Pass", &self.project_pipeline, num_rays),
        ] {
            if items == 0 {
                continue;
            }
            let (x, y) = workgroups(items);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(x, y, 1);
        }

        let size = rays.size();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Rays Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        encoder.copy_buffer_to_buffer(&rays, 0, &staging, 0, size);
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| ProjectionError::Readback(e.to_string()))?;
        rx.recv()
            .map_err(|e| ProjectionError::Readback(e.to_string()))?
            .map_err(|e| ProjectionError::Readback(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut results: Vec<Vec4> = bytemuck::cast_slice(&mapped).to_vec();
        drop(mapped);
        staging.unmap();

        results.truncate(num_rays);
        Ok(results)
    }
}

impl KernelExecutor for WgpuExecutor {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn execute(&self, job: &ProjectionJob<'_>, mut rays: RaySlots<'_>) -> Result<usize> {
        let results = self.dispatch(job, rays.directions())?;
        if results.len() != rays.len() {
            return Err(ProjectionError::Readback(format!(
                "{} results for {} rays",
                results.len(),
                rays.len()
            )));
        }
        Ok(rays.write_back(&results))
    }
}

impl std::fmt::Debug for WgpuExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuExecutor")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

fn to_vec4(values: &[Vec3]) -> Vec<Vec4> {
    values.iter().map(|v| v.extend(0.0)).collect()
}

/// Split `items` invocations into a 2D grid of workgroups.
fn workgroups(items: usize) -> (u32, u32) {
    let groups = (items as u32).div_ceil(WORKGROUP_SIZE);
    let x = groups.clamp(1, MAX_GROUPS_PER_DIMENSION);
    (x, groups.div_ceil(x))
}

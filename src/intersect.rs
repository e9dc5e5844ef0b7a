//! Ray-intersection service boundary. The frame pipeline only ever talks to
//! the [`RayIntersector`] trait; [`GpuIntersector`] is the built-in
//! implementation, a brute-force triangle-list compute kernel with one entry
//! point per intersection mode.

use anyhow::{bail, Result};
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectionMode {
    /// Closest hit along the ray; fills distance, primitive index and
    /// barycentric coordinates.
    Nearest,
    /// Occlusion query for shadow rays; only the sign of the distance is
    /// meaningful.
    Any,
}

/// Acceleration-structure service consumed by the frame pipeline.
///
/// `rebuild` re-indexes the triangle set after a geometry swap, `bind_rays`
/// re-attaches the viewport ray/intersection buffers after a resize, and
/// `encode` appends one intersection dispatch to the frame's command stream.
pub trait RayIntersector {
    fn rebuild(
        &mut self,
        device: &wgpu::Device,
        vertices: &wgpu::Buffer,
        triangle_count: u32,
    ) -> Result<()>;

    fn bind_rays(
        &mut self,
        device: &wgpu::Device,
        rays: &wgpu::Buffer,
        shadow_rays: &wgpu::Buffer,
        intersections: &wgpu::Buffer,
        ray_count: u32,
    );

    fn encode(&self, encoder: &mut wgpu::CommandEncoder, mode: IntersectionMode) -> Result<()>;
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct IntersectorConfig {
    triangle_count: u32,
    ray_count: u32,
    _pad: [u32; 2],
}

pub struct GpuIntersector {
    nearest_pipeline: wgpu::ComputePipeline,
    any_pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    vertices: Option<wgpu::Buffer>,
    triangle_count: u32,
    rays: Option<(wgpu::Buffer, wgpu::Buffer, wgpu::Buffer)>,
    ray_count: u32,
    nearest_bind: Option<wgpu::BindGroup>,
    any_bind: Option<wgpu::BindGroup>,
}

impl GpuIntersector {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Intersect Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("intersect.wgsl").into()),
        });

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),  // rays
                storage_entry(2, false), // intersections
                storage_entry(3, true),  // vertex positions
            ],
            label: Some("intersect_bind_group_layout"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Intersect Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = |entry_point: &str, label: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Self {
            nearest_pipeline: pipeline("nearest_main", "Nearest Intersect Pipeline"),
            any_pipeline: pipeline("any_main", "Any Intersect Pipeline"),
            layout,
            vertices: None,
            triangle_count: 0,
            rays: None,
            ray_count: 0,
            nearest_bind: None,
            any_bind: None,
        }
    }

    fn refresh_bind_groups(&mut self, device: &wgpu::Device) {
        let (Some(vertices), Some((rays, shadow_rays, intersections))) =
            (&self.vertices, &self.rays)
        else {
            return;
        };

        let config = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Intersector Config"),
            contents: bytemuck::bytes_of(&IntersectorConfig {
                triangle_count: self.triangle_count,
                ray_count: self.ray_count,
                _pad: [0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind = |ray_buffer: &wgpu::Buffer, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: config.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: ray_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: intersections.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: vertices.as_entire_binding(),
                    },
                ],
                label: Some(label),
            })
        };

        self.nearest_bind = Some(bind(rays, "intersect_nearest_bind_group"));
        self.any_bind = Some(bind(shadow_rays, "intersect_any_bind_group"));
    }
}

impl RayIntersector for GpuIntersector {
    fn rebuild(
        &mut self,
        device: &wgpu::Device,
        vertices: &wgpu::Buffer,
        triangle_count: u32,
    ) -> Result<()> {
        self.vertices = Some(vertices.clone());
        self.triangle_count = triangle_count;
        self.refresh_bind_groups(device);
        Ok(())
    }

    fn bind_rays(
        &mut self,
        device: &wgpu::Device,
        rays: &wgpu::Buffer,
        shadow_rays: &wgpu::Buffer,
        intersections: &wgpu::Buffer,
        ray_count: u32,
    ) {
        self.rays = Some((rays.clone(), shadow_rays.clone(), intersections.clone()));
        self.ray_count = ray_count;
        self.refresh_bind_groups(device);
    }

    fn encode(&self, encoder: &mut wgpu::CommandEncoder, mode: IntersectionMode) -> Result<()> {
        let (pipeline, bind_group, label) = match mode {
            IntersectionMode::Nearest => {
                (&self.nearest_pipeline, &self.nearest_bind, "Nearest Intersect")
            }
            IntersectionMode::Any => (&self.any_pipeline, &self.any_bind, "Any Intersect"),
        };
        let Some(bind_group) = bind_group else {
            bail!("intersector encode before rebuild/bind_rays");
        };

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(self.ray_count.div_ceil(WORKGROUP_SIZE), 1, 1);
        Ok(())
    }
}

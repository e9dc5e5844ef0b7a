//! GPU resource ownership: geometry buffers rebuilt wholesale on restart,
//! per-frame uniform/RNG ring buffers, and viewport-sized ray buffers and
//! accumulation targets reallocated on resize.

use crate::builder::RenderData;
use crate::context::GpuContext;
use crate::types::{Intersection, Ray, Uniforms};
use wgpu::util::DeviceExt;

/// Frames the CPU may admit before waiting for the oldest to complete.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Uniform/storage ring slots are offset-bound, so each slot is padded to
/// the WebGPU offset alignment.
pub const RING_ALIGNMENT: usize = 256;

/// Random pairs refilled per admitted frame.
pub const RNG_SAMPLES_PER_FRAME: usize = 256;

pub const fn aligned_uniform_size() -> usize {
    (std::mem::size_of::<Uniforms>() + RING_ALIGNMENT - 1) & !(RING_ALIGNMENT - 1)
}

pub const fn rng_slot_size() -> usize {
    RNG_SAMPLES_PER_FRAME * std::mem::size_of::<[f32; 2]>()
}

/// Collapsing views report zero dimensions; allocations clamp to 1x1 so no
/// zero-sized buffer or texture is ever requested.
pub const fn clamp_extent(width: u32, height: u32) -> (u32, u32) {
    (
        if width == 0 { 1 } else { width },
        if height == 0 { 1 } else { height },
    )
}

pub const fn ray_count(width: u32, height: u32) -> u64 {
    let (w, h) = clamp_extent(width, height);
    w as u64 * h as u64
}

/// Geometry buffers, sized exactly to builder output.
pub struct GeometryBuffers {
    pub vertices: wgpu::Buffer,
    pub normals: wgpu::Buffer,
    pub material_indices: wgpu::Buffer,
    pub materials: wgpu::Buffer,
    pub lights: wgpu::Buffer,
    pub triangle_count: u32,
    pub light_count: u32,
}

/// Viewport-sized buffers: one ray, shadow ray and intersection record per
/// pixel, plus the two float accumulation targets.
pub struct ViewportBuffers {
    pub rays: wgpu::Buffer,
    pub shadow_rays: wgpu::Buffer,
    pub intersections: wgpu::Buffer,
    pub render_target: wgpu::Buffer,
    pub accumulation_target: wgpu::Buffer,
    pub width: u32,
    pub height: u32,
}

pub struct ResourceManager {
    ctx: GpuContext,
    pub uniform_ring: wgpu::Buffer,
    pub rng_ring: wgpu::Buffer,
    pub geometry: GeometryBuffers,
    pub viewport: ViewportBuffers,
}

impl ResourceManager {
    pub fn new(ctx: GpuContext, width: u32, height: u32) -> Self {
        let device = ctx.device();

        let uniform_ring = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Uniform Ring"),
            size: (aligned_uniform_size() * MAX_FRAMES_IN_FLIGHT) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let rng_ring = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("RNG Ring"),
            size: (rng_slot_size() * MAX_FRAMES_IN_FLIGHT) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let geometry = Self::create_geometry(&ctx, &RenderData::default());
        let viewport = Self::create_viewport(&ctx, width, height);

        Self {
            ctx,
            uniform_ring,
            rng_ring,
            geometry,
            viewport,
        }
    }

    /// Replaces the geometry buffers with freshly built data. The previous
    /// buffers are dropped only after the new set exists, so a failure
    /// cannot leave the manager half-updated.
    pub fn upload_geometry(&mut self, data: &RenderData) {
        self.geometry = Self::create_geometry(&self.ctx, data);
    }

    /// Reallocates every viewport-sized resource for the new dimensions.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Self::create_viewport(&self.ctx, width, height);
    }

    pub fn write_uniforms(&self, slot: usize, uniforms: &Uniforms) {
        debug_assert!(slot < MAX_FRAMES_IN_FLIGHT);
        self.ctx.queue().write_buffer(
            &self.uniform_ring,
            (slot * aligned_uniform_size()) as u64,
            bytemuck::bytes_of(uniforms),
        );
    }

    pub fn write_rng(&self, slot: usize, samples: &[[f32; 2]]) {
        debug_assert!(slot < MAX_FRAMES_IN_FLIGHT);
        debug_assert_eq!(samples.len(), RNG_SAMPLES_PER_FRAME);
        self.ctx.queue().write_buffer(
            &self.rng_ring,
            (slot * rng_slot_size()) as u64,
            bytemuck::cast_slice(samples),
        );
    }

    pub fn uniform_slot_binding(&self, slot: usize) -> wgpu::BufferBinding<'_> {
        wgpu::BufferBinding {
            buffer: &self.uniform_ring,
            offset: (slot * aligned_uniform_size()) as u64,
            size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
        }
    }

    pub fn rng_slot_binding(&self, slot: usize) -> wgpu::BufferBinding<'_> {
        wgpu::BufferBinding {
            buffer: &self.rng_ring,
            offset: (slot * rng_slot_size()) as u64,
            size: wgpu::BufferSize::new(rng_slot_size() as u64),
        }
    }

    fn create_geometry(ctx: &GpuContext, data: &RenderData) -> GeometryBuffers {
        let device = ctx.device();

        // Empty scenes still need valid bindings; bind a single zeroed
        // element in place of an empty array.
        fn storage_init<T: bytemuck::Pod>(
            device: &wgpu::Device,
            label: &str,
            contents: &[T],
        ) -> wgpu::Buffer {
            let fallback = [T::zeroed()];
            let contents: &[T] = if contents.is_empty() { &fallback } else { contents };
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(contents),
                usage: wgpu::BufferUsages::STORAGE,
            })
        }

        GeometryBuffers {
            vertices: storage_init(device, "Vertex Positions", &data.vertices),
            normals: storage_init(device, "Vertex Normals", &data.normals),
            material_indices: storage_init(device, "Material Indices", &data.material_indices),
            materials: storage_init(device, "Materials", &data.materials),
            lights: storage_init(device, "Lights", &data.lights),
            triangle_count: data.triangle_count(),
            light_count: data.light_count(),
        }
    }

    fn create_viewport(ctx: &GpuContext, width: u32, height: u32) -> ViewportBuffers {
        let device = ctx.device();
        let (width, height) = clamp_extent(width, height);
        let rays = ray_count(width, height);

        let storage = |label: &str, size: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        };

        ViewportBuffers {
            rays: storage("Ray Buffer", rays * std::mem::size_of::<Ray>() as u64),
            shadow_rays: storage(
                "Shadow Ray Buffer",
                rays * std::mem::size_of::<Ray>() as u64,
            ),
            intersections: storage(
                "Intersection Buffer",
                rays * std::mem::size_of::<Intersection>() as u64,
            ),
            render_target: storage("Render Target", rays * 16),
            accumulation_target: storage("Accumulation Target", rays * 16),
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_uniform_size_is_256_multiple() {
        assert_eq!(aligned_uniform_size() % RING_ALIGNMENT, 0);
        assert!(aligned_uniform_size() >= std::mem::size_of::<Uniforms>());
    }

    #[test]
    fn test_rng_slot_offsets_are_storage_aligned() {
        assert_eq!(rng_slot_size() % RING_ALIGNMENT, 0);
    }

    #[test]
    fn test_zero_extent_clamps_to_one() {
        assert_eq!(clamp_extent(0, 0), (1, 1));
        assert_eq!(clamp_extent(0, 600), (1, 600));
        assert_eq!(clamp_extent(800, 0), (800, 1));
        assert_eq!(clamp_extent(800, 600), (800, 600));
    }

    #[test]
    fn test_ray_count_never_zero() {
        assert_eq!(ray_count(0, 0), 1);
        assert_eq!(ray_count(0, 5), 5);
        assert_eq!(ray_count(1920, 1080), 1920 * 1080);
    }
}

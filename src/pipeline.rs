//! Per-frame orchestration: ray generation, the fixed bounce loop through
//! the intersection service, progressive accumulation and present. Also the
//! owner of restart/resize, which drain in-flight frames before swapping
//! any buffer they might still reference.

use std::sync::Arc;

use anyhow::Result;
use rand::Rng;
use winit::window::Window;

use crate::builder;
use crate::camera::Camera;
use crate::context::GpuContext;
use crate::intersect::{GpuIntersector, IntersectionMode, RayIntersector};
use crate::mesh::ProceduralMesher;
use crate::resources::{ResourceManager, MAX_FRAMES_IN_FLIGHT, RNG_SAMPLES_PER_FRAME};
use crate::scene::Scene;
use crate::slots::FrameSlots;
use crate::types::Uniforms;

/// Bounces traced per displayed frame.
pub const BOUNCES_PER_FRAME: u32 = 3;

const WORKGROUP_SIZE: u32 = 8;

/// Running-average blend weight for accumulated frame `frame_index`.
/// Equivalent to the unweighted mean of all frames since the last reset.
pub fn accumulation_weight(frame_index: u32) -> f32 {
    1.0 / (frame_index as f32 + 1.0)
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct DisplayParams {
    width: u32,
    height: u32,
    _pad: [u32; 2],
}

/// Frame counter and ring cursor. `begin_frame` hands out the ring slot the
/// frame will encode into; `reset` is the restart/resize rule: accumulation
/// starts over at frame 0 while the ring cursor keeps cycling, since frames
/// already in flight still own their slots.
#[derive(Debug, Default, Clone, Copy)]
struct FrameState {
    frame_index: u32,
    ring_index: usize,
}

impl FrameState {
    fn begin_frame(&mut self) -> usize {
        let slot = self.ring_index;
        self.ring_index = (self.ring_index + 1) % MAX_FRAMES_IN_FLIGHT;
        slot
    }

    fn end_frame(&mut self) {
        self.frame_index += 1;
    }

    fn reset(&mut self) {
        self.frame_index = 0;
    }
}

/// Bind groups that depend on the uniform/RNG ring slot; one set per
/// in-flight frame slot.
struct FrameBindGroups {
    ray_gen: Vec<wgpu::BindGroup>,
    shade: Vec<wgpu::BindGroup>,
    shadow: Vec<wgpu::BindGroup>,
    accumulate: Vec<wgpu::BindGroup>,
}

pub struct Renderer {
    ctx: GpuContext,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    resources: ResourceManager,
    intersector: Box<dyn RayIntersector>,
    slots: Arc<FrameSlots>,
    mesher: ProceduralMesher,

    ray_gen_pipeline: wgpu::ComputePipeline,
    shade_pipeline: wgpu::ComputePipeline,
    shadow_pipeline: wgpu::ComputePipeline,
    accumulate_pipeline: wgpu::ComputePipeline,
    display_pipeline: wgpu::RenderPipeline,

    ray_gen_layout: wgpu::BindGroupLayout,
    shade_layout: wgpu::BindGroupLayout,
    shadow_layout: wgpu::BindGroupLayout,
    accumulate_layout: wgpu::BindGroupLayout,
    display_layout: wgpu::BindGroupLayout,

    frame_binds: FrameBindGroups,
    display_bind: wgpu::BindGroup,
    display_params: wgpu::Buffer,

    pub camera: Camera,
    frame: FrameState,

    egui_renderer: egui_wgpu::Renderer,
    egui_state: egui_winit::State,
    egui_ctx: egui::Context,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, scene: &Scene) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let ctx = GpuContext::new_with_surface(&instance, &surface).await?;
        let device = ctx.device();

        let surface_caps = surface.get_capabilities(ctx.adapter());
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(device, &surface_config);

        let (ray_gen_pipeline, ray_gen_layout) = Self::create_ray_gen_pipeline(device);
        let (shade_pipeline, shade_layout) = Self::create_shade_pipeline(device);
        let (shadow_pipeline, shadow_layout) = Self::create_shadow_pipeline(device);
        let (accumulate_pipeline, accumulate_layout) = Self::create_accumulate_pipeline(device);
        let (display_pipeline, display_layout) =
            Self::create_display_pipeline(device, surface_format);

        let mut resources = ResourceManager::new(ctx.clone(), size.width, size.height);

        let display_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Display Params"),
            size: std::mem::size_of::<DisplayParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut intersector: Box<dyn RayIntersector> = Box::new(GpuIntersector::new(device));
        let mesher = ProceduralMesher;

        let data = builder::build(scene, &mesher);
        resources.upload_geometry(&data);
        intersector.rebuild(
            device,
            &resources.geometry.vertices,
            resources.geometry.triangle_count,
        )?;
        intersector.bind_rays(
            device,
            &resources.viewport.rays,
            &resources.viewport.shadow_rays,
            &resources.viewport.intersections,
            (resources.viewport.width * resources.viewport.height) as u32,
        );

        let frame_binds = Self::create_frame_bind_groups(
            device,
            &resources,
            &ray_gen_layout,
            &shade_layout,
            &shadow_layout,
            &accumulate_layout,
        );
        let display_bind =
            Self::create_display_bind_group(device, &display_layout, &display_params, &resources);
        ctx.queue().write_buffer(
            &display_params,
            0,
            bytemuck::bytes_of(&DisplayParams {
                width: resources.viewport.width,
                height: resources.viewport.height,
                _pad: [0; 2],
            }),
        );

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer =
            egui_wgpu::Renderer::new(device, surface_format, egui_wgpu::RendererOptions::default());

        log::info!(
            "renderer initialized: {} triangles, {} lights, {}x{}",
            resources.geometry.triangle_count,
            resources.geometry.light_count,
            resources.viewport.width,
            resources.viewport.height
        );

        Ok(Self {
            ctx,
            surface,
            surface_config,
            resources,
            intersector,
            slots: Arc::new(FrameSlots::new(MAX_FRAMES_IN_FLIGHT)),
            mesher,
            ray_gen_pipeline,
            shade_pipeline,
            shadow_pipeline,
            accumulate_pipeline,
            display_pipeline,
            ray_gen_layout,
            shade_layout,
            shadow_layout,
            accumulate_layout,
            display_layout,
            frame_binds,
            display_bind,
            display_params,
            camera: Camera::new(),
            frame: FrameState::default(),
            egui_renderer,
            egui_state,
            egui_ctx,
        })
    }

    pub fn frame_index(&self) -> u32 {
        self.frame.frame_index
    }

    /// Full geometry rebuild after any scene edit. Drains in-flight frames
    /// before the old buffers are dropped and resets accumulation.
    pub fn restart(&mut self, scene: &Scene) -> Result<()> {
        self.wait_for_idle();

        let data = builder::build(scene, &self.mesher);
        self.resources.upload_geometry(&data);
        self.intersector.rebuild(
            self.ctx.device(),
            &self.resources.geometry.vertices,
            self.resources.geometry.triangle_count,
        )?;
        self.refresh_frame_bind_groups();

        self.frame.reset();
        log::debug!(
            "restart: {} triangles, {} lights",
            self.resources.geometry.triangle_count,
            self.resources.geometry.light_count
        );
        Ok(())
    }

    /// Reallocates every viewport-sized resource. Zero dimensions are
    /// clamped to one; accumulation restarts from frame 0.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.wait_for_idle();

        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.surface.configure(self.ctx.device(), &self.surface_config);

        self.resources.resize(width, height);
        self.intersector.bind_rays(
            self.ctx.device(),
            &self.resources.viewport.rays,
            &self.resources.viewport.shadow_rays,
            &self.resources.viewport.intersections,
            (self.resources.viewport.width * self.resources.viewport.height) as u32,
        );
        self.refresh_frame_bind_groups();
        self.display_bind = Self::create_display_bind_group(
            self.ctx.device(),
            &self.display_layout,
            &self.display_params,
            &self.resources,
        );
        self.ctx.queue().write_buffer(
            &self.display_params,
            0,
            bytemuck::bytes_of(&DisplayParams {
                width: self.resources.viewport.width,
                height: self.resources.viewport.height,
                _pad: [0; 2],
            }),
        );

        self.frame.reset();
    }

    /// One display tick: admit a frame slot, run the full bounce sequence
    /// and present. A missing drawable drops the frame silently.
    pub fn render(
        &mut self,
        window: &Window,
        ui: impl FnMut(&egui::Context),
    ) -> Result<()> {
        // Completion callbacks only fire while the device is polled, so pump
        // the device rather than parking in a bare acquire.
        while !self.slots.try_acquire() {
            self.ctx.device().poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })?;
        }

        let slot = self.frame.begin_frame();

        let mut rng = rand::thread_rng();
        let uniforms = Uniforms {
            camera_position: self.camera.position.to_array(),
            fov: self.camera.fov,
            camera_look_at: self.camera.look_at.to_array(),
            focal_dist: self.camera.focal_dist,
            random_seed: [rng.gen(), rng.gen(), rng.gen()],
            aperture: self.camera.aperture,
            width: self.resources.viewport.width,
            height: self.resources.viewport.height,
            frame_index: self.frame.frame_index,
            light_count: self.resources.geometry.light_count,
        };
        self.resources.write_uniforms(slot, &uniforms);

        let samples: Vec<[f32; 2]> = (0..RNG_SAMPLES_PER_FRAME)
            .map(|_| [rng.gen(), rng.gen()])
            .collect();
        self.resources.write_rng(slot, &samples);

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                // Resize race: reconfigure and drop this frame.
                self.surface
                    .configure(self.ctx.device(), &self.surface_config);
                self.slots.release();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                self.slots.release();
                return Ok(());
            }
            Err(err) => {
                self.slots.release();
                return Err(err.into());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let groups_x = self.resources.viewport.width.div_ceil(WORKGROUP_SIZE);
        let groups_y = self.resources.viewport.height.div_ceil(WORKGROUP_SIZE);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Generate Rays"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.ray_gen_pipeline);
            pass.set_bind_group(0, &self.frame_binds.ray_gen[slot], &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        for _ in 0..BOUNCES_PER_FRAME {
            self.intersector
                .encode(&mut encoder, IntersectionMode::Nearest)?;

            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Shading"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.shade_pipeline);
                pass.set_bind_group(0, &self.frame_binds.shade[slot], &[]);
                pass.dispatch_workgroups(groups_x, groups_y, 1);
            }

            self.intersector
                .encode(&mut encoder, IntersectionMode::Any)?;

            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Shadows"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.shadow_pipeline);
                pass.set_bind_group(0, &self.frame_binds.shadow[slot], &[]);
                pass.dispatch_workgroups(groups_x, groups_y, 1);
            }
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Accumulation"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.accumulate_pipeline);
            pass.set_bind_group(0, &self.frame_binds.accumulate[slot], &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Display Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.display_pipeline);
            pass.set_bind_group(0, &self.display_bind, &[]);
            pass.draw(0..6, 0..1);
        }

        self.encode_egui(window, &view, &mut encoder, ui);

        self.ctx.queue().submit(std::iter::once(encoder.finish()));

        let slots = self.slots.clone();
        self.ctx
            .queue()
            .on_submitted_work_done(move || slots.release());

        output.present();
        self.frame.end_frame();
        Ok(())
    }

    /// Blocks until every admitted frame has completed, pumping the device
    /// so the release callbacks can fire.
    fn wait_for_idle(&self) {
        while !self.slots.all_free() {
            let status = self.ctx.device().poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            });
            if status.is_err() {
                break;
            }
        }
    }

    pub fn handle_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.egui_state.on_window_event(window, event).consumed
    }

    fn encode_egui(
        &mut self,
        window: &Window,
        view: &wgpu::TextureView,
        encoder: &mut wgpu::CommandEncoder,
        ui: impl FnMut(&egui::Context),
    ) {
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, ui);

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, self.egui_ctx.pixels_per_point());
        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(
                self.ctx.device(),
                self.ctx.queue(),
                *id,
                image_delta,
            );
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.surface_config.width, self.surface_config.height],
            pixels_per_point: window.scale_factor() as f32,
        };
        self.egui_renderer.update_buffers(
            self.ctx.device(),
            self.ctx.queue(),
            encoder,
            &tris,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            // SAFETY: the render pass borrows the encoder, but egui-wgpu
            // wants 'static. The pass is dropped before the encoder is
            // touched again.
            let render_pass_static = unsafe {
                std::mem::transmute::<&mut wgpu::RenderPass<'_>, &mut wgpu::RenderPass<'static>>(
                    &mut render_pass,
                )
            };
            self.egui_renderer
                .render(render_pass_static, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }

    fn refresh_frame_bind_groups(&mut self) {
        self.frame_binds = Self::create_frame_bind_groups(
            self.ctx.device(),
            &self.resources,
            &self.ray_gen_layout,
            &self.shade_layout,
            &self.shadow_layout,
            &self.accumulate_layout,
        );
    }

    fn compute_layout_entries(
        storage: &[(u32, bool)],
        uniform: u32,
    ) -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: uniform,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        entries.extend(storage.iter().map(|&(binding, read_only)| {
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
        }));
        entries
    }

    fn compute_pipeline(
        device: &wgpu::Device,
        label: &str,
        source: &str,
        layout: &wgpu::BindGroupLayout,
    ) -> wgpu::ComputePipeline {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        })
    }

    fn create_ray_gen_pipeline(
        device: &wgpu::Device,
    ) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &Self::compute_layout_entries(&[(1, false), (2, true), (3, false)], 0),
            label: Some("ray_gen_bind_group_layout"),
        });
        let pipeline = Self::compute_pipeline(
            device,
            "Ray Generation Pipeline",
            include_str!("primary_rays.wgsl"),
            &layout,
        );
        (pipeline, layout)
    }

    fn create_shade_pipeline(
        device: &wgpu::Device,
    ) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &Self::compute_layout_entries(
                &[
                    (1, false),
                    (2, false),
                    (3, true),
                    (4, true),
                    (5, true),
                    (6, true),
                    (7, true),
                    (8, true),
                    (9, false),
                ],
                0,
            ),
            label: Some("shade_bind_group_layout"),
        });
        let pipeline = Self::compute_pipeline(
            device,
            "Shade Pipeline",
            include_str!("shade.wgsl"),
            &layout,
        );
        (pipeline, layout)
    }

    fn create_shadow_pipeline(
        device: &wgpu::Device,
    ) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &Self::compute_layout_entries(&[(1, true), (2, true), (3, false)], 0),
            label: Some("shadow_bind_group_layout"),
        });
        let pipeline = Self::compute_pipeline(
            device,
            "Shadow Pipeline",
            include_str!("shadow.wgsl"),
            &layout,
        );
        (pipeline, layout)
    }

    fn create_accumulate_pipeline(
        device: &wgpu::Device,
    ) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &Self::compute_layout_entries(&[(1, true), (2, false)], 0),
            label: Some("accumulate_bind_group_layout"),
        });
        let pipeline = Self::compute_pipeline(
            device,
            "Accumulate Pipeline",
            include_str!("accumulate.wgsl"),
            &layout,
        );
        (pipeline, layout)
    }

    fn create_display_pipeline(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Display Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("display.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
            label: Some("display_bind_group_layout"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Display Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Display Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        (pipeline, layout)
    }

    fn create_frame_bind_groups(
        device: &wgpu::Device,
        resources: &ResourceManager,
        ray_gen_layout: &wgpu::BindGroupLayout,
        shade_layout: &wgpu::BindGroupLayout,
        shadow_layout: &wgpu::BindGroupLayout,
        accumulate_layout: &wgpu::BindGroupLayout,
    ) -> FrameBindGroups {
        let viewport = &resources.viewport;
        let geometry = &resources.geometry;

        let mut ray_gen = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut shade = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut shadow = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut accumulate = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);

        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            let uniforms = wgpu::BindingResource::Buffer(resources.uniform_slot_binding(slot));
            let rng = wgpu::BindingResource::Buffer(resources.rng_slot_binding(slot));

            ray_gen.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: ray_gen_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.clone(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: viewport.rays.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: rng.clone(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: viewport.render_target.as_entire_binding(),
                    },
                ],
                label: Some("ray_gen_bind_group"),
            }));

            shade.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: shade_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.clone(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: viewport.rays.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: viewport.shadow_rays.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: viewport.intersections.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: geometry.materials.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: geometry.normals.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: rng.clone(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: geometry.material_indices.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 8,
                        resource: geometry.lights.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 9,
                        resource: viewport.render_target.as_entire_binding(),
                    },
                ],
                label: Some("shade_bind_group"),
            }));

            shadow.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: shadow_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.clone(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: viewport.shadow_rays.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: viewport.intersections.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: viewport.render_target.as_entire_binding(),
                    },
                ],
                label: Some("shadow_bind_group"),
            }));

            accumulate.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: accumulate_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.clone(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: viewport.render_target.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: viewport.accumulation_target.as_entire_binding(),
                    },
                ],
                label: Some("accumulate_bind_group"),
            }));
        }

        FrameBindGroups {
            ray_gen,
            shade,
            shadow,
            accumulate,
        }
    }

    fn create_display_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        params: &wgpu::Buffer,
        resources: &ResourceManager,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: resources.viewport.accumulation_target.as_entire_binding(),
                },
            ],
            label: Some("display_bind_group"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_accumulation_weight_is_running_average() {
        assert_eq!(accumulation_weight(0), 1.0);
        assert_eq!(accumulation_weight(1), 0.5);
        assert_eq!(accumulation_weight(3), 0.25);
    }

    #[test]
    fn test_frame_zero_replaces_the_target() {
        // accum = mix(prev, cur, 1.0) must drop all stale history.
        let prev = 123.0_f32;
        let cur = 7.0_f32;
        let w = accumulation_weight(0);
        assert_eq!(prev + (cur - prev) * w, cur);
    }

    #[test]
    fn test_progressive_accumulation_converges() {
        // Blending noisy frames of a constant scene with weight 1/(k+1)
        // is the arithmetic mean; its deviation from the true value must
        // trend down as frames accumulate.
        let mut rng = StdRng::seed_from_u64(7);
        let true_value = 0.5_f32;

        let mut accum = 0.0_f32;
        let mut early_error = 0.0_f32;
        let mut late_error = 0.0_f32;
        for frame in 0u32..4096 {
            let sample: f32 = rng.gen();
            let w = accumulation_weight(frame);
            accum += (sample - accum) * w;
            if frame == 15 {
                early_error = (accum - true_value).abs();
            }
            if frame == 4095 {
                late_error = (accum - true_value).abs();
            }
        }
        assert!(
            late_error <= early_error + 1e-3,
            "error must not grow: early {early_error}, late {late_error}"
        );
        assert!(late_error < 0.05);
    }

    #[test]
    fn test_ring_slots_cycle_over_slot_count() {
        let mut frame = FrameState::default();
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(frame.begin_frame());
            frame.end_frame();
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(frame.frame_index, 7);
    }

    #[test]
    fn test_reset_zeroes_frame_counter_from_any_value() {
        for frames in [0u32, 1, 2, 17, 4096] {
            let mut frame = FrameState::default();
            for _ in 0..frames {
                frame.begin_frame();
                frame.end_frame();
            }
            frame.reset();
            assert_eq!(
                frame.frame_index, 0,
                "reset must zero the counter, was {frames}"
            );
        }
    }

    #[test]
    fn test_reset_leaves_ring_cursor_untouched() {
        // Frames already in flight keep their ring slots across a restart,
        // so the cursor must not rewind onto them.
        let mut frame = FrameState::default();
        frame.begin_frame();
        frame.end_frame();
        frame.begin_frame();
        frame.end_frame();
        frame.reset();
        assert_eq!(frame.begin_frame(), 2);
        assert_eq!(frame.frame_index, 0);
    }
}

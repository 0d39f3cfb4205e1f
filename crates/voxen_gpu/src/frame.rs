//! Per-frame pass orchestration.
//!
//! All passes for a frame are encoded into one command encoder, so
//! ordering comes from encoding order alone: worklist clears, sparse
//! raymarch, history copies, interpolation, dispatch sizing, indirect
//! buffer march, world-position reconstruction, then the presentation
//! blit. No host-side fences are involved.

use std::time::Instant;

use anyhow::Result;
use glam::Mat4;
use voxen_core::{RenderSettings, Scene};
use voxen_math::Camera;

use crate::passes::blit::BlitPass;
use crate::passes::buffer_march::BufferMarchPass;
use crate::passes::divide::DividePass;
use crate::passes::interpolate::InterpolatePass;
use crate::passes::sparse::SparsePass;
use crate::passes::world_pos::WorldPosPass;
use crate::passes::PassLayouts;
use crate::uniforms::{create_blue_noise_texture, FrameUniforms, SceneBuffers};
use crate::{FrameTimer, GBuffer, RenderContext, ScreenRayWorklist, VolumeAtlas};

pub struct FrameGraph {
    settings: RenderSettings,
    layouts: PassLayouts,
    sparse: SparsePass,
    interpolate: InterpolatePass,
    divide: DividePass,
    buffer_march: BufferMarchPass,
    world_pos: WorldPosPass,
    blit: BlitPass,

    pub atlas: VolumeAtlas,
    gbuffer: GBuffer,
    worklist: ScreenRayWorklist,
    scene_buffers: Option<SceneBuffers>,
    uniform_buffer: wgpu::Buffer,
    pub timer: FrameTimer,

    scene_bind_group: Option<wgpu::BindGroup>,
    gbuffer_write_bind_group: wgpu::BindGroup,
    worklist_bind_group: wgpu::BindGroup,
    interp_frame_bind_group: wgpu::BindGroup,
    interp_history_bind_group: wgpu::BindGroup,
    divide_bind_group: wgpu::BindGroup,
    world_pos_bind_group: wgpu::BindGroup,
    blit_bind_group: wgpu::BindGroup,

    render_size: (u32, u32),
    frame_index: u32,
    started: Instant,
    previous_view_projection: Mat4,
}

impl FrameGraph {
    pub fn new(context: &RenderContext, settings: RenderSettings) -> Result<Self> {
        settings.validate()?;
        let device = &context.device;
        let render_size = settings.render_resolution(context.size.0.max(1), context.size.1.max(1));

        let layouts = PassLayouts::new(device);
        let sparse = SparsePass::new(device, &layouts);
        let interpolate = InterpolatePass::new(device, &layouts);
        let divide = DividePass::new(device);
        let world_pos = WorldPosPass::new(device);
        let buffer_march = BufferMarchPass::new(device, &layouts);
        let blit = BlitPass::new(device, context.surface_format());

        let atlas = VolumeAtlas::new(device);
        let gbuffer = GBuffer::new(device, render_size);
        let worklist = ScreenRayWorklist::new(device, render_size.0, render_size.1);
        let timer = FrameTimer::new(device, &context.queue);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let blue_noise = create_blue_noise_texture(device, &context.queue);

        let gbuffer_write_bind_group = create_gbuffer_write_bind_group(device, &layouts, &gbuffer);
        let worklist_bind_group = create_worklist_bind_group(device, &layouts, &worklist);
        let interp_frame_bind_group =
            create_interp_frame_bind_group(device, &interpolate, &uniform_buffer, &blue_noise);
        let interp_history_bind_group =
            create_interp_history_bind_group(device, &interpolate, &gbuffer);
        let divide_bind_group = create_divide_bind_group(device, &divide, &worklist);
        let world_pos_bind_group =
            create_world_pos_bind_group(device, &world_pos, &uniform_buffer, &gbuffer);
        let blit_bind_group = create_blit_bind_group(device, &blit, &gbuffer);

        log::info!(
            "frame graph ready: render target {}x{} (downscale {})",
            render_size.0,
            render_size.1,
            settings.downscale
        );

        Ok(Self {
            settings,
            layouts,
            sparse,
            interpolate,
            divide,
            buffer_march,
            world_pos,
            blit,
            atlas,
            gbuffer,
            worklist,
            scene_buffers: None,
            uniform_buffer,
            timer,
            scene_bind_group: None,
            gbuffer_write_bind_group,
            worklist_bind_group,
            interp_frame_bind_group,
            interp_history_bind_group,
            divide_bind_group,
            world_pos_bind_group,
            blit_bind_group,
            render_size,
            frame_index: 0,
            started: Instant::now(),
            previous_view_projection: Mat4::IDENTITY,
        })
    }

    pub fn render_size(&self) -> (u32, u32) {
        self.render_size
    }

    /// Upload a scene: atlas volumes for every referenced grid, then
    /// the BVH and object record buffers.
    pub fn load_scene(&mut self, context: &RenderContext, scene: &Scene) -> Result<()> {
        let device = &context.device;
        for object in scene.objects() {
            if self.atlas.get_volume(&object.volume_label).is_ok() {
                continue;
            }
            let Some(grid) = scene.grid(object.grid_index) else {
                log::warn!(
                    "scene object '{}' has no grid at index {}, skipping upload",
                    object.volume_label,
                    object.grid_index
                );
                continue;
            };
            self.atlas
                .add_volume(device, &context.queue, grid, &object.volume_label)?;
        }

        let buffers = SceneBuffers::build(device, &scene.view(), &self.atlas);
        self.scene_bind_group = Some(create_scene_bind_group(
            device,
            &self.layouts,
            &self.uniform_buffer,
            &buffers,
            &self.atlas,
        ));
        log::info!(
            "scene '{}' loaded: {} objects on the GPU",
            scene.name,
            buffers.object_count
        );
        self.scene_buffers = Some(buffers);
        Ok(())
    }

    /// Recreate the render targets after a surface resize. The atlas
    /// and scene buffers carry over.
    pub fn resize(&mut self, context: &RenderContext) {
        let device = &context.device;
        self.render_size = self
            .settings
            .render_resolution(context.size.0.max(1), context.size.1.max(1));
        self.gbuffer = GBuffer::new(device, self.render_size);
        self.worklist = ScreenRayWorklist::new(device, self.render_size.0, self.render_size.1);

        self.gbuffer_write_bind_group =
            create_gbuffer_write_bind_group(device, &self.layouts, &self.gbuffer);
        self.worklist_bind_group = create_worklist_bind_group(device, &self.layouts, &self.worklist);
        self.interp_history_bind_group =
            create_interp_history_bind_group(device, &self.interpolate, &self.gbuffer);
        self.divide_bind_group = create_divide_bind_group(device, &self.divide, &self.worklist);
        self.world_pos_bind_group = create_world_pos_bind_group(
            device,
            &self.world_pos,
            &self.uniform_buffer,
            &self.gbuffer,
        );
        self.blit_bind_group = create_blit_bind_group(device, &self.blit, &self.gbuffer);
        log::debug!("render targets resized to {:?}", self.render_size);
    }

    /// Encode and submit one frame, presenting to the surface.
    pub fn render(&mut self, context: &RenderContext, camera: &Camera) -> Result<()> {
        let surface = context
            .surface
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("render() needs a windowed context"))?;
        let output = surface.get_current_texture()?;
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.encode_frame(context, camera);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.blit.record(&mut pass, &self.blit_bind_group);
        }

        context.queue.submit(std::iter::once(encoder.finish()));
        self.timer.start_readback();
        context.device.poll(wgpu::Maintain::Poll);
        output.present();

        self.previous_view_projection = camera.view_projection_matrix();
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(())
    }

    /// Encode and submit one frame without presenting; the G-buffer
    /// holds the result. For offscreen use.
    pub fn render_offscreen(&mut self, context: &RenderContext, camera: &Camera) {
        let encoder = self.encode_frame(context, camera);
        context.queue.submit(std::iter::once(encoder.finish()));
        self.timer.start_readback();
        context.device.poll(wgpu::Maintain::Poll);
        self.previous_view_projection = camera.view_projection_matrix();
        self.frame_index = self.frame_index.wrapping_add(1);
    }

    fn encode_frame(&self, context: &RenderContext, camera: &Camera) -> wgpu::CommandEncoder {
        let uniforms = FrameUniforms::new(
            camera,
            self.previous_view_projection,
            &self.settings,
            self.render_size,
            self.started.elapsed().as_secs_f32(),
            self.frame_index,
        );
        context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.worklist.clear(&mut encoder);

        // An empty tree has nothing to traverse; the dispatches are
        // guarded here rather than in the shaders.
        let populated = matches!(&self.scene_buffers, Some(b) if b.object_count > 0);
        if let (true, Some(scene_bind_group)) = (populated, &self.scene_bind_group) {
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Sparse Raymarch Pass"),
                    timestamp_writes: self.timer.begin_writes(),
                });
                self.sparse.record(
                    &mut pass,
                    scene_bind_group,
                    &self.gbuffer_write_bind_group,
                    &self.worklist_bind_group,
                    self.render_size,
                );
            }

            self.gbuffer.copy_to_history(&mut encoder);

            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Interpolation Pass"),
                    timestamp_writes: None,
                });
                self.interpolate.record(
                    &mut pass,
                    &self.interp_frame_bind_group,
                    &self.interp_history_bind_group,
                    &self.gbuffer_write_bind_group,
                    &self.worklist_bind_group,
                    self.render_size,
                );
            }

            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Divide Workgroups Pass"),
                    timestamp_writes: None,
                });
                self.divide.record(&mut pass, &self.divide_bind_group);
            }

            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Buffer Raymarch Pass"),
                    timestamp_writes: None,
                });
                self.buffer_march.record(
                    &mut pass,
                    scene_bind_group,
                    &self.gbuffer_write_bind_group,
                    &self.worklist_bind_group,
                    &self.worklist.indirect_buffer,
                );
            }

            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("World Position Pass"),
                    timestamp_writes: self.timer.end_writes(),
                });
                self.world_pos
                    .record(&mut pass, &self.world_pos_bind_group, self.render_size);
            }
        }

        self.timer.resolve(&mut encoder);
        encoder
    }
}

fn create_scene_bind_group(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    uniform_buffer: &wgpu::Buffer,
    buffers: &SceneBuffers,
    atlas: &VolumeAtlas,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Scene Bind Group"),
        layout: &layouts.scene,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: buffers.bvh_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: buffers.object_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(atlas.view()),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: atlas.brick_buffer().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::TextureView(atlas.palette_view()),
            },
        ],
    })
}

fn create_gbuffer_write_bind_group(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    gbuffer: &GBuffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("GBuffer Write Bind Group"),
        layout: &layouts.gbuffer_write,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&gbuffer.albedo.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&gbuffer.normal.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&gbuffer.depth.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&gbuffer.velocity.view),
            },
        ],
    })
}

fn create_worklist_bind_group(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    worklist: &ScreenRayWorklist,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Worklist Bind Group"),
        layout: &layouts.worklist,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: worklist.ray_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: worklist.counter_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: worklist.capacity_buffer.as_entire_binding(),
            },
        ],
    })
}

fn create_interp_frame_bind_group(
    device: &wgpu::Device,
    interpolate: &InterpolatePass,
    uniform_buffer: &wgpu::Buffer,
    blue_noise: &wgpu::TextureView,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Interpolation Frame Bind Group"),
        layout: &interpolate.frame_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(blue_noise),
            },
        ],
    })
}

fn create_interp_history_bind_group(
    device: &wgpu::Device,
    interpolate: &InterpolatePass,
    gbuffer: &GBuffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Interpolation History Bind Group"),
        layout: &interpolate.history_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&gbuffer.albedo.copy_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&gbuffer.normal.copy_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&gbuffer.depth.copy_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&gbuffer.velocity.copy_view),
            },
        ],
    })
}

fn create_divide_bind_group(
    device: &wgpu::Device,
    divide: &DividePass,
    worklist: &ScreenRayWorklist,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Divide Workgroups Bind Group"),
        layout: &divide.layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: worklist.counter_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: worklist.indirect_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: worklist.capacity_buffer.as_entire_binding(),
            },
        ],
    })
}

fn create_world_pos_bind_group(
    device: &wgpu::Device,
    world_pos: &WorldPosPass,
    uniform_buffer: &wgpu::Buffer,
    gbuffer: &GBuffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("World Position Bind Group"),
        layout: &world_pos.layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&gbuffer.depth.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&gbuffer.world_position.view),
            },
        ],
    })
}

fn create_blit_bind_group(
    device: &wgpu::Device,
    blit: &BlitPass,
    gbuffer: &GBuffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Blit Bind Group"),
        layout: &blit.layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&gbuffer.albedo.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&blit.sampler),
            },
        ],
    })
}

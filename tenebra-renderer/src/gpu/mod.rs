//! wgpu backend: executes command lists on the GPU and presents to a window surface.

mod pipelines;
mod renderer;

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::{
    ActivePass, AllocationError, Backend, BackendError, Clear, Command, CommandList, Draw,
    GBuffer, GBufferAttachment, IncompleteReason, MeshData, MeshHandle, PipelineState, Target,
    TextureData, TextureHandle, Viewport, MAX_UNIFORMS_SIZE,
};

pub use renderer::Renderer;

use self::pipelines::Pipelines;

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct GpuGBuffer {
    views: Vec<wgpu::TextureView>,
    depth_stencil: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

/// One [`MAX_UNIFORMS_SIZE`] slot per draw of the frame, bound with a dynamic offset.
struct UniformSlots {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: usize,
}

impl UniformSlots {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, capacity: usize) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw uniforms buffer"),
            size: (capacity * MAX_UNIFORMS_SIZE) as _,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw uniforms bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(MAX_UNIFORMS_SIZE as _),
                }),
            }],
        });

        Self {
            buffer,
            bind_group,
            capacity,
        }
    }

    fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        data: &[u8],
    ) {
        let slots = data.len() / MAX_UNIFORMS_SIZE;
        if slots > self.capacity {
            *self = Self::new(device, layout, slots.next_power_of_two());
        }
        if !data.is_empty() {
            queue.write_buffer(&self.buffer, 0, data);
        }
    }
}

pub struct WgpuBackend<'window> {
    renderer: Renderer<'window>,
    pipelines: Pipelines,
    sampler: wgpu::Sampler,
    uniforms: UniformSlots,

    gbuffer: Option<GpuGBuffer>,
    presentation_depth: wgpu::TextureView,

    meshes: Vec<GpuMesh>,
    textures: Vec<wgpu::TextureView>,
    materials: HashMap<(TextureHandle, TextureHandle), wgpu::BindGroup>,
}

impl<'window> WgpuBackend<'window> {
    pub fn new(renderer: Renderer<'window>) -> Result<Self, BackendError> {
        let device = &renderer.device;

        let pipelines = Pipelines::new(device, renderer.surface_config.format)?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniforms = UniformSlots::new(device, &pipelines.uniforms_layout, 64);
        let presentation_depth = Self::create_depth_stencil(device, renderer.size(), "Presentation");

        Ok(Self {
            pipelines,
            sampler,
            uniforms,

            gbuffer: None,
            presentation_depth,

            meshes: vec![],
            textures: vec![],
            materials: HashMap::new(),

            renderer,
        })
    }

    pub fn renderer(&self) -> &Renderer<'window> {
        &self.renderer
    }

    fn create_depth_stencil(
        device: &wgpu::Device,
        (width, height): (u32, u32),
        label: &str,
    ) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("{label} depth/stencil texture")),
                size: wgpu::Extent3d {
                    width: width.max(1),
                    height: height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: GBuffer::DEPTH_STENCIL_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&Default::default())
    }

    fn prepare_material(
        &mut self,
        diffuse: TextureHandle,
        bump: TextureHandle,
    ) -> Result<(), BackendError> {
        if self.materials.contains_key(&(diffuse, bump)) {
            return Ok(());
        }

        let view = |handle: TextureHandle| {
            self.textures
                .get(handle.0 as usize)
                .ok_or(BackendError::UnknownTexture(handle))
        };

        let bind_group = self
            .renderer
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Material bind group"),
                layout: &self.pipelines.material_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view(diffuse)?),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(view(bump)?),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

        self.materials.insert((diffuse, bump), bind_group);
        Ok(())
    }

    /// Pipelines, material bind groups and uniform slots for every draw of `commands`.
    fn prepare(&mut self, commands: &CommandList) -> Result<(), BackendError> {
        let mut data = Vec::with_capacity(commands.len() * MAX_UNIFORMS_SIZE);

        for (state, draw) in commands.draws() {
            self.pipelines
                .prepare(&self.renderer.device, draw.technique(), state)?;

            if let Draw::GBufferFill { diffuse, bump, .. } = draw {
                self.prepare_material(*diffuse, *bump)?;
            }

            let bytes = draw.uniform_bytes();
            let mut slot = [0u8; MAX_UNIFORMS_SIZE];
            slot[..bytes.len()].copy_from_slice(bytes);
            data.extend_from_slice(&slot);
        }

        self.uniforms.upload(
            &self.renderer.device,
            &self.renderer.queue,
            &self.pipelines.uniforms_layout,
            &data,
        );

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn begin_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame: &wgpu::TextureView,
        label: &str,
        target: Target,
        viewport: Viewport,
        clear: &Clear,
        discard_depth_stencil: bool,
    ) -> Result<wgpu::RenderPass<'static>, BackendError> {
        let (colors, depth_stencil): (Vec<&wgpu::TextureView>, &wgpu::TextureView) = match target {
            Target::GBuffer => {
                let gbuffer = self
                    .gbuffer
                    .as_ref()
                    .ok_or(BackendError::GBufferNotAllocated)?;
                (gbuffer.views.iter().collect(), &gbuffer.depth_stencil)
            }
            Target::Presentation => (vec![frame], &self.presentation_depth),
        };

        let load = match clear.color {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            }),
            None => wgpu::LoadOp::Load,
        };

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = colors
            .into_iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let store = if discard_depth_stencil {
            wgpu::StoreOp::Discard
        } else {
            wgpu::StoreOp::Store
        };

        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_stencil,
                    depth_ops: Some(wgpu::Operations {
                        load: clear
                            .depth
                            .map(wgpu::LoadOp::Clear)
                            .unwrap_or(wgpu::LoadOp::Load),
                        store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: clear
                            .stencil
                            .map(|value| wgpu::LoadOp::Clear(value as u32))
                            .unwrap_or(wgpu::LoadOp::Load),
                        store,
                    }),
                }),
                ..Default::default()
            })
            .forget_lifetime();

        let Viewport {
            x,
            y,
            width,
            height,
        } = viewport;
        pass.set_viewport(x as f32, y as f32, width as f32, height as f32, 0.0, 1.0);
        pass.set_scissor_rect(x, y, width, height);

        Ok(pass)
    }

    fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'static>,
        active: &ActivePass,
        state: &PipelineState,
        draw: &Draw,
        index: u32,
    ) -> Result<(), BackendError> {
        let technique = draw.technique();
        let pipeline =
            self.pipelines
                .get(technique, state)
                .ok_or_else(|| BackendError::Effect {
                    technique: technique.name(),
                    reason: "pipeline was not prepared".into(),
                })?;

        pass.set_pipeline(pipeline);
        if let Some(stencil) = &state.stencil {
            pass.set_stencil_reference(stencil.reference as u32);
        }

        let bindings = technique.bindings();
        pass.set_bind_group(
            bindings.uniforms,
            &self.uniforms.bind_group,
            &[index * MAX_UNIFORMS_SIZE as u32],
        );

        if let (Some(slot), Draw::GBufferFill { diffuse, bump, .. }) = (bindings.material, draw) {
            let material = self
                .materials
                .get(&(*diffuse, *bump))
                .ok_or(BackendError::UnknownTexture(*diffuse))?;
            pass.set_bind_group(slot, material, &[]);
        }

        if let Some(expected) = bindings.gbuffer {
            let gbuffer = self
                .gbuffer
                .as_ref()
                .ok_or(BackendError::GBufferNotAllocated)?;
            let slot = active
                .gbuffer_slot
                .ok_or(BackendError::GBufferNotBound { expected })?;
            pass.set_bind_group(slot, &gbuffer.bind_group, &[]);
        }

        match draw.mesh() {
            Some(handle) => {
                let mesh = self
                    .meshes
                    .get(handle.0 as usize)
                    .ok_or(BackendError::UnknownMesh(handle))?;
                pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
            None => pass.draw(0..3, 0..1),
        }

        Ok(())
    }

    fn encode(
        &self,
        commands: &CommandList,
        frame: &wgpu::TextureView,
    ) -> Result<wgpu::CommandBuffer, BackendError> {
        let mut encoder = self
            .renderer
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame encoder"),
            });

        let mut pass: Option<(ActivePass, wgpu::RenderPass<'static>)> = None;
        let mut draw_index = 0;

        for (index, command) in commands.iter().enumerate() {
            match command {
                Command::BeginPass {
                    label,
                    target,
                    viewport,
                    clear,
                } => {
                    drop(pass.take());
                    let discard = discards_depth_stencil(commands, index);
                    let render_pass = self.begin_pass(
                        &mut encoder,
                        frame,
                        label,
                        *target,
                        *viewport,
                        clear,
                        discard,
                    )?;
                    pass = Some((ActivePass::new(*target, *viewport), render_pass));
                }
                // load ops are the only way to clear inside a pass, so the pass restarts
                Command::ClearStencil(value) => {
                    let (active, render_pass) = pass.take().ok_or(BackendError::NoActivePass)?;
                    drop(render_pass);

                    let clear = Clear {
                        stencil: Some(*value),
                        ..Clear::NONE
                    };
                    let discard = discards_depth_stencil(commands, index);
                    let render_pass = self.begin_pass(
                        &mut encoder,
                        frame,
                        "Clear stencil",
                        active.target,
                        active.viewport,
                        &clear,
                        discard,
                    )?;
                    pass = Some((active, render_pass));
                }
                Command::BindGBuffer { slot_base } => {
                    if self.gbuffer.is_none() {
                        return Err(BackendError::GBufferNotAllocated);
                    }
                    pass.as_mut().ok_or(BackendError::NoActivePass)?.0.gbuffer_slot =
                        Some(*slot_base);
                }
                // applied as the store op of the pass
                Command::DiscardDepthStencil => {}
                Command::Draw { state, draw } => {
                    let (active, render_pass) = pass.as_mut().ok_or(BackendError::NoActivePass)?;
                    active.validate(draw)?;
                    self.draw(render_pass, active, state, draw, draw_index)?;
                    draw_index += 1;
                }
            }
        }

        drop(pass);
        Ok(encoder.finish())
    }
}

/// Whether the pass started at `index` ends with its depth/stencil discarded.
fn discards_depth_stencil(commands: &CommandList, index: usize) -> bool {
    commands
        .iter()
        .skip(index + 1)
        .take_while(|command| {
            !matches!(
                command,
                Command::BeginPass { .. } | Command::ClearStencil(_)
            )
        })
        .any(|command| *command == Command::DiscardDepthStencil)
}

impl Backend for WgpuBackend<'_> {
    fn surface_size(&self) -> (u32, u32) {
        self.renderer.size()
    }

    fn max_texture_dimension(&self) -> u32 {
        self.renderer.device.limits().max_texture_dimension_2d
    }

    fn resize(&mut self, size: (u32, u32)) {
        if size == self.surface_size() {
            return;
        }

        self.renderer.resize(size);
        self.presentation_depth =
            Self::create_depth_stencil(&self.renderer.device, self.renderer.size(), "Presentation");
    }

    fn allocate_gbuffer(&mut self, width: u32, height: u32) -> Result<(), AllocationError> {
        let incomplete = |reason| AllocationError::Incomplete {
            target: "gbuffer",
            reason,
        };

        let max = self.max_texture_dimension();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(incomplete(IncompleteReason::Dimensions { width, height, max }));
        }

        let adapter = &self.renderer.adapter;
        let colors = GBufferAttachment::ALL.iter().map(|attachment| {
            (
                attachment.label(),
                attachment.format(),
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            )
        });
        let depth_stencil = (
            "GBuffer depth stencil",
            GBuffer::DEPTH_STENCIL_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        for (label, format, usage) in colors.chain([depth_stencil]) {
            let features = adapter.get_texture_format_features(format);
            if !features.allowed_usages.contains(usage) {
                return Err(incomplete(IncompleteReason::UnsupportedFormat(format!(
                    "{label}: {format:?}"
                ))));
            }
        }

        let device = &self.renderer.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let views = GBufferAttachment::ALL
            .iter()
            .map(|attachment| {
                device
                    .create_texture(&wgpu::TextureDescriptor {
                        label: Some(attachment.label()),
                        size: wgpu::Extent3d {
                            width,
                            height,
                            depth_or_array_layers: 1,
                        },
                        mip_level_count: 1,
                        sample_count: 1,
                        dimension: wgpu::TextureDimension::D2,
                        format: attachment.format(),
                        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                            | wgpu::TextureUsages::TEXTURE_BINDING,
                        view_formats: &[],
                    })
                    .create_view(&Default::default())
            })
            .collect::<Vec<_>>();

        let depth_stencil = Self::create_depth_stencil(device, (width, height), "GBuffer");

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GBuffer bind group"),
            layout: &self.pipelines.gbuffer_layout,
            entries: &views
                .iter()
                .enumerate()
                .map(|(binding, view)| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: wgpu::BindingResource::TextureView(view),
                })
                .collect::<Vec<_>>(),
        });

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(error) = validation.or(out_of_memory) {
            return Err(incomplete(IncompleteReason::Backend(error.to_string())));
        }

        self.gbuffer = Some(GpuGBuffer {
            views,
            depth_stencil,
            bind_group,
        });

        Ok(())
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> MeshHandle {
        let device = &self.renderer.device;

        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh vertices buffer"),
            contents: bytemuck::cast_slice(&mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh indices buffer"),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        self.meshes.push(GpuMesh {
            vertices,
            indices,
            index_count: mesh.indices().len() as u32,
        });

        MeshHandle(self.meshes.len() as u32 - 1)
    }

    fn upload_texture(&mut self, texture: &TextureData) -> TextureHandle {
        let fallback;
        let texture = if texture.is_complete() {
            texture
        } else {
            log::warn!(
                "Texture data does not match its {}x{} size, using a white texel",
                texture.width,
                texture.height
            );
            fallback = TextureData::default_diffuse();
            &fallback
        };

        let view = self
            .renderer
            .device
            .create_texture_with_data(
                &self.renderer.queue,
                &wgpu::TextureDescriptor {
                    label: Some("Material texture"),
                    size: wgpu::Extent3d {
                        width: texture.width,
                        height: texture.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                bytemuck::cast_slice(&texture.pixels),
            )
            .create_view(&Default::default());

        self.textures.push(view);
        TextureHandle(self.textures.len() as u32 - 1)
    }

    fn submit(&mut self, commands: &CommandList) -> Result<(), BackendError> {
        self.prepare(commands)?;

        let frame = match self.renderer.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, skipping frame");
                self.renderer.reconfigure();
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };
        let frame_view = frame.texture.create_view(&Default::default());

        let device = &self.renderer.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let encoded = self
            .encode(commands, &frame_view)
            .map(|buffer| self.renderer.queue.submit(Some(buffer)));
        let validation = pollster::block_on(device.pop_error_scope());

        encoded?;
        if let Some(error) = validation {
            return Err(BackendError::Effect {
                technique: "frame",
                reason: error.to_string(),
            });
        }

        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::GeometryPass;

    #[test]
    fn discard_applies_to_the_pass_it_ends() {
        let viewport = Viewport::new(4, 4);
        let mut commands = CommandList::new();
        commands.begin_pass("GBuffer", Target::GBuffer, viewport, Clear::ALL);
        commands.draw(
            GeometryPass::STATE,
            Draw::SolidColour {
                mesh: MeshHandle(0),
                uniforms: Default::default(),
            },
        );
        commands.push(Command::DiscardDepthStencil);
        commands.begin_pass("Lighting", Target::Presentation, viewport, Clear::ALL);
        commands.push(Command::ClearStencil(0));

        assert!(discards_depth_stencil(&commands, 0));
        assert!(!discards_depth_stencil(&commands, 3));
        assert!(!discards_depth_stencil(&commands, 4));
    }
}

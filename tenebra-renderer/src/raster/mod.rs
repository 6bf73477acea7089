//! CPU reference backend.
//!
//! Executes command lists with the exact fixed-function semantics the GPU pipelines are built
//! from. Used to check frames headlessly.

mod framebuffer;
mod rasterizer;
mod shading;


use glam::Vec4;

use crate::{
    ActivePass, AllocationError, Backend, BackendError, Command, CommandList, Draw,
    GBufferAttachment, IncompleteReason, MeshData, MeshHandle, PipelineState, Target,
    TextureData, TextureHandle, Vertex,
};

use self::{
    framebuffer::{Framebuffer, TexelFormat},
    rasterizer::{ClipVertex, Fragment, Rasterizer},
    shading::Shader,
};

struct RasterMesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

pub struct RasterBackend {
    presentation: Framebuffer,
    gbuffer: Option<Framebuffer>,
    meshes: Vec<RasterMesh>,
    textures: Vec<TextureData>,
}

/// Maps labelled attachment formats to the texel storage emulating them.
fn texel_formats(
    attachments: &[(&'static str, wgpu::TextureFormat)],
) -> Result<Vec<TexelFormat>, IncompleteReason> {
    attachments
        .iter()
        .map(|&(label, format)| {
            TexelFormat::for_attachment(format)
                .ok_or_else(|| IncompleteReason::UnsupportedFormat(format!("{label}: {format:?}")))
        })
        .collect()
}

impl RasterBackend {
    pub const MAX_TEXTURE_DIMENSION: u32 = 4096;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            presentation: Framebuffer::new(width, height, &[TexelFormat::Unorm]),
            gbuffer: None,
            meshes: vec![],
            textures: vec![],
        }
    }

    /// Presentation surface colour.
    pub fn color(&self, x: u32, y: u32) -> Option<Vec4> {
        self.presentation.color(0, x, y)
    }

    /// Presentation surface stencil.
    pub fn stencil(&self, x: u32, y: u32) -> Option<u8> {
        self.presentation.stencil(x, y)
    }

    pub fn gbuffer_texel(&self, attachment: GBufferAttachment, x: u32, y: u32) -> Option<Vec4> {
        self.gbuffer
            .as_ref()?
            .color(attachment.index() as usize, x, y)
    }

    pub fn gbuffer_stencil(&self, x: u32, y: u32) -> Option<u8> {
        self.gbuffer.as_ref()?.stencil(x, y)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureData> {
        self.textures.get(handle.0 as usize)
    }

    fn target_mut(&mut self, target: Target) -> Result<&mut Framebuffer, BackendError> {
        match target {
            Target::GBuffer => self
                .gbuffer
                .as_mut()
                .ok_or(BackendError::GBufferNotAllocated),
            Target::Presentation => Ok(&mut self.presentation),
        }
    }

    fn draw(
        &mut self,
        pass: &ActivePass,
        state: &PipelineState,
        draw: &Draw,
    ) -> Result<(), BackendError> {
        let Self {
            presentation,
            gbuffer,
            meshes,
            textures,
        } = self;

        let (target, gbuffer) = match pass.target {
            Target::GBuffer => (
                gbuffer.as_mut().ok_or(BackendError::GBufferNotAllocated)?,
                None,
            ),
            Target::Presentation => (presentation, gbuffer.as_ref()),
        };

        let shader = Shader::new(draw, textures, gbuffer)?;

        let triangles: Vec<[ClipVertex; 3]> = match draw.mesh() {
            Some(handle) => {
                let mesh = meshes
                    .get(handle.0 as usize)
                    .ok_or(BackendError::UnknownMesh(handle))?;
                mesh.indices
                    .chunks_exact(3)
                    .filter_map(|triangle| {
                        match [0, 1, 2].map(|i| mesh.vertices.get(triangle[i] as usize)) {
                            [Some(a), Some(b), Some(c)] => {
                                Some([a, b, c].map(|vertex| shader.vertex(vertex)))
                            }
                            _ => None,
                        }
                    })
                    .collect()
            }
            None => vec![shading::fullscreen()],
        };

        let rasterizer = Rasterizer::new(pass.viewport, (target.width, target.height), *state);
        for triangle in triangles {
            rasterizer.triangle(triangle, &mut |fragment: Fragment| {
                target.process(state, &fragment, || shader.fragment(&fragment));
            });
        }

        Ok(())
    }
}

impl Backend for RasterBackend {
    fn surface_size(&self) -> (u32, u32) {
        (self.presentation.width, self.presentation.height)
    }

    fn max_texture_dimension(&self) -> u32 {
        Self::MAX_TEXTURE_DIMENSION
    }

    fn resize(&mut self, (width, height): (u32, u32)) {
        if (width, height) != self.surface_size() {
            self.presentation = Framebuffer::new(width, height, &[TexelFormat::Unorm]);
        }
    }

    fn allocate_gbuffer(&mut self, width: u32, height: u32) -> Result<(), AllocationError> {
        let max = Self::MAX_TEXTURE_DIMENSION;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(AllocationError::Incomplete {
                target: "gbuffer",
                reason: IncompleteReason::Dimensions { width, height, max },
            });
        }

        let attachments = GBufferAttachment::ALL.map(|a| (a.label(), a.format()));
        let formats = texel_formats(&attachments).map_err(|reason| AllocationError::Incomplete {
            target: "gbuffer",
            reason,
        })?;

        self.gbuffer = Some(Framebuffer::new(width, height, &formats));
        Ok(())
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> MeshHandle {
        self.meshes.push(RasterMesh {
            vertices: mesh.vertices(),
            indices: mesh.indices().to_vec(),
        });
        MeshHandle(self.meshes.len() as u32 - 1)
    }

    fn upload_texture(&mut self, texture: &TextureData) -> TextureHandle {
        self.textures.push(texture.clone());
        TextureHandle(self.textures.len() as u32 - 1)
    }

    fn submit(&mut self, commands: &CommandList) -> Result<(), BackendError> {
        let mut pass: Option<ActivePass> = None;

        for command in commands {
            match command {
                Command::BeginPass {
                    target,
                    viewport,
                    clear,
                    ..
                } => {
                    self.target_mut(*target)?.clear(clear);
                    pass = Some(ActivePass::new(*target, *viewport));
                }
                Command::ClearStencil(value) => {
                    let target = pass.ok_or(BackendError::NoActivePass)?.target;
                    self.target_mut(target)?.clear_stencil(*value);
                }
                Command::BindGBuffer { slot_base } => {
                    if self.gbuffer.is_none() {
                        return Err(BackendError::GBufferNotAllocated);
                    }
                    pass.as_mut().ok_or(BackendError::NoActivePass)?.gbuffer_slot =
                        Some(*slot_base);
                }
                // contents are kept, nothing to release
                Command::DiscardDepthStencil => {}
                Command::Draw { state, draw } => {
                    let pass = pass.ok_or(BackendError::NoActivePass)?;
                    pass.validate(draw)?;
                    self.draw(&pass, state, draw)?;
                }
            }
        }

        Ok(())
    }
}

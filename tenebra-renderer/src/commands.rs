use crate::{
    AmbientLightUniforms, BackendError, BlitUniforms, DirectionalLightUniforms, GBufferAttachment,
    GBufferFillUniforms, LightGlyphUniforms, MeshHandle, PipelineState, PointLightUniforms,
    SolidColourUniforms, Technique, TextureHandle,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Centers a `size` viewport inside an `outer` surface.
    pub fn centered(size: (u32, u32), outer: (u32, u32)) -> Self {
        Self {
            x: outer.0.saturating_sub(size.0) / 2,
            y: outer.1.saturating_sub(size.1) / 2,
            width: size.0,
            height: size.1,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    pub fn as_vec4(&self) -> glam::Vec4 {
        glam::vec4(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// The off-screen gbuffer (all colour attachments + its depth/stencil).
    GBuffer,
    /// The presentation surface and its own depth/stencil.
    Presentation,
}

impl Target {
    pub fn name(self) -> &'static str {
        match self {
            Self::GBuffer => "gbuffer",
            Self::Presentation => "presentation",
        }
    }
}

/// `None` loads the previous content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Clear {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
    pub stencil: Option<u8>,
}

impl Clear {
    pub const ALL: Self = Self {
        color: Some([0.0, 0.0, 0.0, 1.0]),
        depth: Some(1.0),
        stencil: Some(0),
    };

    pub const NONE: Self = Self {
        color: None,
        depth: None,
        stencil: None,
    };
}

/// One draw, tagged by technique. Each variant carries the typed inputs of its technique.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Draw {
    GBufferFill {
        mesh: MeshHandle,
        diffuse: TextureHandle,
        bump: TextureHandle,
        uniforms: GBufferFillUniforms,
    },
    SolidColour {
        mesh: MeshHandle,
        uniforms: SolidColourUniforms,
    },
    LightGlyph {
        mesh: MeshHandle,
        uniforms: LightGlyphUniforms,
    },
    PointLight {
        proxy: MeshHandle,
        uniforms: PointLightUniforms,
    },
    DirectionalLight {
        uniforms: DirectionalLightUniforms,
    },
    AmbientLight {
        uniforms: AmbientLightUniforms,
    },
    TextureBlit {
        uniforms: BlitUniforms,
    },
    DepthBlit {
        uniforms: BlitUniforms,
    },
}

impl Draw {
    pub fn technique(&self) -> Technique {
        match self {
            Self::GBufferFill { .. } => Technique::GBufferFill,
            Self::SolidColour { .. } => Technique::SolidColour,
            Self::LightGlyph { .. } => Technique::LightGlyph,
            Self::PointLight { .. } => Technique::PointLight,
            Self::DirectionalLight { .. } => Technique::DirectionalLight,
            Self::AmbientLight { .. } => Technique::AmbientLight,
            Self::TextureBlit { .. } => Technique::TextureBlit,
            Self::DepthBlit { .. } => Technique::DepthBlit,
        }
    }

    /// `None` means a full-viewport triangle.
    pub fn mesh(&self) -> Option<MeshHandle> {
        match *self {
            Self::GBufferFill { mesh, .. }
            | Self::SolidColour { mesh, .. }
            | Self::LightGlyph { mesh, .. } => Some(mesh),
            Self::PointLight { proxy, .. } => Some(proxy),
            Self::DirectionalLight { .. }
            | Self::AmbientLight { .. }
            | Self::TextureBlit { .. }
            | Self::DepthBlit { .. } => None,
        }
    }

    pub fn uniform_bytes(&self) -> &[u8] {
        match self {
            Self::GBufferFill { uniforms, .. } => bytemuck::bytes_of(uniforms),
            Self::SolidColour { uniforms, .. } => bytemuck::bytes_of(uniforms),
            Self::LightGlyph { uniforms, .. } => bytemuck::bytes_of(uniforms),
            Self::PointLight { uniforms, .. } => bytemuck::bytes_of(uniforms),
            Self::DirectionalLight { uniforms } => bytemuck::bytes_of(uniforms),
            Self::AmbientLight { uniforms } => bytemuck::bytes_of(uniforms),
            Self::TextureBlit { uniforms } | Self::DepthBlit { uniforms } => {
                bytemuck::bytes_of(uniforms)
            }
        }
    }

    pub fn blit(attachment: GBufferAttachment, uniforms: BlitUniforms) -> Self {
        match attachment {
            GBufferAttachment::Depth => Self::DepthBlit { uniforms },
            _ => Self::TextureBlit { uniforms },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BeginPass {
        label: &'static str,
        target: Target,
        viewport: Viewport,
        clear: Clear,
    },
    /// Clears the stencil of the active pass' target without touching colour or depth.
    ClearStencil(u8),
    /// Makes the gbuffer colour attachments readable, starting at bind slot `slot_base`.
    BindGBuffer { slot_base: u32 },
    /// The gbuffer depth/stencil content is not needed once the active pass ends.
    DiscardDepthStencil,
    Draw { state: PipelineState, draw: Draw },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn begin_pass(&mut self, label: &'static str, target: Target, viewport: Viewport, clear: Clear) {
        self.push(Command::BeginPass {
            label,
            target,
            viewport,
            clear,
        });
    }

    pub fn draw(&mut self, state: PipelineState, draw: Draw) {
        self.push(Command::Draw { state, draw });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn draws(&self) -> impl Iterator<Item = (&PipelineState, &Draw)> + '_ {
        self.commands.iter().filter_map(|command| match command {
            Command::Draw { state, draw } => Some((state, draw)),
            _ => None,
        })
    }
}

impl FromIterator<Command> for CommandList {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Pass bookkeeping shared by backends while they walk a command list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivePass {
    pub target: Target,
    pub viewport: Viewport,
    /// Slot the gbuffer attachments are bound at, if bound in this pass.
    pub gbuffer_slot: Option<u32>,
}

impl ActivePass {
    pub fn new(target: Target, viewport: Viewport) -> Self {
        Self {
            target,
            viewport,
            gbuffer_slot: None,
        }
    }

    /// Checks that `draw` may run inside this pass.
    pub fn validate(&self, draw: &Draw) -> Result<(), BackendError> {
        let technique = draw.technique();

        if technique.target() != self.target {
            return Err(BackendError::TargetMismatch {
                technique: technique.name(),
                expected: technique.target().name(),
            });
        }

        if let Some(expected) = technique.bindings().gbuffer {
            if self.gbuffer_slot != Some(expected) {
                return Err(BackendError::GBufferNotBound { expected });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GBUFFER_SLOT;

    #[test]
    fn centered_viewport_offsets() {
        let viewport = Viewport::centered((512, 256), (800, 600));

        assert_eq!((viewport.x, viewport.y), (144, 172));
        assert!(viewport.contains(144, 172));
        assert!(!viewport.contains(144 + 512, 172));
    }

    #[test]
    fn lighting_draws_require_the_gbuffer_binding() {
        let draw = Draw::AmbientLight {
            uniforms: AmbientLightUniforms::default(),
        };
        let mut pass = ActivePass::new(Target::Presentation, Viewport::new(4, 4));

        assert!(matches!(
            pass.validate(&draw),
            Err(BackendError::GBufferNotBound { expected: GBUFFER_SLOT })
        ));

        pass.gbuffer_slot = Some(GBUFFER_SLOT + 1);
        assert!(pass.validate(&draw).is_err());

        pass.gbuffer_slot = Some(GBUFFER_SLOT);
        assert!(pass.validate(&draw).is_ok());
    }

    #[test]
    fn draws_stay_on_their_target() {
        let pass = ActivePass::new(Target::GBuffer, Viewport::new(4, 4));
        let draw = Draw::SolidColour {
            mesh: MeshHandle(0),
            uniforms: SolidColourUniforms::default(),
        };

        assert!(matches!(
            pass.validate(&draw),
            Err(BackendError::TargetMismatch {
                technique: "SolidColour",
                expected: "presentation"
            })
        ));
    }
}

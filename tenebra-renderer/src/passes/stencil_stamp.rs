use glam::Vec4;

use crate::{
    BlendMode, Clear, CommandList, CompareFunction, CullMode, DepthState, Draw, PipelineState,
    SolidColourUniforms, StencilFaceState, StencilOperation, StencilState, Target,
};

use super::FrameContext;

/// Re-derives the geometry mask and depth on the presentation surface, which the lighting
/// passes test against. Colour writes are off.
pub struct StencilStampPass;

impl StencilStampPass {
    pub const STATE: PipelineState = PipelineState {
        cull: CullMode::Back,
        blend: BlendMode::Replace,
        depth: DepthState::LESS_EQUAL,
        stencil: Some(StencilState::both(
            StencilFaceState::new(
                CompareFunction::Always,
                StencilOperation::Keep,
                StencilOperation::Keep,
                StencilOperation::Replace,
            ),
            1,
        )),
        color_writes: false,
    };

    pub fn record(&self, ctx: &FrameContext, commands: &mut CommandList) {
        commands.begin_pass("Lighting", Target::Presentation, ctx.viewport, Clear::ALL);

        for instance in &ctx.scene.instances {
            commands.draw(
                Self::STATE,
                Draw::SolidColour {
                    mesh: instance.mesh,
                    uniforms: SolidColourUniforms {
                        world_view_proj: ctx.camera.view_proj * instance.world,
                        color: Vec4::ZERO,
                    },
                },
            );
        }
    }
}

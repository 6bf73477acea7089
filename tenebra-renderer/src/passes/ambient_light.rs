use glam::Vec3;

use crate::{
    AmbientLightUniforms, BlendMode, CommandList, CompareFunction, CullMode, DepthState, Draw,
    PipelineState, StencilFaceState, StencilOperation, StencilState, GBUFFER_SLOT,
};

use super::FrameContext;

/// Adds `albedo × ambient` over the geometry mask, leaving the mask in place.
pub struct AmbientLightPass;

impl AmbientLightPass {
    pub const STATE: PipelineState = PipelineState {
        cull: CullMode::None,
        blend: BlendMode::Additive,
        depth: DepthState::DISABLED,
        stencil: Some(StencilState::both(
            StencilFaceState::new(
                CompareFunction::NotEqual,
                StencilOperation::Keep,
                StencilOperation::Keep,
                StencilOperation::Keep,
            ),
            0,
        )),
        color_writes: true,
    };

    pub fn record(&self, ctx: &FrameContext, commands: &mut CommandList) {
        ctx.gbuffer
            .bind_attachments_for_reading(commands, GBUFFER_SLOT);

        commands.draw(
            Self::STATE,
            Draw::AmbientLight {
                uniforms: AmbientLightUniforms {
                    color: Vec3::from(ctx.config.ambient).extend(1.0),
                    screen: ctx.screen(),
                },
            },
        );
    }
}

use crate::{
    BlendMode, Command, CommandList, CompareFunction, CullMode, DepthState, DirectionalLight,
    DirectionalLightUniforms, Draw, PipelineState, StencilFaceState, StencilOperation,
    StencilState, GBUFFER_SLOT,
};

use super::FrameContext;

/// Full-viewport pass per directional light. Shades marked pixels and clears the mark in the
/// same draw; without directional lights the stencil is cleared explicitly.
pub struct DirectionalLightPass;

impl DirectionalLightPass {
    pub const STATE: PipelineState = PipelineState {
        cull: CullMode::None,
        blend: BlendMode::Additive,
        depth: DepthState::DISABLED,
        stencil: Some(StencilState::both(
            StencilFaceState::new(
                CompareFunction::NotEqual,
                StencilOperation::Replace,
                StencilOperation::Replace,
                StencilOperation::Replace,
            ),
            0,
        )),
        color_writes: true,
    };

    pub fn record(&self, ctx: &FrameContext, commands: &mut CommandList) {
        let lights = &ctx.scene.directional_lights;

        if lights.is_empty() {
            commands.push(Command::ClearStencil(0));
            return;
        }

        ctx.gbuffer
            .bind_attachments_for_reading(commands, GBUFFER_SLOT);

        for light in lights {
            commands.draw(
                Self::STATE,
                Draw::DirectionalLight {
                    uniforms: Self::uniforms(ctx, light),
                },
            );
        }
    }

    pub fn uniforms(ctx: &FrameContext, light: &DirectionalLight) -> DirectionalLightUniforms {
        DirectionalLightUniforms {
            light_color: light.radiance.extend(1.0),
            light_direction: light.view_direction(&ctx.camera.view).extend(0.0),
            screen: ctx.screen(),
        }
    }
}

use crate::{
    BlendMode, BlitUniforms, Clear, CommandList, CullMode, DepthState, Draw, GBufferAttachment,
    PipelineState, Target, GBUFFER_SLOT,
};

use super::FrameContext;

/// Shows one gbuffer attachment on the presentation surface.
pub struct GBufferVisualizePass {
    pub attachment: GBufferAttachment,
}

impl GBufferVisualizePass {
    pub const STATE: PipelineState = PipelineState {
        cull: CullMode::None,
        blend: BlendMode::Replace,
        depth: DepthState::DISABLED,
        stencil: None,
        color_writes: true,
    };

    pub fn record(&self, ctx: &FrameContext, commands: &mut CommandList) {
        commands.begin_pass(
            self.attachment.label(),
            Target::Presentation,
            ctx.viewport,
            Clear::ALL,
        );
        ctx.gbuffer
            .bind_attachments_for_reading(commands, GBUFFER_SLOT);

        commands.draw(
            Self::STATE,
            Draw::blit(
                self.attachment,
                BlitUniforms {
                    screen: ctx.screen(),
                    attachment: self.attachment.index(),
                    _padding: [0; 3],
                },
            ),
        );
    }
}

use glam::Vec4;

use crate::{
    BlendMode, CommandList, CompareFunction, CullMode, DepthState, Draw, PipelineState, PointLight,
    PointLightUniforms, SolidColourUniforms, StencilFaceState, StencilOperation, StencilState,
    GBUFFER_SLOT,
};

use super::FrameContext;

/// Point lights, one stencil-marked proxy volume at a time.
///
/// The mark sub-pass counts proxy faces failing the depth test: a pixel ends up non-zero only
/// when its surface lies between the proxy's front and back faces. The shade sub-pass then
/// lights exactly those pixels and zeroes them, so the next light starts from a clean stencil.
pub struct PointLightsPass;

impl PointLightsPass {
    pub const MARK_STATE: PipelineState = PipelineState {
        cull: CullMode::None,
        blend: BlendMode::Replace,
        depth: DepthState {
            compare: Some(CompareFunction::LessEqual),
            write: false,
            clamp: true,
        },
        stencil: Some(StencilState {
            front: StencilFaceState::new(
                CompareFunction::Always,
                StencilOperation::Keep,
                StencilOperation::IncrementWrap,
                StencilOperation::Keep,
            ),
            back: StencilFaceState::new(
                CompareFunction::Always,
                StencilOperation::Keep,
                StencilOperation::DecrementWrap,
                StencilOperation::Keep,
            ),
            reference: 0,
            read_mask: 0xFF,
            write_mask: 0xFF,
        }),
        color_writes: false,
    };

    pub const SHADE_STATE: PipelineState = PipelineState {
        cull: CullMode::Back,
        blend: BlendMode::Additive,
        depth: DepthState {
            compare: None,
            write: false,
            clamp: true,
        },
        stencil: Some(StencilState::both(
            StencilFaceState::new(
                CompareFunction::NotEqual,
                StencilOperation::Keep,
                StencilOperation::Keep,
                StencilOperation::Zero,
            ),
            0,
        )),
        color_writes: true,
    };

    pub fn record(&self, ctx: &FrameContext, commands: &mut CommandList) {
        let lights = &ctx.scene.point_lights;
        if lights.is_empty() {
            return;
        }

        ctx.gbuffer
            .bind_attachments_for_reading(commands, GBUFFER_SLOT);

        for light in lights {
            self.mark(ctx, light, commands);
            self.shade(ctx, light, commands);
        }
    }

    fn mark(&self, ctx: &FrameContext, light: &PointLight, commands: &mut CommandList) {
        commands.draw(
            Self::MARK_STATE,
            Draw::SolidColour {
                mesh: ctx.proxy,
                uniforms: SolidColourUniforms {
                    world_view_proj: ctx.camera.view_proj * light.proxy_transform(),
                    color: Vec4::ZERO,
                },
            },
        );
    }

    fn shade(&self, ctx: &FrameContext, light: &PointLight, commands: &mut CommandList) {
        commands.draw(
            Self::shade_state(ctx, light),
            Draw::PointLight {
                proxy: ctx.proxy,
                uniforms: Self::uniforms(ctx, light),
            },
        );
    }

    /// Inside the proxy the front faces are behind the near plane, so the back faces cover it.
    pub fn shade_state(ctx: &FrameContext, light: &PointLight) -> PipelineState {
        if light.contains_eye(ctx.camera.eye, ctx.camera.near_corner_distance()) {
            Self::SHADE_STATE.with_cull(CullMode::Front)
        } else {
            Self::SHADE_STATE
        }
    }

    pub fn uniforms(ctx: &FrameContext, light: &PointLight) -> PointLightUniforms {
        PointLightUniforms {
            world_view_proj: ctx.camera.view_proj * light.proxy_transform(),
            light_color: light.radiance.extend(1.0),
            light_position: light.view_position(&ctx.camera.view).extend(light.radius),
            screen: ctx.screen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stencil value left by the mark sub-pass given which proxy faces fail the depth test.
    fn mark(front_fails: bool, back_fails: bool) -> u8 {
        let stencil = PointLightsPass::MARK_STATE.stencil.unwrap();
        let mut value = 0;
        for (front_facing, fails) in [(true, front_fails), (false, back_fails)] {
            let face = stencil.face(front_facing);
            let op = if fails { face.depth_fail } else { face.pass };
            value = stencil.update(op, value);
        }
        value
    }

    #[test]
    fn only_surfaces_inside_the_volume_are_marked() {
        // surface in front of the volume
        assert_eq!(mark(true, true), 0);
        // surface behind the volume
        assert_eq!(mark(false, false), 0);
        // surface inside the volume
        assert_ne!(mark(false, true), 0);
    }

    #[test]
    fn shading_consumes_the_mark() {
        let stencil = PointLightsPass::SHADE_STATE.stencil.unwrap();
        let marked = mark(false, true);

        assert!(stencil.test(true, marked));
        assert_eq!(stencil.update(stencil.front.pass, marked), 0);
        assert!(!stencil.test(true, 0));
    }

    #[test]
    fn proxies_are_never_clipped_by_the_far_plane() {
        assert!(PointLightsPass::MARK_STATE.depth.clamp);
        assert!(PointLightsPass::SHADE_STATE.depth.clamp);
        assert!(!PointLightsPass::MARK_STATE.depth.write);
        assert!(!PointLightsPass::MARK_STATE.color_writes);
    }
}

use glam::{Mat4, Vec3};

use crate::{BlendMode, CommandList, Draw, LightGlyphUniforms, PipelineState, PointLight};

use super::FrameContext;

/// Small shaded glyph at every point light's position, depth-tested against the scene.
pub struct LightSourcesPass;

impl LightSourcesPass {
    pub const STATE: PipelineState = PipelineState::DEFAULT.with_blend(BlendMode::Additive);

    pub fn record(&self, ctx: &FrameContext, commands: &mut CommandList) {
        for light in &ctx.scene.point_lights {
            commands.draw(
                Self::STATE,
                Draw::LightGlyph {
                    mesh: ctx.proxy,
                    uniforms: Self::uniforms(ctx, light),
                },
            );
        }
    }

    pub fn uniforms(ctx: &FrameContext, light: &PointLight) -> LightGlyphUniforms {
        let world = Mat4::from_translation(light.position())
            * Mat4::from_scale(Vec3::splat(ctx.config.light_glyph_scale));

        LightGlyphUniforms {
            world_view_proj: ctx.camera.view_proj * world,
            world_view: ctx.camera.view * world,
            color: light.color.extend(ctx.config.light_glyph_alpha),
        }
    }
}

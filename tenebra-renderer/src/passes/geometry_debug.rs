use glam::{Vec3, Vec4};

use crate::{BlendMode, Clear, CommandList, Draw, PipelineState, SolidColourUniforms, Target};

use super::{FrameContext, LightSourcesPass};

/// Flat-coloured scene with light glyphs and translucent light volumes. Skips the gbuffer.
pub struct GeometryDebugPass;

impl GeometryDebugPass {
    pub const PALETTE: [Vec3; 9] = [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(0.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(0.5, 1.0, 0.5),
    ];

    pub const MESH_STATE: PipelineState = PipelineState::DEFAULT.with_blend(BlendMode::Replace);

    pub fn record(&self, ctx: &FrameContext, commands: &mut CommandList) {
        commands.begin_pass("Geometry", Target::Presentation, ctx.viewport, Clear::ALL);

        for (index, instance) in ctx.scene.instances.iter().enumerate() {
            commands.draw(
                Self::MESH_STATE,
                Draw::SolidColour {
                    mesh: instance.mesh,
                    uniforms: SolidColourUniforms {
                        world_view_proj: ctx.camera.view_proj * instance.world,
                        color: Self::color(index).extend(1.0),
                    },
                },
            );
        }

        LightSourcesPass.record(ctx, commands);

        for light in &ctx.scene.point_lights {
            commands.draw(
                PipelineState::DEFAULT,
                Draw::SolidColour {
                    mesh: ctx.proxy,
                    uniforms: SolidColourUniforms {
                        world_view_proj: ctx.camera.view_proj * light.proxy_transform(),
                        color: Vec4::from((light.color, ctx.config.proxy_alpha)),
                    },
                },
            );
        }
    }

    pub fn color(index: usize) -> Vec3 {
        Self::PALETTE[index % Self::PALETTE.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_wraps() {
        assert_eq!(GeometryDebugPass::color(0), Vec3::X);
        assert_eq!(GeometryDebugPass::color(8), Vec3::new(0.5, 1.0, 0.5));
        assert_eq!(GeometryDebugPass::color(9), Vec3::X);
        assert_eq!(GeometryDebugPass::color(16), Vec3::ZERO);
    }
}

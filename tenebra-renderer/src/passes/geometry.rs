use glam::{Mat3, Mat4};

use crate::{
    BlendMode, CameraState, CommandList, CompareFunction, CullMode, DepthState, Draw,
    GBufferFillUniforms, Material, PipelineState, StencilFaceState, StencilOperation,
    StencilState,
};

use super::FrameContext;

/// Rasterizes every mesh node once into the gbuffer, stamping stencil = 1 where it lands.
pub struct GeometryPass;

impl GeometryPass {
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
        color_writes: true,
    };

    pub fn record(&self, ctx: &FrameContext, commands: &mut CommandList) {
        ctx.gbuffer.bind_for_writing(commands);

        for instance in &ctx.scene.instances {
            let Some(material) = ctx.scene.materials.get(instance.material) else {
                continue;
            };

            commands.draw(
                Self::STATE,
                Draw::GBufferFill {
                    mesh: instance.mesh,
                    diffuse: material.diffuse,
                    bump: material.bump,
                    uniforms: Self::uniforms(ctx.camera, &instance.world, material),
                },
            );
        }

        if ctx.config.discard_depth_stencil {
            ctx.gbuffer.discard_depth_stencil_after_geometry(commands);
        }
    }

    pub fn uniforms(camera: &CameraState, world: &Mat4, material: &Material) -> GBufferFillUniforms {
        let world_view = camera.view * *world;
        let normal_matrix = Mat3::from_mat4(world_view).inverse().transpose();

        GBufferFillUniforms {
            world_view_proj: camera.view_proj * *world,
            world_view,
            world_view_inverse_transpose: Mat4::from_mat3(normal_matrix),
            diffuse_color: material.diffuse_color.extend(1.0),
            specular_power: material.specular_power,
            far_clip: camera.far,
            _padding: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TextureHandle;
    use approx::assert_relative_eq;
    use glam::Vec3;

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let camera = CameraState::default();
        let world = Mat4::from_scale(Vec3::new(4.0, 1.0, 1.0));
        let material = Material {
            diffuse: TextureHandle(0),
            bump: TextureHandle(1),
            specular_power: 16.0,
            diffuse_color: Vec3::splat(0.5),
        };

        let uniforms = GeometryPass::uniforms(&camera, &world, &material);

        // a plane tilted 45° in object space stays perpendicular to its scaled tangent
        let tangent = uniforms.world_view.transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        let normal = uniforms
            .world_view_inverse_transpose
            .transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(tangent.dot(normal), 0.0, epsilon = 1e-5);
        assert_eq!(uniforms.far_clip, camera.far);
        assert_eq!(uniforms.diffuse_color.w, 1.0);
    }

    #[test]
    fn stamps_one_regardless_of_prior_content() {
        let stencil = GeometryPass::STATE.stencil.unwrap();
        assert!(stencil.test(true, 7));
        assert_eq!(stencil.update(stencil.front.pass, 7), 1);
        assert_eq!(stencil.front.fail, StencilOperation::Keep);
        assert_eq!(stencil.front.depth_fail, StencilOperation::Keep);
    }
}

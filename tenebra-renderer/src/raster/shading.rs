//! CPU versions of the technique shaders. They follow the WGSL sources line for line so both
//! backends agree on every gbuffer and lighting value.

use glam::{Vec2, Vec3, Vec4};

use crate::{
    attenuation, AmbientLightUniforms, BackendError, BlitUniforms, DirectionalLightUniforms,
    Draw, GBufferFillUniforms, LightGlyphUniforms, PointLightUniforms, ScreenParams,
    SolidColourUniforms, TextureData, TextureHandle, Vertex,
};

use super::{
    framebuffer::{FragmentOutput, Framebuffer},
    rasterizer::{ClipVertex, Fragment, Varyings},
};

/// A draw with every resource it reads resolved.
pub enum Shader<'a> {
    GBufferFill {
        uniforms: &'a GBufferFillUniforms,
        diffuse: &'a TextureData,
        bump: &'a TextureData,
    },
    SolidColour(&'a SolidColourUniforms),
    LightGlyph(&'a LightGlyphUniforms),
    PointLight {
        uniforms: &'a PointLightUniforms,
        gbuffer: &'a Framebuffer,
    },
    DirectionalLight {
        uniforms: &'a DirectionalLightUniforms,
        gbuffer: &'a Framebuffer,
    },
    AmbientLight {
        uniforms: &'a AmbientLightUniforms,
        gbuffer: &'a Framebuffer,
    },
    TextureBlit {
        uniforms: &'a BlitUniforms,
        gbuffer: &'a Framebuffer,
    },
    DepthBlit {
        uniforms: &'a BlitUniforms,
        gbuffer: &'a Framebuffer,
    },
}

impl<'a> Shader<'a> {
    pub fn new(
        draw: &'a Draw,
        textures: &'a [TextureData],
        gbuffer: Option<&'a Framebuffer>,
    ) -> Result<Self, BackendError> {
        let texture = move |handle: TextureHandle| {
            textures
                .get(handle.0 as usize)
                .ok_or(BackendError::UnknownTexture(handle))
        };
        let gbuffer = move || gbuffer.ok_or(BackendError::GBufferNotAllocated);

        Ok(match draw {
            Draw::GBufferFill {
                diffuse,
                bump,
                uniforms,
                ..
            } => Self::GBufferFill {
                uniforms,
                diffuse: texture(*diffuse)?,
                bump: texture(*bump)?,
            },
            Draw::SolidColour { uniforms, .. } => Self::SolidColour(uniforms),
            Draw::LightGlyph { uniforms, .. } => Self::LightGlyph(uniforms),
            Draw::PointLight { uniforms, .. } => Self::PointLight {
                uniforms,
                gbuffer: gbuffer()?,
            },
            Draw::DirectionalLight { uniforms } => Self::DirectionalLight {
                uniforms,
                gbuffer: gbuffer()?,
            },
            Draw::AmbientLight { uniforms } => Self::AmbientLight {
                uniforms,
                gbuffer: gbuffer()?,
            },
            Draw::TextureBlit { uniforms } => Self::TextureBlit {
                uniforms,
                gbuffer: gbuffer()?,
            },
            Draw::DepthBlit { uniforms } => Self::DepthBlit {
                uniforms,
                gbuffer: gbuffer()?,
            },
        })
    }

    pub fn vertex(&self, vertex: &Vertex) -> ClipVertex {
        let position = Vec3::from(vertex.position).extend(1.0);

        match self {
            Self::GBufferFill { uniforms, .. } => {
                let tangent = Vec4::from(vertex.tangent);
                ClipVertex {
                    position: uniforms.world_view_proj * position,
                    varyings: Varyings {
                        normal: (uniforms.world_view_inverse_transpose
                            * Vec3::from(vertex.normal).extend(0.0))
                        .truncate(),
                        tangent: (uniforms.world_view * tangent.truncate().extend(0.0))
                            .truncate()
                            .extend(tangent.w),
                        uv: Vec2::from(vertex.uv),
                        view_depth: -(uniforms.world_view * position).z / uniforms.far_clip,
                    },
                }
            }
            Self::SolidColour(uniforms) => ClipVertex::new(uniforms.world_view_proj * position),
            Self::LightGlyph(uniforms) => ClipVertex {
                position: uniforms.world_view_proj * position,
                varyings: Varyings {
                    normal: (uniforms.world_view * Vec3::from(vertex.normal).extend(0.0))
                        .truncate(),
                    ..Default::default()
                },
            },
            Self::PointLight { uniforms, .. } => {
                ClipVertex::new(uniforms.world_view_proj * position)
            }
            Self::DirectionalLight { .. }
            | Self::AmbientLight { .. }
            | Self::TextureBlit { .. }
            | Self::DepthBlit { .. } => ClipVertex::new(position),
        }
    }

    pub fn fragment(&self, fragment: &Fragment) -> FragmentOutput {
        let varyings = &fragment.varyings;

        match self {
            Self::GBufferFill {
                uniforms,
                diffuse,
                bump,
            } => {
                let color =
                    diffuse.sample(varyings.uv).truncate() * uniforms.diffuse_color.truncate();
                let bump = bump.sample(varyings.uv).truncate() * 2.0 - 1.0;
                let normal = perturb(varyings.normal, varyings.tangent, bump);

                [
                    Some(color.extend(uniforms.specular_power / 255.0)),
                    Some((normal * 0.5 + 0.5).extend(1.0)),
                    Some(Vec4::new(varyings.view_depth, 0.0, 0.0, 1.0)),
                ]
            }
            Self::SolidColour(uniforms) => [Some(uniforms.color), None, None],
            Self::LightGlyph(uniforms) => {
                let normal = varyings.normal.normalize_or(Vec3::Z);
                let facing = 0.6 + 0.4 * normal.z.max(0.0);
                let color = uniforms.color;
                [
                    Some((color.truncate() * facing * color.w).extend(color.w)),
                    None,
                    None,
                ]
            }
            Self::PointLight { uniforms, gbuffer } => {
                let surface = Surface::load(&uniforms.screen, gbuffer, fragment.position);
                [Some(surface.point_light(uniforms).extend(1.0)), None, None]
            }
            Self::DirectionalLight { uniforms, gbuffer } => {
                let surface = Surface::load(&uniforms.screen, gbuffer, fragment.position);
                let to_light = -uniforms.light_direction.truncate();
                let diffuse = surface.normal.dot(to_light).max(0.0);
                let color = surface.albedo.truncate() * uniforms.light_color.truncate() * diffuse;
                [Some(color.extend(1.0)), None, None]
            }
            Self::AmbientLight { uniforms, gbuffer } => {
                let surface = Surface::load(&uniforms.screen, gbuffer, fragment.position);
                let color = surface.albedo.truncate() * uniforms.color.truncate();
                [Some(color.extend(1.0)), None, None]
            }
            Self::TextureBlit { uniforms, gbuffer } => {
                let (x, y) = texel(&uniforms.screen, fragment.position);
                let color = gbuffer.load(uniforms.attachment as usize, x, y);
                [Some(color.truncate().extend(1.0)), None, None]
            }
            Self::DepthBlit { uniforms, gbuffer } => {
                let (x, y) = texel(&uniforms.screen, fragment.position);
                let depth = gbuffer.load(2, x, y).x;
                [Some(Vec3::splat(depth).extend(1.0)), None, None]
            }
        }
    }
}

/// Vertices of the triangle covering the whole viewport.
pub fn fullscreen() -> [ClipVertex; 3] {
    [
        ClipVertex::new(Vec4::new(-1.0, -1.0, 0.0, 1.0)),
        ClipVertex::new(Vec4::new(3.0, -1.0, 0.0, 1.0)),
        ClipVertex::new(Vec4::new(-1.0, 3.0, 0.0, 1.0)),
    ]
}

/// Applies a tangent-space bump normal.
fn perturb(normal: Vec3, tangent: Vec4, bump: Vec3) -> Vec3 {
    let n = normal.normalize_or(Vec3::Z);
    let t = (tangent.truncate() - n * n.dot(tangent.truncate())).normalize_or_zero();
    if t == Vec3::ZERO {
        return n;
    }
    let b = n.cross(t) * tangent.w.signum();

    (t * bump.x + b * bump.y + n * bump.z).normalize_or(n)
}

fn local(screen: &ScreenParams, position: Vec2) -> Vec2 {
    position - Vec2::new(screen.viewport.x, screen.viewport.y)
}

fn texel(screen: &ScreenParams, position: Vec2) -> (i64, i64) {
    let local = local(screen, position);
    (local.x.floor() as i64, local.y.floor() as i64)
}

/// Gbuffer content under one fragment.
struct Surface {
    albedo: Vec4,
    normal: Vec3,
    /// View-space position rebuilt from linear depth.
    position: Vec3,
}

impl Surface {
    fn load(screen: &ScreenParams, gbuffer: &Framebuffer, position: Vec2) -> Self {
        let (x, y) = texel(screen, position);
        let local = local(screen, position);

        let depth = gbuffer.load(2, x, y).x;
        let ndc = Vec2::new(
            local.x / screen.viewport.z * 2.0 - 1.0,
            1.0 - local.y / screen.viewport.w * 2.0,
        );

        Self {
            albedo: gbuffer.load(0, x, y),
            normal: (gbuffer.load(1, x, y).truncate() * 2.0 - 1.0).normalize_or_zero(),
            position: Vec3::new(
                ndc.x * screen.projection.x,
                ndc.y * screen.projection.y,
                -1.0,
            ) * depth
                * screen.projection.z,
        }
    }

    fn point_light(&self, uniforms: &PointLightUniforms) -> Vec3 {
        let to_light = uniforms.light_position.truncate() - self.position;
        let distance = to_light.length();
        let l = to_light / distance.max(1e-6);

        let n_dot_l = self.normal.dot(l).max(0.0);
        let falloff = attenuation(distance, uniforms.light_position.w);
        let radiance = uniforms.light_color.truncate() * falloff;

        let mut color = self.albedo.truncate() * radiance * n_dot_l;

        let power = self.albedo.w * 255.0;
        if power >= 1.0 && n_dot_l > 0.0 {
            let v = (-self.position).normalize_or_zero();
            let h = (l + v).normalize_or_zero();
            color += radiance * self.normal.dot(h).max(0.0).powf(power);
        }

        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::framebuffer::TexelFormat;
    use approx::assert_relative_eq;
    use glam::Mat4;

    #[test]
    fn view_position_is_rebuilt_from_linear_depth() {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 2.0, 0.1, 10.0);
        let screen = ScreenParams::new(Vec4::new(4.0, 2.0, 8.0, 4.0), &proj, 10.0);

        let mut gbuffer = Framebuffer::new(8, 4, &[TexelFormat::Float; 3]);
        gbuffer.colors[2].texels.fill(Vec4::new(0.5, 0.0, 0.0, 1.0));

        // rightmost column, top row of the viewport
        let surface = Surface::load(&screen, &gbuffer, Vec2::new(4.0 + 7.5, 2.0 + 0.5));
        let expected_ndc = Vec2::new(7.5 / 8.0 * 2.0 - 1.0, 1.0 - 0.5 / 4.0 * 2.0);

        assert_relative_eq!(surface.position.z, -5.0);
        let clip = proj * surface.position.extend(1.0);
        assert_relative_eq!(clip.x / clip.w, expected_ndc.x, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, expected_ndc.y, epsilon = 1e-5);
    }

    #[test]
    fn flat_bump_keeps_the_geometric_normal() {
        let bump = TextureData::default_bump().sample(Vec2::ZERO).truncate() * 2.0 - 1.0;
        let normal = perturb(Vec3::Y, Vec4::new(1.0, 0.0, 0.0, 1.0), bump);

        assert_relative_eq!(normal.y, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn point_light_reaches_zero_at_its_radius() {
        let surface = Surface {
            albedo: Vec4::new(1.0, 1.0, 1.0, 0.0),
            normal: Vec3::Z,
            position: Vec3::new(0.0, 0.0, -5.0),
        };
        let light = |z: f32| PointLightUniforms {
            light_color: Vec4::ONE,
            light_position: Vec4::new(0.0, 0.0, z, 2.0),
            ..Default::default()
        };

        assert_relative_eq!(surface.point_light(&light(-4.0)).x, 1.0);
        assert_eq!(surface.point_light(&light(-3.0)), Vec3::ZERO);
        // behind the surface
        assert_eq!(surface.point_light(&light(-5.5)), Vec3::ZERO);
    }
}
